//! blogcrawl: exports every post of a hosted blog's AtomPub feed as a static HTML site.

pub mod auth;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod dom;
pub mod feed;
pub mod filter;
pub mod index;
pub mod model;
pub mod path;
pub mod store;

// Re-exports for CLI and consumers.
pub use auth::{AuthMode, Authenticator, OAuth1, Wsse};
pub use crawl::{CrawlError, CrawlOptions, CrawlReport, Crawler};
pub use feed::{
    AtomPubClient, CancelFlag, EntrySource, FeedClient, FeedError, FixedDelay, NoDelay,
    PoliteClient, PoliteClientBuilder,
};
pub use filter::{Filter, FilterError, FilterKind, Pipeline};
pub use model::{Entry, FeedPage};
pub use path::PathResolver;
pub use store::{DirStore, OutputStore};
