//! Entry source: paginated traversal of the remote feed, plus the transport behind it.

mod client;
mod decode;
mod error;

pub use client::{AtomPubClient, PoliteClient, PoliteClientBuilder, DEFAULT_ENDPOINT};
pub use decode::decode_feed;
pub use error::FeedError;

use crate::model::{Entry, FeedPage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Delay between consecutive page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Fetches one page of the feed. `None` requests the first page.
pub trait FeedClient {
    fn fetch_page(&mut self, token: Option<&str>) -> Result<FeedPage, FeedError>;
}

/// Downloads the bytes of an image referenced by an entry.
pub trait ImageFetcher {
    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>, FeedError>;
}

/// Wait step run before every page request.
pub trait Pacer {
    fn wait(&mut self);
}

/// Keeps at least `delay` between the starts of consecutive requests.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    last: Option<Instant>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_DELAY)
    }
}

impl Pacer for FixedDelay {
    fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn wait(&mut self) {}
}

/// Shared flag a caller sets to stop a crawl between entries and before network calls.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Next page to request; `None` is the first page.
    Fetching(Option<String>),
    Done,
}

/// Lazy, ordered sequence of every entry in the feed.
///
/// Pages are requested only once the entries of the previous page have been consumed. A fetch
/// error is yielded once and ends the sequence.
pub struct EntrySource<C, P> {
    client: C,
    pacer: P,
    state: State,
    buffer: VecDeque<Entry>,
    cancel: Option<CancelFlag>,
    pages: usize,
}

impl<C: FeedClient, P: Pacer> EntrySource<C, P> {
    pub fn new(client: C, pacer: P) -> Self {
        Self {
            client,
            pacer,
            state: State::Fetching(None),
            buffer: VecDeque::new(),
            cancel: None,
            pages: 0,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    fn fetch(&mut self, token: Option<String>) -> Result<(), FeedError> {
        let page = self.client.fetch_page(token.as_deref())?;
        self.pages += 1;
        let next = page.next_page_token();
        info!(
            page = self.pages,
            token = token.as_deref().unwrap_or("first"),
            entries = page.entries.len(),
            "fetched feed page"
        );
        self.state = match next {
            Some(next) if Some(&next) == token.as_ref() => {
                warn!(token = %next, "feed points back at the current page; stopping");
                State::Done
            }
            Some(next) => State::Fetching(Some(next)),
            None => State::Done,
        };
        self.buffer.extend(page.entries);
        Ok(())
    }
}

impl<C: FeedClient, P: Pacer> Iterator for EntrySource<C, P> {
    type Item = Result<Entry, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            let token = match &self.state {
                State::Done => return None,
                State::Fetching(token) => token.clone(),
            };
            self.pacer.wait();
            if self.cancel_requested() {
                info!(pages = self.pages, "cancelled; not requesting further pages");
                self.state = State::Done;
                return None;
            }
            if let Err(e) = self.fetch(token) {
                self.state = State::Done;
                return Some(Err(e));
            }
        }
    }
}
