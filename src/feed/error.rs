//! Error type for feed traversal and image downloads.

use crate::auth::AuthError;
use thiserror::Error;

/// Failure while talking to the feed service or decoding what it returned.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching {url}{}: {body}", page_suffix(.page))]
    HttpStatus {
        status: u16,
        url: String,
        /// Page token of the failed request; None for the first page and for images.
        page: Option<String>,
        body: String,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Could not sign request: {0}")]
    Auth(#[from] AuthError),

    #[error("Malformed feed{}: {reason}", page_suffix(.page))]
    Decode {
        page: Option<String>,
        reason: String,
    },
}

fn page_suffix(page: &Option<String>) -> String {
    match page {
        Some(p) => format!(" (page {})", p),
        None => String::new(),
    }
}
