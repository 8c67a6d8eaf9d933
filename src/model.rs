//! Canonical data model for a crawled blog: entries and feed pages.
//!
//! Entries are decoded from one feed page (see [`crate::feed::decode_feed`]) and never mutated
//! afterwards; filters read them, the path resolver derives file names from them.

use chrono::{DateTime, Datelike, FixedOffset};
use reqwest::Url;

/// Media type of entry content the exporter knows how to rewrite.
pub const HTML_MEDIA_TYPE: &str = "text/html";

/// One post.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub title: String,
    pub author: String,
    pub links: Vec<Link>,
    pub edited: DateTime<FixedOffset>,
    pub updated: DateTime<FixedOffset>,
    pub published: DateTime<FixedOffset>,
    /// Category labels in feed order.
    pub categories: Vec<String>,
    pub draft: bool,
    pub content: Content,
}

/// A typed link (`rel="alternate"`, `rel="edit"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub media_type: String,
}

/// Content blob tagged with its media type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    pub media_type: String,
    pub body: String,
}

impl Entry {
    /// The `rel="alternate"` link pointing at the public page of the post.
    pub fn alternate_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == "alternate")
    }

    /// Relative path identifying the post, e.g. `entry/2020/03/01/123456`.
    ///
    /// Taken from the alternate link's URL path. Posts without one fall back to
    /// `entry/{last '-' separated segment of the id}`.
    pub fn path(&self) -> String {
        let from_link = self
            .alternate_link()
            .and_then(|l| Url::parse(&l.href).ok())
            .map(|u| u.path().trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        match from_link {
            Some(p) => p,
            None => {
                let suffix = self
                    .id
                    .rsplit(|c: char| matches!(c, '-' | ':' | '/'))
                    .next()
                    .unwrap_or_default();
                format!("entry/{}", suffix)
            }
        }
    }

    /// Publication year, used to group the archive pages.
    pub fn year(&self) -> i32 {
        self.published.year()
    }
}

/// One paginated batch of entries plus its navigation links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub links: Vec<Link>,
    pub entries: Vec<Entry>,
}

impl FeedPage {
    fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// Token for the following page, or None when this is the last page.
    ///
    /// The token is the `next` link with the `first` link plus `?page=` stripped from its front.
    /// Without a `first` link pagination is unsupported and this returns None. When the prefix
    /// does not match, the `page` query parameter of the `next` URL is used instead.
    pub fn next_page_token(&self) -> Option<String> {
        let first = self.link("first").filter(|l| !l.href.is_empty())?;
        let next = self.link("next").filter(|l| !l.href.is_empty())?;
        let prefix = format!("{}?page=", first.href);
        let token = match next.href.strip_prefix(&prefix) {
            Some(rest) => rest.to_string(),
            None => Url::parse(&next.href)
                .ok()?
                .query_pairs()
                .find(|(k, _)| k == "page")
                .map(|(_, v)| v.into_owned())?,
        };
        Some(token).filter(|t| !t.is_empty())
    }
}
