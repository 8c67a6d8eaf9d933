//! Output file paths and public URL paths. Everything here is a pure function of its inputs.

use crate::model::Entry;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except the unreserved characters `A-Z a-z 0-9 - _ . ~`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode every byte outside the unreserved set (RFC 3986 2.3).
pub fn escape_segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}

/// A file path relative to the output root paired with the URL path it is served at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    pub file: String,
    pub url: String,
}

/// Maps entries and aggregate keys to output locations under a public URL prefix.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    url_prefix: String,
}

impl PathResolver {
    /// `url_prefix` is the path the exported tree is served under (`""` for the site root).
    /// Surrounding slashes are ignored.
    pub fn new(url_prefix: &str) -> Self {
        Self {
            url_prefix: url_prefix.trim_matches('/').to_string(),
        }
    }

    fn url(&self, file: &str) -> String {
        if self.url_prefix.is_empty() {
            format!("/{}", file)
        } else {
            format!("/{}/{}", self.url_prefix, file)
        }
    }

    pub fn entry(&self, entry: &Entry) -> OutputPath {
        let file = format!("{}/index.html", entry.path());
        OutputPath {
            url: self.url(&file),
            file,
        }
    }

    pub fn image(&self, entry: &Entry, image_name: &str) -> OutputPath {
        let file = format!("{}/{}", entry.path(), image_name);
        OutputPath {
            url: self.url(&file),
            file,
        }
    }

    /// The directory name is encoded twice so that after a web server decodes the request path
    /// once, it still matches the once-encoded segment of the public URL.
    pub fn category(&self, name: &str) -> OutputPath {
        let once = escape_segment(name);
        OutputPath {
            file: format!("category/{}/index.html", escape_segment(&once)),
            url: self.url(&format!("category/{}/index.html", once)),
        }
    }

    pub fn archive(&self, year: i32) -> OutputPath {
        let file = format!("archive/{}/index.html", year);
        OutputPath {
            url: self.url(&file),
            file,
        }
    }

    pub fn landing(&self) -> OutputPath {
        OutputPath {
            file: "index.html".to_string(),
            url: self.url("index.html"),
        }
    }
}
