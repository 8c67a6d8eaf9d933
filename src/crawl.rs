//! Crawl orchestration: drives the entry source, rewrites each entry and writes the results.

use crate::dom::Document;
use crate::feed::{CancelFlag, FeedError, ImageFetcher};
use crate::filter::{image_file_name, image_sources, FilterError, Pipeline};
use crate::index::{render_archive_index, render_category_index, render_landing, IndexLink};
use crate::model::{Entry, HTML_MEDIA_TYPE};
use crate::path::PathResolver;
use crate::store::{OutputStore, StoreError};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("{0}")]
    Feed(#[from] FeedError),

    #[error("Entry {id} has content of type {media_type:?}; only text/html is supported")]
    UnsupportedContentType { id: String, media_type: String },

    #[error("Failed to download image {url} for entry {id}: {source}")]
    Image {
        id: String,
        url: String,
        #[source]
        source: FeedError,
    },

    #[error("Failed to process entry {id} ({path}): {source}")]
    Filter {
        id: String,
        path: String,
        #[source]
        source: FilterError,
    },

    #[error("Failed to save entry {id} ({path}): {source}")]
    Store {
        id: String,
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to write index page {path}: {source}")]
    Index {
        path: String,
        #[source]
        source: StoreError,
    },
}

impl CrawlError {
    /// Fatal errors end the crawl; the others only cost the entry they occurred on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CrawlError::Filter { .. } | CrawlError::Store { .. })
    }
}

/// An entry that was skipped, with the reason.
#[derive(Debug)]
pub struct EntryFailure {
    pub id: String,
    pub path: String,
    pub error: CrawlError,
}

/// Outcome of a crawl that ran to completion (or was cancelled).
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Entries whose document was written.
    pub written: usize,
    /// Image files written.
    pub images: usize,
    /// Category, archive and landing pages written.
    pub index_pages: usize,
    pub failures: Vec<EntryFailure>,
    /// True when the cancel flag stopped the crawl early. Index pages are not written then.
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

pub struct CrawlOptions<'a> {
    /// Write category, archive and landing pages after the last entry.
    pub write_indexes: bool,
    /// Title of the landing page.
    pub blog_title: String,
    /// Called with the relative path of every file written.
    pub on_saved: Option<&'a dyn Fn(&str)>,
    pub cancel: Option<CancelFlag>,
}

impl Default for CrawlOptions<'_> {
    fn default() -> Self {
        Self {
            write_indexes: true,
            blog_title: String::new(),
            on_saved: None,
            cancel: None,
        }
    }
}

/// Entries grouped for the index pages. Only entries that were written are recorded.
#[derive(Debug, Default)]
struct Groups {
    by_category: BTreeMap<String, Vec<IndexLink>>,
    by_year: BTreeMap<i32, Vec<IndexLink>>,
}

impl Groups {
    fn record(&mut self, entry: &Entry, url: &str) {
        let link = IndexLink::new(entry.title.clone(), url);
        for category in &entry.categories {
            self.by_category
                .entry(category.clone())
                .or_default()
                .push(link.clone());
        }
        self.by_year.entry(entry.year()).or_default().push(link);
    }
}

/// Exports every entry of a feed into an output store.
pub struct Crawler<'a, W> {
    pipeline: Pipeline,
    resolver: PathResolver,
    store: W,
    images: Option<Box<dyn ImageFetcher + 'a>>,
    options: CrawlOptions<'a>,
}

impl<'a, W: OutputStore> Crawler<'a, W> {
    pub fn new(pipeline: Pipeline, resolver: PathResolver, store: W) -> Self {
        Self {
            pipeline,
            resolver,
            store,
            images: None,
            options: CrawlOptions::default(),
        }
    }

    /// Download the images each entry references and save them next to its document.
    pub fn with_images(mut self, fetcher: impl ImageFetcher + 'a) -> Self {
        self.images = Some(Box::new(fetcher));
        self
    }

    pub fn with_options(mut self, options: CrawlOptions<'a>) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &W {
        &self.store
    }

    fn cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancelFlag::is_cancelled)
    }

    fn saved(&self, path: &str) {
        info!(path, "saved");
        if let Some(cb) = self.options.on_saved {
            cb(path);
        }
    }

    /// Export every entry yielded by `entries`, then the index pages.
    ///
    /// Filter and store failures are recorded in the report and the crawl moves on to the next
    /// entry. Feed, image download and content type failures abort the crawl.
    pub fn run<I>(&mut self, entries: I) -> Result<CrawlReport, CrawlError>
    where
        I: IntoIterator<Item = Result<Entry, FeedError>>,
    {
        let mut report = CrawlReport::default();
        let mut groups = Groups::default();
        if self.images.is_some() && !self.pipeline.rewrites_images() {
            warn!(
                "images are downloaded but no image-path filter is registered; \
                 pages will keep remote image URLs"
            );
        }

        for entry in entries {
            if self.cancelled() {
                break;
            }
            let entry = entry?;
            match self.export_entry(&entry) {
                Ok(None) => break,
                Ok(Some(images)) => {
                    report.written += 1;
                    report.images += images;
                    groups.record(&entry, &self.resolver.entry(&entry).url);
                }
                Err(e) if !e.is_fatal() => {
                    let path = self.resolver.entry(&entry).file;
                    warn!(entry = %entry.id, path = %path, error = %e, "skipping entry");
                    report.failures.push(EntryFailure {
                        id: entry.id.clone(),
                        path,
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if self.cancelled() {
            info!(written = report.written, "crawl cancelled; index pages not written");
            report.cancelled = true;
            return Ok(report);
        }
        if self.options.write_indexes {
            report.index_pages = self.write_indexes(&groups)?;
        }
        Ok(report)
    }

    /// Returns the number of images written, or None when the crawl was cancelled before the
    /// entry was complete. An entry that is not written leaves none of its images behind.
    fn export_entry(&mut self, entry: &Entry) -> Result<Option<usize>, CrawlError> {
        let media_type = entry.content.media_type.split(';').next().unwrap_or("").trim();
        if !media_type.eq_ignore_ascii_case(HTML_MEDIA_TYPE) {
            return Err(CrawlError::UnsupportedContentType {
                id: entry.id.clone(),
                media_type: entry.content.media_type.clone(),
            });
        }
        let target = self.resolver.entry(entry);
        debug!(entry = %entry.id, path = %target.file, "processing entry");

        let mut doc = Document::parse_html(&entry.content.body);
        let sources = if self.images.is_some() {
            remote_images(&doc)
        } else {
            Vec::new()
        };

        self.pipeline
            .run(entry, &mut doc)
            .map_err(|e| CrawlError::Filter {
                id: entry.id.clone(),
                path: target.file.clone(),
                source: e,
            })?;
        let html = doc.to_html();

        let mut saved_images = Vec::new();
        let outcome = match self.save_images(entry, &target.file, &sources, &mut saved_images) {
            Ok(true) => self
                .store
                .write(&target.file, html.as_bytes())
                .map(|_| true)
                .map_err(|e| CrawlError::Store {
                    id: entry.id.clone(),
                    path: target.file.clone(),
                    source: e,
                }),
            other => other,
        };
        if !matches!(outcome, Ok(true)) {
            self.discard(&saved_images);
        }
        if outcome? {
            self.saved(&target.file);
            Ok(Some(saved_images.len()))
        } else {
            Ok(None)
        }
    }

    /// Download and store the entry's images, recording each written path in `saved`.
    /// Returns false when the crawl was cancelled before every image was fetched.
    fn save_images(
        &mut self,
        entry: &Entry,
        document: &str,
        sources: &[String],
        saved: &mut Vec<String>,
    ) -> Result<bool, CrawlError> {
        for src in sources {
            if self.cancelled() {
                debug!(entry = %entry.id, "cancelled while downloading images");
                return Ok(false);
            }
            let name = image_file_name(src).map_err(|e| CrawlError::Filter {
                id: entry.id.clone(),
                path: document.to_string(),
                source: e,
            })?;
            let bytes = match self.images.as_mut() {
                Some(fetcher) => fetcher.fetch_image(src).map_err(|e| CrawlError::Image {
                    id: entry.id.clone(),
                    url: src.clone(),
                    source: e,
                })?,
                None => continue,
            };
            let image = self.resolver.image(entry, &name);
            self.store
                .write(&image.file, &bytes)
                .map_err(|e| CrawlError::Store {
                    id: entry.id.clone(),
                    path: image.file.clone(),
                    source: e,
                })?;
            self.saved(&image.file);
            saved.push(image.file);
        }
        Ok(true)
    }

    /// Remove the images of an entry whose document was not written.
    fn discard(&mut self, images: &[String]) {
        for path in images {
            match self.store.remove(path) {
                Ok(()) => debug!(path = %path, "removed image of unfinished entry"),
                Err(e) => warn!(path = %path, error = %e, "could not remove image of unfinished entry"),
            }
        }
    }

    fn write_page(&mut self, path: &str, html: &str) -> Result<(), CrawlError> {
        self.store
            .write(path, html.as_bytes())
            .map_err(|e| CrawlError::Index {
                path: path.to_string(),
                source: e,
            })?;
        self.saved(path);
        Ok(())
    }

    /// Category pages, archive pages (years ascending), then the landing page.
    fn write_indexes(&mut self, groups: &Groups) -> Result<usize, CrawlError> {
        let mut written = 0;
        let mut categories = Vec::new();
        for (name, entries) in &groups.by_category {
            let path = self.resolver.category(name);
            self.write_page(&path.file, &render_category_index(name, entries))?;
            categories.push(IndexLink::new(name.clone(), path.url));
            written += 1;
        }
        let mut archives = Vec::new();
        for (year, entries) in &groups.by_year {
            let path = self.resolver.archive(*year);
            self.write_page(&path.file, &render_archive_index(*year, entries))?;
            archives.push(IndexLink::new(year.to_string(), path.url));
            written += 1;
        }
        let landing = self.resolver.landing();
        let html = render_landing(&self.options.blog_title, &archives, &categories);
        self.write_page(&landing.file, &html)?;
        Ok(written + 1)
    }
}

/// Distinct absolute http(s) image URLs in document order.
fn remote_images(doc: &Document) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for src in image_sources(doc) {
        let remote = src.starts_with("http://") || src.starts_with("https://");
        if !remote {
            debug!(src = %src, "not downloading non-remote image");
            continue;
        }
        if !sources.contains(&src) {
            sources.push(src);
        }
    }
    sources
}
