//! Document rewrite rules and the ordered pipeline that applies them.
//!
//! Every filter sees the entry it is rendering and the whole parsed document, and mutates the
//! document in place. Filters run in registration order; each observes the tree as the previous
//! ones left it.

mod body;
mod head;

pub use body::{CodeFilter, ImagePathFilter, KeywordFilter, ORIGINAL_URL_ATTR};
pub use head::{
    AssetFilter, CategoryFilter, DateTimeFilter, DraftFilter, EncodingFilter, LinkFilter,
    TitleFilter,
};

use crate::dom::{transform, walk, Document, NodeId, Visit};
use crate::model::Entry;
use reqwest::Url;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::convert::Infallible;
use thiserror::Error;
use tracing::debug;

/// Longest image base name kept as-is; longer names are replaced by their SHA-1.
pub const MAX_IMAGE_NAME_LEN: usize = 127;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid image URL {src:?}: {reason}")]
    InvalidImageUrl { src: String, reason: String },
}

/// One rewrite rule.
pub trait Filter {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    fn process(&self, entry: &Entry, doc: &mut Document) -> Result<(), FilterError>;
}

/// Run `f` on every element named `tag`, in document order.
pub(crate) fn for_each_element<F>(doc: &mut Document, tag: &str, mut f: F) -> Result<(), FilterError>
where
    F: FnMut(&mut Document, NodeId) -> Result<(), FilterError>,
{
    let root = doc.root();
    transform(doc, root, &mut |doc: &mut Document, node| {
        if doc.is_element(node, tag) {
            f(doc, node)?;
        }
        Ok(Visit::Keep)
    })
}

/// Local file name for an image URL: the last component of its decoded path (trailing slashes
/// ignored), or the uppercase hex SHA-1 of that name when it is longer than
/// [`MAX_IMAGE_NAME_LEN`] bytes. Relative URLs are accepted. The result never contains `/`.
pub fn image_file_name(src: &str) -> Result<String, FilterError> {
    let invalid = |reason: String| FilterError::InvalidImageUrl {
        src: src.to_string(),
        reason,
    };
    let url = Url::parse("file:///")
        .and_then(|base| base.join(src.trim()))
        .map_err(|e| invalid(e.to_string()))?;
    let path = percent_encoding::percent_decode_str(url.path()).decode_utf8_lossy();
    let name = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(invalid("URL path has no file name".to_string()));
    }
    if name.len() > MAX_IMAGE_NAME_LEN {
        let digest = Sha1::digest(name.as_bytes());
        return Ok(digest.iter().map(|b| format!("{:02X}", b)).collect());
    }
    Ok(name)
}

/// `src` of every `<img>` in document order.
pub fn image_sources(doc: &Document) -> Vec<String> {
    let mut sources = Vec::new();
    let _ = walk(doc, doc.root(), &mut |doc: &Document, node| {
        if doc.is_element(node, "img") {
            if let Some(src) = doc.attr(node, "src") {
                sources.push(src.to_string());
            }
        }
        Ok::<(), Infallible>(())
    });
    sources
}

/// Stylesheets and scripts linked from every page's head, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssetOptions {
    #[serde(default)]
    pub stylesheets: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

/// Filter names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Title,
    Keyword,
    Category,
    ImagePath,
    Code,
    Draft,
    #[serde(rename = "datetime")]
    DateTime,
    Link,
    Encoding,
    Asset,
}

impl FilterKind {
    /// Default registration order.
    pub const STANDARD: [FilterKind; 10] = [
        FilterKind::Title,
        FilterKind::Keyword,
        FilterKind::Category,
        FilterKind::ImagePath,
        FilterKind::Code,
        FilterKind::Draft,
        FilterKind::DateTime,
        FilterKind::Link,
        FilterKind::Encoding,
        FilterKind::Asset,
    ];

    fn build(self, assets: &AssetOptions) -> Box<dyn Filter> {
        match self {
            FilterKind::Title => Box::new(TitleFilter),
            FilterKind::Keyword => Box::new(KeywordFilter),
            FilterKind::Category => Box::new(CategoryFilter),
            FilterKind::ImagePath => Box::new(ImagePathFilter),
            FilterKind::Code => Box::new(CodeFilter),
            FilterKind::Draft => Box::new(DraftFilter),
            FilterKind::DateTime => Box::new(DateTimeFilter),
            FilterKind::Link => Box::new(LinkFilter),
            FilterKind::Encoding => Box::new(EncodingFilter),
            FilterKind::Asset => Box::new(AssetFilter::new(assets.clone())),
        }
    }
}

/// Ordered list of filters.
#[derive(Default)]
pub struct Pipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every filter, in the default order.
    pub fn standard(assets: &AssetOptions) -> Self {
        Self::from_kinds(&FilterKind::STANDARD, assets)
    }

    pub fn from_kinds(kinds: &[FilterKind], assets: &AssetOptions) -> Self {
        Self {
            filters: kinds.iter().map(|k| k.build(assets)).collect(),
        }
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Whether an image-path rewrite is registered, i.e. whether downloaded images will be
    /// referenced by their local names.
    pub fn rewrites_images(&self) -> bool {
        self.names().contains(&"image-path")
    }

    /// Apply every filter in order, stopping at the first failure.
    pub fn run(&self, entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        for filter in &self.filters {
            if let Err(e) = filter.process(entry, doc) {
                debug!(filter = filter.name(), entry = %entry.id, error = %e, "filter failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::tests::sample_entry;

    /// Parse `html`, run `filter` with the sample entry and render the result.
    pub(crate) fn apply(filter: &dyn Filter, html: &str) -> String {
        apply_with(filter, &sample_entry(), html)
    }

    pub(crate) fn apply_with(filter: &dyn Filter, entry: &Entry, html: &str) -> String {
        let mut doc = Document::parse_html(html);
        filter.process(entry, &mut doc).expect("filter succeeds");
        doc.to_html()
    }

    #[test]
    fn image_file_name_takes_base_name() {
        assert_eq!(
            image_file_name("https://my-cdn.example.com/2020/03/01/foobar.png?w=300"),
            Ok("foobar.png".to_string())
        );
        assert_eq!(image_file_name("foobar.png"), Ok("foobar.png".to_string()));
        assert_eq!(
            image_file_name("https://cdn.example.com/a/caf%C3%A9.jpg"),
            Ok("café.jpg".to_string())
        );
    }

    #[test]
    fn long_image_names_become_sha1_fingerprints() {
        let long = format!("https://cdn.example.com/img/{}.png", "x".repeat(196));
        let name = image_file_name(&long).expect("valid url");
        assert_eq!(name.len(), 40);
        assert!(name.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(image_file_name(&long), Ok(name));
    }

    #[test]
    fn image_file_name_splits_encoded_slashes() {
        assert_eq!(
            image_file_name("https://cdn.example.com/img/sub%2Fdir%2Fcat.png"),
            Ok("cat.png".to_string())
        );
        assert_eq!(
            image_file_name("https://cdn.example.com/x%2F..%2F..%2Fcat.png"),
            Ok("cat.png".to_string())
        );
    }

    #[test]
    fn image_file_name_ignores_trailing_slash() {
        assert_eq!(
            image_file_name("https://cdn.example.com/a/b/"),
            Ok("b".to_string())
        );
    }

    #[test]
    fn image_file_name_rejects_urls_without_file_name() {
        assert!(image_file_name("https://cdn.example.com/").is_err());
        assert!(image_file_name("https://cdn.example.com/a/..%2F").is_err());
        assert!(image_file_name("http://[::1").is_err());
    }

    #[test]
    fn image_sources_in_document_order() {
        let doc = Document::parse_html(
            r#"<p><img src="a.png"><span><img src="b.png"></span><img alt="none"></p>"#,
        );
        assert_eq!(image_sources(&doc), ["a.png", "b.png"]);
    }

    #[test]
    fn filter_kinds_deserialize_from_config_names() {
        #[derive(Deserialize)]
        struct Config {
            filters: Vec<FilterKind>,
        }
        let config: Config =
            toml::from_str(r#"filters = ["title", "image-path", "datetime"]"#).expect("toml");
        assert_eq!(
            config.filters,
            [FilterKind::Title, FilterKind::ImagePath, FilterKind::DateTime]
        );
    }

    #[test]
    fn standard_pipeline_order() {
        let pipeline = Pipeline::standard(&AssetOptions::default());
        assert_eq!(
            pipeline.names(),
            [
                "title",
                "keyword",
                "category",
                "image-path",
                "code",
                "draft",
                "datetime",
                "link",
                "encoding",
                "asset"
            ]
        );
        assert!(pipeline.rewrites_images());
    }

    struct Failing;

    impl Filter for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn process(&self, _: &Entry, _: &mut Document) -> Result<(), FilterError> {
            Err(FilterError::InvalidImageUrl {
                src: "x".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    #[test]
    fn pipeline_stops_at_first_error() {
        let pipeline = Pipeline::new()
            .with(TitleFilter)
            .with(Failing)
            .with(EncodingFilter);
        let mut doc = Document::parse_html("<p>x</p>");
        assert!(pipeline.run(&sample_entry(), &mut doc).is_err());
        let html = doc.to_html();
        assert!(html.contains("<title>Greeting</title>"));
        assert!(!html.contains("charset"));
    }

    #[test]
    fn later_filters_see_earlier_changes() {
        let pipeline = Pipeline::new().with(KeywordFilter).with(TitleFilter);
        let mut doc =
            Document::parse_html(r#"<html><head></head><body><a class="keyword">W</a></body></html>"#);
        pipeline.run(&sample_entry(), &mut doc).expect("pipeline");
        assert_eq!(
            doc.to_html(),
            "<html><head><title>Greeting</title></head><body><h1>Greeting</h1>W</body></html>"
        );
    }
}
