//! Filters that add to `<head>` (and the title heading at the top of `<body>`).

use super::{for_each_element, AssetOptions, Filter, FilterError};
use crate::dom::{transform, Document, NodeId, Visit};
use crate::model::Entry;
use chrono::SecondsFormat;

/// `<meta property="hatena:{property}" content="{content}"/>`
fn meta(doc: &mut Document, property: &str, content: &str) -> NodeId {
    let property = format!("hatena:{}", property);
    doc.create_element("meta", &[("property", property.as_str()), ("content", content)])
}

fn element_with_text(doc: &mut Document, tag: &str, text: &str) -> NodeId {
    let element = doc.create_element(tag, &[]);
    let text = doc.create_text(text);
    doc.append_child(element, text);
    element
}

/// Append `<meta>` elements built from `(property, content)` pairs to every `<head>`.
fn append_meta(doc: &mut Document, pairs: &[(&str, String)]) -> Result<(), FilterError> {
    for_each_element(doc, "head", |doc, head| {
        for (property, content) in pairs {
            let tag = meta(doc, property, content);
            doc.append_child(head, tag);
        }
        Ok(())
    })
}

/// Puts the entry title in `<title>` and in an `<h1>` opening the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleFilter;

impl Filter for TitleFilter {
    fn name(&self) -> &'static str {
        "title"
    }

    fn process(&self, entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        let root = doc.root();
        transform(doc, root, &mut |doc: &mut Document, node| {
            if doc.is_element(node, "head") {
                let title = element_with_text(doc, "title", &entry.title);
                doc.prepend_child(node, title);
            } else if doc.is_element(node, "body") {
                let heading = element_with_text(doc, "h1", &entry.title);
                doc.prepend_child(node, heading);
            }
            Ok::<_, FilterError>(Visit::Keep)
        })
    }
}

/// One `hatena:category` meta element per category, in entry order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryFilter;

impl Filter for CategoryFilter {
    fn name(&self) -> &'static str {
        "category"
    }

    fn process(&self, entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        let pairs: Vec<(&str, String)> = entry
            .categories
            .iter()
            .map(|c| ("category", c.clone()))
            .collect();
        append_meta(doc, &pairs)
    }
}

/// `hatena:draft` is `yes` or `no`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftFilter;

impl Filter for DraftFilter {
    fn name(&self) -> &'static str {
        "draft"
    }

    fn process(&self, entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        let value = if entry.draft { "yes" } else { "no" };
        append_meta(doc, &[("draft", value.to_string())])
    }
}

/// Edited, updated and published timestamps (RFC 3339, `Z` for UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeFilter;

impl Filter for DateTimeFilter {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn process(&self, entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        let format = |t: &chrono::DateTime<chrono::FixedOffset>| {
            t.to_rfc3339_opts(SecondsFormat::Secs, true)
        };
        append_meta(
            doc,
            &[
                ("edited", format(&entry.edited)),
                ("updated", format(&entry.updated)),
                ("published", format(&entry.published)),
            ],
        )
    }
}

/// `hatena:alternate` with the public URL of the post. Entries without one get no element.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkFilter;

impl Filter for LinkFilter {
    fn name(&self) -> &'static str {
        "link"
    }

    fn process(&self, entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        match entry.alternate_link() {
            Some(link) => append_meta(doc, &[("alternate", link.href.clone())]),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingFilter;

impl Filter for EncodingFilter {
    fn name(&self) -> &'static str {
        "encoding"
    }

    fn process(&self, _entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        for_each_element(doc, "head", |doc, head| {
            let charset = doc.create_element("meta", &[("charset", "UTF-8")]);
            doc.append_child(head, charset);
            Ok(())
        })
    }
}

/// Links the configured stylesheets, then the scripts.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    assets: AssetOptions,
}

impl AssetFilter {
    pub fn new(assets: AssetOptions) -> Self {
        Self { assets }
    }
}

impl Filter for AssetFilter {
    fn name(&self) -> &'static str {
        "asset"
    }

    fn process(&self, _entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        for_each_element(doc, "head", |doc, head| {
            for href in &self.assets.stylesheets {
                let link = doc.create_element(
                    "link",
                    &[("rel", "stylesheet"), ("type", "text/css"), ("href", href.as_str())],
                );
                doc.append_child(head, link);
            }
            for src in &self.assets.scripts {
                let script = doc.create_element("script", &[("src", src.as_str())]);
                doc.append_child(head, script);
            }
            Ok(())
        })
    }
}
