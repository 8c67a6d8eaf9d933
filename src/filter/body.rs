//! Filters that rewrite the post body.

use super::{image_file_name, Filter, FilterError};
use crate::dom::{transform, Document, Visit};
use crate::model::Entry;

/// Attribute keeping the remote URL of a rewritten image.
pub const ORIGINAL_URL_ATTR: &str = "data-original-url";

/// Replaces `<a class="keyword">` auto-links with their label.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordFilter;

impl Filter for KeywordFilter {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn process(&self, _entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        let root = doc.root();
        transform(doc, root, &mut |doc: &mut Document, node| {
            if !doc.is_element(node, "a") || !doc.has_class(node, "keyword") {
                return Ok::<_, FilterError>(Visit::Keep);
            }
            match doc.first_child(node) {
                Some(first) => {
                    let label = doc.text_content(first);
                    Ok(Visit::Replace(doc.create_text(&label)))
                }
                None => Ok(Visit::Remove),
            }
        })
    }
}

/// Points `<img src>` at the local copy of the image, named by [`image_file_name`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePathFilter;

impl Filter for ImagePathFilter {
    fn name(&self) -> &'static str {
        "image-path"
    }

    fn process(&self, _entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        let root = doc.root();
        transform(doc, root, &mut |doc: &mut Document, node| {
            if !doc.is_element(node, "img") || doc.attr(node, ORIGINAL_URL_ATTR).is_some() {
                return Ok(Visit::Keep);
            }
            if let Some(src) = doc.attr(node, "src").map(str::to_string) {
                let name = image_file_name(&src)?;
                doc.set_attr(node, "src", &name);
                doc.set_attr(node, ORIGINAL_URL_ATTR, &src);
            }
            Ok(Visit::Keep)
        })
    }
}

/// Turns syntax-highlighted `<pre>` blocks back into plain text.
///
/// `<span>` children of `<pre>` are replaced by their text and `<pre>` keeps only `data-lang`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeFilter;

impl Filter for CodeFilter {
    fn name(&self) -> &'static str {
        "code"
    }

    fn process(&self, _entry: &Entry, doc: &mut Document) -> Result<(), FilterError> {
        let root = doc.root();
        transform(doc, root, &mut |doc: &mut Document, node| {
            if doc.is_element(node, "pre") {
                doc.retain_attrs(node, |a| a.key == "data-lang");
            } else if doc.is_element(node, "span")
                && doc.parent(node).is_some_and(|p| doc.is_element(p, "pre"))
            {
                let text = doc.text_content(node);
                if text.is_empty() {
                    return Ok(Visit::Remove);
                }
                return Ok(Visit::Replace(doc.create_text(&text)));
            }
            Ok::<_, FilterError>(Visit::Keep)
        })
    }
}
