//! Serialize a [`Document`] back to markup.

use super::{Document, NodeData, NodeId};

/// Elements that never have content; rendered as `<tag .../>`.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

pub(crate) fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

impl Document {
    /// Markup for everything reachable from the root.
    pub fn to_html(&self) -> String {
        self.node_to_html(self.root())
    }

    /// Markup for the children of `id` (or the node itself for leaves).
    pub fn node_to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        match self.data(id) {
            NodeData::Document => {
                for child in self.children(id) {
                    self.render(*child, false, &mut out);
                }
            }
            _ => self.render(id, false, &mut out),
        }
        out
    }

    fn render(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match self.data(id) {
            NodeData::Document => {
                for child in self.children(id) {
                    self.render(*child, raw_text, out);
                }
            }
            NodeData::Doctype { name } => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Text(text) if raw_text => out.push_str(text),
            NodeData::Text(text) => out.push_str(&escape_text(text)),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.key);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr.value));
                    out.push('"');
                }
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                let raw = RAW_TEXT_ELEMENTS.contains(&name.as_str());
                for child in self.children(id) {
                    self.render(*child, raw, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_document() {
        let src = "<html><head></head><body><p class=\"x\">Hello, <b>world</b></p></body></html>";
        let doc = Document::parse_html(src);
        assert_eq!(doc.to_html(), src);
    }

    #[test]
    fn void_elements_self_close() {
        let mut doc = Document::new();
        let root = doc.root();
        let meta = doc.create_element("meta", &[("charset", "UTF-8")]);
        doc.append_child(root, meta);
        assert_eq!(doc.to_html(), "<meta charset=\"UTF-8\"/>");
    }

    #[test]
    fn escapes_text_and_attributes() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a", &[("title", "say \"hi\" & bye")]);
        let text = doc.create_text("1 < 2 & 3 > 2");
        doc.append_child(root, a);
        doc.append_child(a, text);
        assert_eq!(
            doc.to_html(),
            "<a title=\"say &quot;hi&quot; &amp; bye\">1 &lt; 2 &amp; 3 &gt; 2</a>"
        );
    }

    #[test]
    fn script_content_is_not_escaped() {
        let doc = Document::parse_html(
            "<html><head><script>if (a < b && c) {}</script></head><body></body></html>",
        );
        assert!(doc
            .to_html()
            .contains("<script>if (a < b && c) {}</script>"));
    }
}
