//! Build a [`Document`] from markup using the `scraper` HTML5 parser.

use super::{Document, NodeId};
use ego_tree::NodeRef;
use scraper::{Html, Node};

impl Document {
    /// Parse a full HTML document. HTML5 error recovery means this never fails:
    /// missing `html`, `head` and `body` elements are synthesized by the parser.
    pub fn parse_html(markup: &str) -> Document {
        let parsed = Html::parse_document(markup);
        let mut doc = Document::new();
        let root = doc.root();
        for child in parsed.tree.root().children() {
            import(&mut doc, root, child);
        }
        doc
    }
}

fn import(doc: &mut Document, parent: NodeId, node: NodeRef<'_, Node>) {
    let id = match node.value() {
        Node::Element(element) => {
            let attrs: Vec<(&str, &str)> = element.attrs().collect();
            doc.create_element(element.name(), &attrs)
        }
        Node::Text(text) => doc.create_text(&text.text),
        Node::Comment(comment) => doc.create_comment(&comment.comment),
        Node::Doctype(doctype) => doc.create_doctype(doctype.name()),
        Node::Document | Node::Fragment => {
            for child in node.children() {
                import(doc, parent, child);
            }
            return;
        }
        _ => return,
    };
    doc.append_child(parent, id);
    for child in node.children() {
        import(doc, id, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;

    #[test]
    fn parse_synthesizes_head_and_body() {
        let doc = Document::parse_html("<p>Hello</p>");
        let head = doc.find_element("head");
        let body = doc.find_element("body");
        assert!(head.is_some());
        let body = body.expect("body");
        assert_eq!(doc.text_content(body), "Hello");
    }

    #[test]
    fn parse_keeps_attributes_and_comments() {
        let doc = Document::parse_html(
            "<!DOCTYPE html><html><head></head><body><!-- note --><img src=\"a.png\"></body></html>",
        );
        let img = doc.find_element("img").expect("img");
        assert_eq!(doc.attr(img, "src"), Some("a.png"));
        let first = doc.first_child(doc.root()).expect("doctype");
        assert_eq!(
            doc.data(first),
            &NodeData::Doctype {
                name: "html".to_string()
            }
        );
        let body = doc.find_element("body").expect("body");
        let comment = doc.first_child(body).expect("comment");
        assert_eq!(doc.data(comment), &NodeData::Comment(" note ".to_string()));
    }

    #[test]
    fn attributes_keep_source_order() {
        let doc =
            Document::parse_html(r##"<img src="a.png" alt="b"><a href="#" class="keyword">k</a>"##);
        let img = doc.find_element("img").expect("img");
        let keys: Vec<&str> = doc.attrs(img).iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["src", "alt"]);
        let body = doc.find_element("body").expect("body");
        assert_eq!(
            doc.node_to_html(body),
            r##"<body><img src="a.png" alt="b"/><a href="#" class="keyword">k</a></body>"##
        );
    }
}
