//! Depth-first, pre-order traversal with in-place rewriting.
//!
//! [`transform`] hands every descendant of a node to a callback which decides whether the node
//! stays ([`Visit::Keep`]), is swapped for another node ([`Visit::Replace`]) or is dropped
//! ([`Visit::Remove`]). The next sibling is captured before the callback runs, so the callback
//! may detach the node it is looking at without derailing the iteration.

use super::{Document, NodeId};

/// Outcome of a transform callback for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Leave the node in place and descend into its children.
    Keep,
    /// Put this node at the visited node's position; its children are traversed next.
    Replace(NodeId),
    /// Detach the visited node. Its subtree is not traversed.
    Remove,
}

/// Visit every descendant of `root` (not `root` itself) in document order.
pub fn walk<E, F>(doc: &Document, root: NodeId, f: &mut F) -> Result<(), E>
where
    F: FnMut(&Document, NodeId) -> Result<(), E>,
{
    for child in doc.children(root) {
        f(doc, *child)?;
        walk(doc, *child, f)?;
    }
    Ok(())
}

/// Rewrite the descendants of `root` in place. The first callback error stops the traversal
/// and is returned as-is; changes made before it stay applied.
pub fn transform<E, F>(doc: &mut Document, root: NodeId, f: &mut F) -> Result<(), E>
where
    F: FnMut(&mut Document, NodeId) -> Result<Visit, E>,
{
    let mut current = doc.first_child(root);
    while let Some(node) = current {
        let next = doc.next_sibling(node);
        let index = doc.children(root).iter().position(|c| *c == node);
        let visit = f(doc, node)?;
        let descend = apply(doc, node, visit);
        if let Some(target) = descend {
            transform(doc, target, f)?;
        }
        current = match next {
            // The snapshotted sibling was detached by the callback. Resume after the visited
            // node if it is still here, otherwise at the position it used to occupy.
            Some(n) if doc.parent(n) != Some(root) => match descend {
                Some(d) if doc.parent(d) == Some(root) => doc.next_sibling(d),
                _ => index.and_then(|i| doc.children(root).get(i).copied()),
            },
            other => other,
        };
    }
    Ok(())
}

/// Like [`transform`] but offers `root` itself to the callback first. Removing the root
/// leaves it with no children; replacing it makes the replacement the root's only child.
pub fn transform_root<E, F>(doc: &mut Document, root: NodeId, f: &mut F) -> Result<(), E>
where
    F: FnMut(&mut Document, NodeId) -> Result<Visit, E>,
{
    match f(doc, root)? {
        Visit::Keep => transform(doc, root, f),
        Visit::Remove => {
            doc.clear_children(root);
            Ok(())
        }
        Visit::Replace(new) if new == root => transform(doc, root, f),
        Visit::Replace(new) => {
            doc.clear_children(root);
            doc.append_child(root, new);
            transform(doc, new, f)
        }
    }
}

fn apply(doc: &mut Document, node: NodeId, visit: Visit) -> Option<NodeId> {
    match visit {
        Visit::Keep => Some(node),
        Visit::Replace(new) => {
            doc.replace(node, new);
            Some(new)
        }
        Visit::Remove => {
            doc.detach(node);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;
    use std::convert::Infallible;

    const PREFIX: &str = "<html><head></head><body>";
    const SUFFIX: &str = "</body></html>";

    fn run<F>(body: &str, mut f: F) -> String
    where
        F: FnMut(&mut Document, NodeId) -> Result<Visit, Infallible>,
    {
        let mut doc = Document::parse_html(&format!("{PREFIX}{body}{SUFFIX}"));
        let root = doc.root();
        transform(&mut doc, root, &mut f).unwrap();
        let html = doc.to_html();
        html.strip_prefix(PREFIX)
            .and_then(|s| s.strip_suffix(SUFFIX))
            .unwrap_or(&html)
            .to_string()
    }

    #[test]
    fn identity_transform_leaves_tree_unchanged() {
        let body = "<p>hello, <a href=\"#\">golang</a> world</p><ul><li>1</li><li>2</li></ul>";
        assert_eq!(run(body, |_, _| Ok(Visit::Keep)), body);
    }

    #[test]
    fn removes_matching_node_and_its_subtree() {
        let out = run("<p>hello, <a href=\"#\">golang</a> world</p>", |doc, n| {
            Ok(if doc.is_element(n, "a") {
                Visit::Remove
            } else {
                Visit::Keep
            })
        });
        assert_eq!(out, "<p>hello,  world</p>");
    }

    #[test]
    fn removing_consecutive_siblings_does_not_skip_any() {
        let out = run("<i>1</i><i>2</i><i>3</i><b>keep</b><i>4</i>", |doc, n| {
            Ok(if doc.is_element(n, "i") {
                Visit::Remove
            } else {
                Visit::Keep
            })
        });
        assert_eq!(out, "<b>keep</b>");
    }

    #[test]
    fn replaces_node_with_text_at_same_position() {
        let out = run("<p>hello, <a href=\"#\">golang</a> world</p>", |doc, n| {
            if doc.is_element(n, "a") {
                let label = doc.text_content(n);
                return Ok(Visit::Replace(doc.create_text(&label)));
            }
            Ok(Visit::Keep)
        });
        assert_eq!(out, "<p>hello, golang world</p>");
    }

    #[test]
    fn replacement_children_are_kept_and_traversed() {
        let mut seen = Vec::new();
        let out = run("<a>x</a><p>after</p>", |doc, n| {
            if let NodeData::Text(t) = doc.data(n) {
                seen.push(t.clone());
            }
            if doc.is_element(n, "a") {
                let span = doc.create_element("span", &[]);
                let inner = doc.create_text("inner");
                doc.append_child(span, inner);
                return Ok(Visit::Replace(span));
            }
            Ok(Visit::Keep)
        });
        assert_eq!(out, "<span>inner</span><p>after</p>");
        assert_eq!(seen, ["inner", "after"]);
    }

    #[test]
    fn visits_in_depth_first_pre_order() {
        let doc = Document::parse_html("<div><p>a</p><p>b</p></div><span>c</span>");
        let body = doc.find_element("body").expect("body");
        let mut order = Vec::new();
        walk(&doc, body, &mut |doc: &Document, n| -> Result<(), Infallible> {
            order.push(match doc.data(n) {
                NodeData::Element { name, .. } => name.clone(),
                NodeData::Text(t) => t.clone(),
                _ => String::new(),
            });
            Ok(())
        })
        .unwrap();
        assert_eq!(order, ["div", "p", "a", "p", "b", "span", "c"]);
    }

    #[test]
    fn callback_error_aborts_traversal() {
        let mut doc = Document::parse_html("<p>1</p><p>2</p><p>3</p>");
        let root = doc.root();
        let mut visited = 0;
        let result = transform(&mut doc, root, &mut |doc: &mut Document, n| {
            if doc.is_element(n, "p") {
                visited += 1;
                if visited == 2 {
                    return Err("boom");
                }
            }
            Ok(Visit::Keep)
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(visited, 2);
    }

    #[test]
    fn removing_root_yields_empty_tree() {
        let mut doc = Document::parse_html("<p>gone</p>");
        let root = doc.root();
        transform_root(&mut doc, root, &mut |_: &mut Document, _| {
            Ok::<_, Infallible>(Visit::Remove)
        })
        .unwrap();
        assert!(doc.children(root).is_empty());
        assert_eq!(doc.to_html(), "");
    }

    #[test]
    fn removing_a_sibling_ahead_resumes_after_visited_node() {
        let mut doc = Document::parse_html("<i>1</i><b>2</b><u>3</u>");
        let body = doc.find_element("body").expect("body");
        let mut names = Vec::new();
        transform(&mut doc, body, &mut |doc: &mut Document, n| {
            if let Some(name) = doc.element_name(n) {
                names.push(name.to_string());
            }
            if doc.is_element(n, "i") {
                if let Some(next) = doc.next_sibling(n) {
                    doc.detach(next);
                }
            }
            Ok::<_, Infallible>(Visit::Keep)
        })
        .unwrap();
        assert_eq!(names, ["i", "u"]);
        assert_eq!(doc.node_to_html(body), "<body><i>1</i><u>3</u></body>");
    }

    #[test]
    fn removing_node_and_next_sibling_keeps_visiting_the_rest() {
        let mut doc = Document::parse_html("<i>1</i><b>2</b><u>3</u><s>4</s>");
        let body = doc.find_element("body").expect("body");
        let mut names = Vec::new();
        transform(&mut doc, body, &mut |doc: &mut Document, n| {
            if let Some(name) = doc.element_name(n) {
                names.push(name.to_string());
            }
            if doc.is_element(n, "i") {
                if let Some(next) = doc.next_sibling(n) {
                    doc.detach(next);
                }
                return Ok::<_, Infallible>(Visit::Remove);
            }
            Ok(Visit::Keep)
        })
        .unwrap();
        assert_eq!(names, ["i", "u", "s"]);
        assert_eq!(doc.node_to_html(body), "<body><u>3</u><s>4</s></body>");
    }
}
