//! Aggregate pages: one per category, one per publication year, and the landing page.

use crate::dom::{escape_attr, escape_text};

/// A titled link on an index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLink {
    pub title: String,
    pub url: String,
}

impl IndexLink {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

fn open_page(out: &mut String, title: &str) {
    let title = escape_text(title);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str("<meta charset=\"UTF-8\"/>\n");
    out.push_str(&format!("<title>{}</title>\n", title));
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!("<h1>{}</h1>\n", title));
}

fn close_page(out: &mut String) {
    out.push_str("</body>\n</html>\n");
}

fn link_list(out: &mut String, links: &[IndexLink]) {
    out.push_str("<ul>\n");
    for link in links {
        out.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_attr(&link.url),
            escape_text(&link.title)
        ));
    }
    out.push_str("</ul>\n");
}

fn list_page(title: &str, entries: &[IndexLink]) -> String {
    let mut out = String::new();
    open_page(&mut out, title);
    link_list(&mut out, entries);
    close_page(&mut out);
    out
}

/// Entries filed under `category`, in crawl order.
pub fn render_category_index(category: &str, entries: &[IndexLink]) -> String {
    list_page(&format!("Category: {}", category), entries)
}

/// Entries published in `year`, in crawl order.
pub fn render_archive_index(year: i32, entries: &[IndexLink]) -> String {
    list_page(&format!("Archive: {}", year), entries)
}

/// Blog landing page linking every archive year and every category.
pub fn render_landing(title: &str, archives: &[IndexLink], categories: &[IndexLink]) -> String {
    let mut out = String::new();
    open_page(&mut out, title);
    out.push_str("<h2>Archives</h2>\n");
    link_list(&mut out, archives);
    out.push_str("<h2>By category</h2>\n");
    link_list(&mut out, categories);
    close_page(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_page_lists_entries() {
        let html = render_category_index(
            "Games",
            &[
                IndexLink::new("First", "/entry/1/index.html"),
                IndexLink::new("Second", "/entry/2/index.html"),
            ],
        );
        assert!(html.starts_with("<!DOCTYPE html>\n"));
        assert!(html.contains("<title>Category: Games</title>"));
        let first = html.find("/entry/1/index.html").expect("first link");
        let second = html.find("/entry/2/index.html").expect("second link");
        assert!(first < second);
    }

    #[test]
    fn titles_and_urls_are_escaped() {
        let html = render_archive_index(
            2020,
            &[IndexLink::new("<script>&", "/q?a=\"b\"")],
        );
        assert!(html.contains("<h1>Archive: 2020</h1>"));
        assert!(html.contains("<li><a href=\"/q?a=&quot;b&quot;\">&lt;script&gt;&amp;</a></li>"));
    }

    #[test]
    fn landing_has_archive_and_category_sections() {
        let html = render_landing(
            "alice.example.com",
            &[IndexLink::new("2019", "/archive/2019/index.html")],
            &[IndexLink::new("C++", "/category/C%2B%2B/index.html")],
        );
        let archives = html.find("<h2>Archives</h2>").expect("archives");
        let categories = html.find("<h2>By category</h2>").expect("categories");
        assert!(archives < categories);
        assert!(html.contains("<a href=\"/category/C%2B%2B/index.html\">C++</a>"));
    }

    #[test]
    fn empty_lists_still_render() {
        let html = render_landing("blog", &[], &[]);
        assert_eq!(html.matches("<ul>\n</ul>").count(), 2);
    }
}
