//! AtomPub feed decoding with a quick-xml pull reader.
//!
//! Elements are matched by local name, so `app:draft` and `hatena:formatted-content` are seen as
//! `draft` and `formatted-content` whatever prefix the server binds.

use crate::feed::FeedError;
use crate::model::{Content, Entry, FeedPage, Link};
use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

fn decode_err(reason: impl std::fmt::Display) -> FeedError {
    FeedError::Decode {
        page: None,
        reason: reason.to_string(),
    }
}

/// Entry under construction while its element is open.
#[derive(Default)]
struct EntryBuilder {
    id: Option<String>,
    title: String,
    author: String,
    links: Vec<Link>,
    edited: Option<DateTime<FixedOffset>>,
    updated: Option<DateTime<FixedOffset>>,
    published: Option<DateTime<FixedOffset>>,
    categories: Vec<String>,
    draft: bool,
    content: Option<Content>,
    formatted_content: Option<Content>,
    /// `type` attribute of the content element currently open.
    pending_type: String,
}

impl EntryBuilder {
    fn build(self) -> Result<Entry, FeedError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| decode_err("entry without <id>"))?;
        let missing = |field: &str| decode_err(format!("entry {} has no <{}>", id, field));
        let published = self.published.ok_or_else(|| missing("published"))?;
        let updated = self.updated.unwrap_or(published);
        let edited = self.edited.unwrap_or(updated);
        Ok(Entry {
            title: self.title,
            author: self.author,
            links: self.links,
            edited,
            updated,
            published,
            categories: self.categories,
            draft: self.draft,
            content: self
                .formatted_content
                .or(self.content)
                .unwrap_or_default(),
            id,
        })
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr_value(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, FeedError> {
    for attr in e.attributes() {
        let attr = attr.map_err(decode_err)?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            let value = attr.unescape_value().map_err(decode_err)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_time(text: &str) -> Result<DateTime<FixedOffset>, FeedError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map_err(|e| decode_err(format!("invalid timestamp {:?}: {}", text.trim(), e)))
}

/// Decode one feed page document.
pub fn decode_feed(xml: &str) -> Result<FeedPage, FeedError> {
    let mut reader = Reader::from_str(xml);
    let mut page = FeedPage::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut saw_feed = false;

    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) => {
                let name = local_name(&e);
                text.clear();
                saw_feed |= name == "feed";
                open_element(&e, &name, stack.last(), &mut page, &mut entry)?;
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                open_element(&e, &name, stack.last(), &mut page, &mut entry)?;
                if name == "entry" {
                    close_entry(&mut page, &mut entry)?;
                }
            }
            Event::Text(t) => text.push_str(&t.unescape().map_err(decode_err)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                let value = std::mem::take(&mut text);
                if name == "entry" {
                    close_entry(&mut page, &mut entry)?;
                } else if let Some(builder) = entry.as_mut() {
                    close_entry_field(builder, &name, &stack, value)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(decode_err(format!("unexpected end of document inside <{}>", open)));
    }
    if !saw_feed {
        return Err(decode_err("document has no <feed> element"));
    }
    Ok(page)
}

fn open_element(
    e: &BytesStart<'_>,
    name: &str,
    parent: Option<&String>,
    page: &mut FeedPage,
    entry: &mut Option<EntryBuilder>,
) -> Result<(), FeedError> {
    match name {
        "entry" => *entry = Some(EntryBuilder::default()),
        "link" => {
            let link = Link {
                rel: attr_value(e, "rel")?.unwrap_or_default(),
                href: attr_value(e, "href")?.unwrap_or_default(),
                media_type: attr_value(e, "type")?.unwrap_or_default(),
            };
            match (parent.map(String::as_str), entry.as_mut()) {
                (Some("entry"), Some(builder)) => builder.links.push(link),
                (Some("feed"), _) => page.links.push(link),
                _ => {}
            }
        }
        "category" => {
            if let Some(builder) = entry.as_mut() {
                if let Some(term) = attr_value(e, "term")? {
                    builder.categories.push(term);
                }
            }
        }
        "content" | "formatted-content" => {
            if let Some(builder) = entry.as_mut() {
                builder.pending_type = attr_value(e, "type")?.unwrap_or_default();
            }
        }
        _ => {}
    }
    Ok(())
}

fn close_entry(page: &mut FeedPage, entry: &mut Option<EntryBuilder>) -> Result<(), FeedError> {
    if let Some(builder) = entry.take() {
        page.entries.push(builder.build()?);
    }
    Ok(())
}

/// `stack` no longer contains the element being closed; its last item is the parent.
fn close_entry_field(
    builder: &mut EntryBuilder,
    name: &str,
    stack: &[String],
    value: String,
) -> Result<(), FeedError> {
    let parent = stack.last().map(String::as_str);
    match (parent, name) {
        (Some("entry"), "id") => builder.id = Some(value.trim().to_string()),
        (Some("entry"), "title") => builder.title = value,
        (Some("author"), "name") => builder.author = value.trim().to_string(),
        (Some("entry"), "edited") => builder.edited = Some(parse_time(&value)?),
        (Some("entry"), "updated") => builder.updated = Some(parse_time(&value)?),
        (Some("entry"), "published") => builder.published = Some(parse_time(&value)?),
        (Some("control"), "draft") => builder.draft = value.trim() == "yes",
        (Some("entry"), "content") => {
            builder.content = Some(Content {
                media_type: std::mem::take(&mut builder.pending_type),
                body: value,
            })
        }
        (Some("entry"), "formatted-content") => {
            builder.formatted_content = Some(Content {
                media_type: std::mem::take(&mut builder.pending_type),
                body: value,
            })
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:app="http://www.w3.org/2007/app">
  <link rel="first" href="https://blog.hatena.ne.jp/alice/alice.example.com/atom/entry" />
  <link rel="next" href="https://blog.hatena.ne.jp/alice/alice.example.com/atom/entry?page=1583020800" />
  <title>Alice's blog</title>
  <entry>
    <id>tag:blog.hatena.ne.jp,2013:blog-alice-123-456789</id>
    <link rel="edit" href="https://blog.hatena.ne.jp/alice/alice.example.com/atom/entry/456789"/>
    <link rel="alternate" type="text/html" href="https://alice.example.com/entry/2020/03/01/123456"/>
    <author><name>alice</name></author>
    <title>Hello &amp; welcome</title>
    <updated>2020-03-01T12:34:56+09:00</updated>
    <published>2020-03-01T12:00:00+09:00</published>
    <app:edited>2020-03-02T08:00:00+09:00</app:edited>
    <summary type="text">Hello</summary>
    <content type="text/x-markdown">Hello **world**</content>
    <hatena:formatted-content type="text/html" xmlns:hatena="http://www.hatena.ne.jp/info/xmlns#">&lt;p&gt;Hello &lt;strong&gt;world&lt;/strong&gt;&lt;/p&gt;</hatena:formatted-content>
    <category term="Games" />
    <category term="Hobby" />
    <app:control>
      <app:draft>no</app:draft>
    </app:control>
  </entry>
  <entry>
    <id>tag:blog.hatena.ne.jp,2013:blog-alice-123-456790</id>
    <title>Draft</title>
    <published>2019-12-31T23:00:00Z</published>
    <content type="text/html"><![CDATA[<p>raw</p>]]></content>
    <app:control><app:draft>yes</app:draft></app:control>
  </entry>
</feed>"#;

    #[test]
    fn decodes_links_and_entries() -> Result<(), FeedError> {
        let page = decode_feed(FEED)?;
        assert_eq!(page.links.len(), 2);
        assert_eq!(page.next_page_token().as_deref(), Some("1583020800"));
        assert_eq!(page.entries.len(), 2);

        let first = &page.entries[0];
        assert_eq!(first.id, "tag:blog.hatena.ne.jp,2013:blog-alice-123-456789");
        assert_eq!(first.title, "Hello & welcome");
        assert_eq!(first.author, "alice");
        assert_eq!(first.categories, ["Games", "Hobby"]);
        assert!(!first.draft);
        assert_eq!(first.content.media_type, "text/html");
        assert_eq!(
            first.content.body,
            "<p>Hello <strong>world</strong></p>"
        );
        assert_eq!(first.path(), "entry/2020/03/01/123456");
        assert_eq!(first.edited.to_rfc3339(), "2020-03-02T08:00:00+09:00");
        Ok(())
    }

    #[test]
    fn falls_back_to_plain_content_and_defaults_timestamps() -> Result<(), FeedError> {
        let page = decode_feed(FEED)?;
        let draft = &page.entries[1];
        assert!(draft.draft);
        assert_eq!(draft.content.body, "<p>raw</p>");
        assert_eq!(draft.updated, draft.published);
        assert_eq!(draft.edited, draft.published);
        assert!(draft.links.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_entry_without_id() {
        let xml = r#"<feed><entry><published>2020-01-01T00:00:00Z</published></entry></feed>"#;
        let err = decode_feed(xml).unwrap_err();
        assert!(matches!(err, FeedError::Decode { .. }));
    }

    #[test]
    fn rejects_invalid_timestamp() {
        let xml = r#"<feed><entry><id>x</id><published>yesterday</published></entry></feed>"#;
        assert!(matches!(
            decode_feed(xml),
            Err(FeedError::Decode { .. })
        ));
    }

    #[test]
    fn rejects_non_feed_documents() {
        assert!(matches!(
            decode_feed("<html><body>Service Unavailable</body></html>"),
            Err(FeedError::Decode { .. })
        ));
        assert!(decode_feed("<feed><entry>").is_err());
    }
}
