//! Feed adapter: RSS 2.0 / Atom parsing with quick-xml
//!
//! Streaming parser over the whole feed document. Malformed entries are
//! dropped and logged; a reader-level failure keeps the entries parsed
//! so far and surfaces as the adapter's `feed_fetch_error`.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use paperwatch_core::record::{Journal, Paper, SourceFailure, SourceFetch};
use paperwatch_core::{http, FailureKind};

/// One feed entry before conversion to a canonical record.
#[derive(Debug, Default)]
struct FeedEntry {
    title: String,
    authors: Vec<String>,
    link: String,
    doi: String,
    summary: String,
    published: Option<NaiveDate>,
    updated: Option<NaiveDate>,
}

/// Fetches a journal's feed document and converts its entries.
#[derive(Debug, Default)]
pub struct FeedFetcher;

impl FeedFetcher {
    pub fn fetch(&self, journal: &Journal, days_back: i64) -> SourceFetch {
        let resp = match http::get(&journal.feed_url) {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("{}: feed fetch failed: {e}", journal.name);
                return SourceFetch::failed(FailureKind::FeedFetch, e.to_string());
            }
        };
        if !resp.is_success() {
            let message = format!("HTTP {} fetching feed", resp.status);
            log::error!("{}: {message}", journal.name);
            return SourceFetch::failed(FailureKind::FeedFetch, message);
        }

        let (entries, parse_error) = parse_feed(&resp.body);
        if let Some(message) = &parse_error {
            log::warn!("{}: feed parse error: {message}", journal.name);
        }

        let cutoff = (Utc::now() - chrono::Duration::days(days_back)).date_naive();
        let papers = entries_to_papers(entries, journal, cutoff);

        SourceFetch {
            papers,
            failure: parse_error.map(|message| SourceFailure {
                kind: FailureKind::FeedFetch,
                message,
            }),
        }
    }
}

/// Convert parsed entries, dropping titleless ones and anything older
/// than the cutoff. Undated entries are kept: feeds are not
/// chronologically guaranteed and a missing date is not evidence of age.
fn entries_to_papers(entries: Vec<FeedEntry>, journal: &Journal, cutoff: NaiveDate) -> Vec<Paper> {
    entries
        .into_iter()
        .filter_map(|entry| entry_to_paper(entry, journal))
        .filter(|paper| paper.published_date.map_or(true, |d| d >= cutoff))
        .collect()
}

/// Parse a feed document. Returns the entries recovered plus the reader
/// error, if the document broke before its end.
fn parse_feed(xml: &str) -> (Vec<FeedEntry>, Option<String>) {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if matches!(e.name().as_ref(), b"item" | b"entry") => {
                let end_tag = e.name().as_ref().to_vec();
                match parse_entry(&mut reader, &end_tag) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => log::debug!("skipping malformed feed entry: {err}"),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                let message =
                    format!("XML error at byte {}: {e}", reader.buffer_position());
                return (entries, Some(message));
            }
            _ => {}
        }
        buf.clear();
    }

    (entries, None)
}

fn parse_entry(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<FeedEntry> {
    let mut entry = FeedEntry::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"title" => entry.title = text_until(reader, b"title")?,
                b"dc:creator" => {
                    let name = text_until(reader, b"dc:creator")?;
                    if !name.is_empty() {
                        entry.authors.push(name);
                    }
                }
                b"author" => {
                    if let Some(name) = parse_author(reader)? {
                        entry.authors.push(name);
                    }
                }
                b"link" => {
                    let (href, rel) = link_attrs(&e);
                    let text = text_until(reader, b"link")?;
                    consider_link(&mut entry, href.unwrap_or(text), rel);
                }
                b"prism:doi" => entry.doi = text_until(reader, b"prism:doi")?,
                b"pubDate" | b"published" | b"dc:date" | b"prism:publicationDate" => {
                    let raw = text_until(reader, e.name().as_ref())?;
                    if entry.published.is_none() {
                        entry.published = parse_feed_date(&raw);
                    }
                }
                b"updated" => {
                    let raw = text_until(reader, b"updated")?;
                    entry.updated = parse_feed_date(&raw);
                }
                b"description" | b"summary" => {
                    entry.summary = text_until(reader, e.name().as_ref())?;
                }
                b"content" => {
                    let text = text_until(reader, b"content")?;
                    if entry.summary.is_empty() {
                        entry.summary = text;
                    }
                }
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"link" => {
                let (href, rel) = link_attrs(&e);
                if let Some(href) = href {
                    consider_link(&mut entry, href, rel);
                }
            }
            Event::End(e) if e.name().as_ref() == end_tag => break,
            Event::Eof => bail!("unexpected EOF inside entry"),
            _ => {}
        }
        buf.clear();
    }

    Ok(entry)
}

/// `<author>` holds either a plain string (RSS) or nested
/// `<name>`/`<email>` children (Atom).
fn parse_author(reader: &mut Reader<&[u8]>) -> Result<Option<String>> {
    let mut text = String::new();
    let mut name = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"name" => {
                name = Some(text_until(reader, b"name")?);
            }
            Event::Start(e) => {
                let end = e.name().as_ref().to_vec();
                text_until(reader, &end)?;
            }
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::End(e) if e.name().as_ref() == b"author" => break,
            Event::Eof => bail!("unexpected EOF inside author"),
            _ => {}
        }
        buf.clear();
    }

    let value = name.unwrap_or_else(|| text.trim().to_string());
    Ok((!value.is_empty()).then_some(value))
}

/// Atom links carry the target in `href`; `rel` distinguishes the
/// article page ("alternate" or absent) from self/related links.
fn link_attrs(e: &BytesStart) -> (Option<String>, Option<String>) {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => href = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            b"rel" => rel = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {}
        }
    }
    (href, rel)
}

fn consider_link(entry: &mut FeedEntry, candidate: String, rel: Option<String>) {
    if candidate.is_empty() {
        return;
    }
    let alternate = rel.as_deref().map_or(true, |r| r == "alternate");
    if entry.link.is_empty() || alternate {
        entry.link = candidate;
    }
}

fn entry_to_paper(entry: FeedEntry, journal: &Journal) -> Option<Paper> {
    let title = entry.title.trim();
    if title.is_empty() {
        log::debug!("{}: dropping entry without title", journal.name);
        return None;
    }

    // Prefer a DOI baked into the link, then the dedicated field.
    let doi = match entry.link.find("doi.org/") {
        Some(idx) => entry.link[idx + "doi.org/".len()..].to_string(),
        None => entry.doi.clone(),
    };

    Some(Paper {
        title: title.to_string(),
        journal_name: journal.name.clone(),
        authors: entry.authors,
        abstract_text: entry.summary,
        doi,
        url: entry.link,
        published_date: entry.published.or(entry.updated),
        fetched_at: None,
    })
}

/// Feed dates come as RFC 2822 (RSS), RFC 3339 (Atom), or a bare ISO
/// date (prism/dc). Unparseable input yields no date, never an error.
fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Read text content of an element, flattening nested inline markup.
fn text_until(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == end_tag {
                    break;
                }
            }
            Event::Eof => bail!("unexpected EOF inside <{}>", String::from_utf8_lossy(end_tag)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal() -> Journal {
        Journal {
            name: "Test Journal".into(),
            feed_url: "https://example.com/rss".into(),
            status: "Working".into(),
            ..Default::default()
        }
    }

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:prism="http://prismstandard.org/namespaces/basic/2.0/">
  <channel>
    <title>Test Journal</title>
    <item>
      <title>First &amp; Foremost</title>
      <link>https://doi.org/10.1234/first</link>
      <dc:creator>Alice Smith</dc:creator>
      <dc:creator>Bob Jones</dc:creator>
      <description>An abstract.</description>
      <pubDate>Tue, 04 Aug 2026 10:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Second</title>
      <link>https://publisher.example/articles/2</link>
      <prism:doi>10.1234/second</prism:doi>
      <prism:publicationDate>2026-08-01</prism:publicationDate>
    </item>
    <item>
      <link>https://publisher.example/articles/untitled</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Test Journal</title>
  <entry>
    <title>Atom Article</title>
    <link rel="self" href="https://example.com/feed/1"/>
    <link rel="alternate" href="https://example.com/articles/1"/>
    <author><name>Carol Lee</name></author>
    <summary>Summary text.</summary>
    <updated>2026-08-02T09:30:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_entries() {
        let (entries, err) = parse_feed(RSS);
        assert!(err.is_none());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "First & Foremost");
        assert_eq!(entries[0].authors, vec!["Alice Smith", "Bob Jones"]);
        assert_eq!(entries[0].published, NaiveDate::from_ymd_opt(2026, 8, 4));
        assert_eq!(entries[1].doi, "10.1234/second");
        assert_eq!(entries[1].published, NaiveDate::from_ymd_opt(2026, 8, 1));
    }

    #[test]
    fn parses_atom_entry_with_alternate_link() {
        let (entries, err) = parse_feed(ATOM);
        assert!(err.is_none());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.com/articles/1");
        assert_eq!(entries[0].authors, vec!["Carol Lee"]);
        assert_eq!(entries[0].updated, NaiveDate::from_ymd_opt(2026, 8, 2));
    }

    #[test]
    fn titleless_entry_dropped() {
        let (entries, _) = parse_feed(RSS);
        let cutoff = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let papers = entries_to_papers(entries, &journal(), cutoff);
        assert_eq!(papers.len(), 2);
        assert!(papers.iter().all(|p| !p.title.is_empty()));
    }

    #[test]
    fn doi_extracted_from_link() {
        let (entries, _) = parse_feed(RSS);
        let cutoff = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let papers = entries_to_papers(entries, &journal(), cutoff);
        assert_eq!(papers[0].doi, "10.1234/first");
        assert_eq!(papers[1].doi, "10.1234/second");
    }

    #[test]
    fn cutoff_filters_old_entries_keeps_undated() {
        let xml = r#"<rss><channel>
          <item><title>Old</title><pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate></item>
          <item><title>Undated</title></item>
        </channel></rss>"#;
        let (entries, _) = parse_feed(xml);
        let cutoff = NaiveDate::from_ymd_opt(2026, 7, 30).unwrap();
        let papers = entries_to_papers(entries, &journal(), cutoff);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Undated");
    }

    #[test]
    fn published_preferred_over_updated() {
        let xml = r#"<feed><entry>
          <title>T</title>
          <published>2026-08-01T00:00:00Z</published>
          <updated>2026-08-03T00:00:00Z</updated>
        </entry></feed>"#;
        let (entries, _) = parse_feed(xml);
        let paper = entry_to_paper(entries.into_iter().next().unwrap(), &journal()).unwrap();
        assert_eq!(paper.published_date, NaiveDate::from_ymd_opt(2026, 8, 1));
    }

    #[test]
    fn updated_used_when_no_published() {
        let xml = r#"<feed><entry>
          <title>T</title>
          <updated>2026-08-03T00:00:00Z</updated>
        </entry></feed>"#;
        let (entries, _) = parse_feed(xml);
        let paper = entry_to_paper(entries.into_iter().next().unwrap(), &journal()).unwrap();
        assert_eq!(paper.published_date, NaiveDate::from_ymd_opt(2026, 8, 3));
    }

    #[test]
    fn rss_plain_author_string() {
        let xml = r#"<rss><channel><item>
          <title>T</title>
          <author>editor@example.com (Dana Wu)</author>
        </item></channel></rss>"#;
        let (entries, _) = parse_feed(xml);
        assert_eq!(entries[0].authors, vec!["editor@example.com (Dana Wu)"]);
    }

    #[test]
    fn broken_document_keeps_parsed_entries() {
        let broken = r#"<rss><channel>
          <item><title>Complete</title></item>
          <!bad"#;
        let (entries, err) = parse_feed(broken);
        assert!(err.is_some());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Complete");
    }

    #[test]
    fn entry_truncated_at_eof_dropped() {
        let xml = r#"<rss><channel>
          <item><title>Orphaned"#;
        let (entries, _) = parse_feed(xml);
        assert!(entries.is_empty());
    }

    #[test]
    fn feed_date_formats() {
        assert_eq!(
            parse_feed_date("Tue, 04 Aug 2026 10:00:00 GMT"),
            NaiveDate::from_ymd_opt(2026, 8, 4)
        );
        assert_eq!(
            parse_feed_date("2026-08-04T10:00:00+02:00"),
            NaiveDate::from_ymd_opt(2026, 8, 4)
        );
        assert_eq!(parse_feed_date("2026-08-04"), NaiveDate::from_ymd_opt(2026, 8, 4));
        assert_eq!(parse_feed_date("not a date"), None);
        assert_eq!(parse_feed_date(""), None);
    }

    #[test]
    fn cdata_summary_recovered() {
        let xml = r#"<rss><channel><item>
          <title>T</title>
          <description><![CDATA[<p>HTML body</p>]]></description>
        </item></channel></rss>"#;
        let (entries, _) = parse_feed(xml);
        assert_eq!(entries[0].summary, "<p>HTML body</p>");
    }
}
