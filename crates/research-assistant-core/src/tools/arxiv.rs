//! Academic search against the arXiv Atom API.

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ToolError, truncate_with_ellipsis};
use crate::ResearchError;

/// Summary length kept per paper.
pub const SUMMARY_CHARS: usize = 200;
/// Author names kept per paper.
pub const AUTHOR_LIMIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperHit {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: String,
    pub pdf_url: String,
}

/// Paper lookup; results come back most relevant first.
#[async_trait]
pub trait PaperIndex: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperHit>, ToolError>;
}

pub struct ArxivIndex {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl ArxivIndex {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self, ResearchError> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|err| {
            ResearchError::InvalidConfiguration(format!("invalid arXiv URL {endpoint}: {err}"))
        })?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PaperIndex for ArxivIndex {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperHit>, ToolError> {
        let search_query = format!("all:{}", query.trim());
        let limit = max_results.to_string();
        debug!(%search_query, "querying arXiv");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", limit.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|err| ToolError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Service(format!("arXiv returned status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| ToolError::Transport(err.to_string()))?;
        let mut hits = parse_atom_feed(&body)?;
        hits.truncate(max_results);
        Ok(hits)
    }
}

/// Parse an arXiv Atom feed into reduced paper hits.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<PaperHit>, ToolError> {
    if !xml.contains("<feed") {
        return Err(ToolError::Service("response is not an Atom feed".into()));
    }
    Ok(entry_blocks(xml).filter_map(parse_entry).collect())
}

fn entry_blocks(xml: &str) -> impl Iterator<Item = &str> {
    let mut rest = xml;
    std::iter::from_fn(move || {
        let start = rest.find("<entry>")?;
        let end = rest[start..].find("</entry>")? + start + "</entry>".len();
        let block = &rest[start..end];
        rest = &rest[end..];
        Some(block)
    })
}

fn parse_entry(entry: &str) -> Option<PaperHit> {
    let title = normalize_whitespace(&tag_text(entry, "title")?);

    let authors = blocks(entry, "author")
        .filter_map(|author| tag_text(author, "name"))
        .map(|name| normalize_whitespace(&name))
        .take(AUTHOR_LIMIT)
        .collect();

    let summary = normalize_whitespace(&tag_text(entry, "summary").unwrap_or_default());
    let published = tag_text(entry, "published")
        .map(|raw| format_date(&raw))
        .unwrap_or_default();

    let pdf_url = tags(entry, "link")
        .find(|link| {
            attribute(link, "title").as_deref() == Some("pdf")
                || attribute(link, "type").as_deref() == Some("application/pdf")
        })
        .and_then(|link| attribute(link, "href"))
        .or_else(|| {
            tag_text(entry, "id").map(|id| id.replace("/abs/", "/pdf/"))
        })
        .unwrap_or_default();

    Some(PaperHit {
        title,
        authors,
        summary: truncate_with_ellipsis(&summary, SUMMARY_CHARS),
        published,
        pdf_url,
    })
}

fn format_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| raw.trim().chars().take(10).collect())
}

/// Text of the first `<tag ...>text</tag>`.
fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut search_from = 0;
    loop {
        let start = xml[search_from..].find(&open)? + search_from;
        let after_name = start + open.len();
        // Skip longer names sharing the prefix, e.g. <id> vs <idx>.
        match xml[after_name..].chars().next() {
            Some('>') | Some(' ') | Some('\n') | Some('\t') => {}
            _ => {
                search_from = after_name;
                continue;
            }
        }
        let content_start = xml[start..].find('>')? + start + 1;
        let content_end = xml[content_start..].find(&close)? + content_start;
        return Some(decode_entities(xml[content_start..content_end].trim()));
    }
}

fn blocks<'a>(xml: &'a str, tag: &str) -> impl Iterator<Item = &'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut rest = xml;
    std::iter::from_fn(move || {
        let start = rest.find(&open)?;
        let end = rest[start..].find(&close)? + start + close.len();
        let block = &rest[start..end];
        rest = &rest[end..];
        Some(block)
    })
}

/// Opening tags such as `<link href=".." />`.
fn tags<'a>(xml: &'a str, tag: &str) -> impl Iterator<Item = &'a str> {
    let open = format!("<{tag} ");
    let mut rest = xml;
    std::iter::from_fn(move || {
        let start = rest.find(&open)?;
        let end = rest[start..].find('>')? + start + 1;
        let element = &rest[start..end];
        rest = &rest[end..];
        Some(element)
    })
}

fn attribute(element: &str, name: &str) -> Option<String> {
    let needle = format!(" {name}=\"");
    let start = element.find(&needle)? + needle.len();
    let end = element[start..].find('"')? + start;
    Some(decode_entities(&element[start..end]))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
