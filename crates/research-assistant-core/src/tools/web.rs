//! Web search through the DuckDuckGo instant-answer API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ToolError, truncate_with_ellipsis};
use crate::ResearchError;

/// Snippet length kept per hit.
pub const SNIPPET_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait WebSearchService: Send + Sync {
    /// Return at most `max_results` hits in ranking order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, ToolError>;
}

pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl DuckDuckGoSearch {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self, ResearchError> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|err| {
            ResearchError::InvalidConfiguration(format!("invalid web search URL {endpoint}: {err}"))
        })?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl WebSearchService for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, ToolError> {
        debug!(%query, "querying DuckDuckGo");
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|err| ToolError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Service(format!("DuckDuckGo returned status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| ToolError::Transport(err.to_string()))?;
        parse_instant_answer(&body, max_results)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Topic {
    Entry {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<Topic>,
    },
}

/// Reduce an instant-answer payload to ranked hits.
///
/// Order: the abstract, then direct results, then related topics with
/// grouped topics flattened in place.
pub fn parse_instant_answer(body: &str, max_results: usize) -> Result<Vec<WebHit>, ToolError> {
    let answer: InstantAnswer = serde_json::from_str(body)
        .map_err(|err| ToolError::Service(format!("malformed DuckDuckGo payload: {err}")))?;

    let mut hits = Vec::new();
    if !answer.abstract_text.is_empty() {
        hits.push(WebHit {
            title: answer.heading.clone(),
            url: answer.abstract_url.clone(),
            snippet: truncate_with_ellipsis(&answer.abstract_text, SNIPPET_CHARS),
        });
    }

    let mut entries = Vec::new();
    flatten_topics(&answer.results, &mut entries);
    flatten_topics(&answer.related_topics, &mut entries);
    hits.extend(entries.into_iter().map(|(text, url)| WebHit {
        title: title_from_text(text),
        url: url.to_string(),
        snippet: truncate_with_ellipsis(text, SNIPPET_CHARS),
    }));

    hits.truncate(max_results);
    Ok(hits)
}

fn flatten_topics<'a>(topics: &'a [Topic], out: &mut Vec<(&'a str, &'a str)>) {
    for topic in topics {
        match topic {
            Topic::Entry { text, first_url } if !text.is_empty() => {
                out.push((text.as_str(), first_url.as_str()))
            }
            Topic::Entry { .. } => {}
            Topic::Group { topics } => flatten_topics(topics, out),
        }
    }
}

fn title_from_text(text: &str) -> String {
    text.split_once(" - ")
        .map(|(title, _)| title)
        .unwrap_or(text)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "Heading": "Rust (programming language)",
        "AbstractText": "Rust is a general-purpose programming language emphasizing performance, type safety, and concurrency. It enforces memory safety without a garbage collector, using a borrow checker instead.",
        "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
        "Results": [
            {"Text": "Official site - Rust home page", "FirstURL": "https://www.rust-lang.org"}
        ],
        "RelatedTopics": [
            {"Text": "Cargo - Rust package manager", "FirstURL": "https://doc.rust-lang.org/cargo"},
            {"Name": "See also", "Topics": [
                {"Text": "Ferris - Unofficial mascot", "FirstURL": "https://rustacean.net"}
            ]}
        ]
    }"#;

    #[test]
    fn abstract_comes_first_and_snippets_are_truncated() {
        let hits = parse_instant_answer(PAYLOAD, 3).expect("payload parses");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Rust (programming language)");
        assert!(hits[0].snippet.ends_with("..."));
        assert_eq!(hits[0].snippet.chars().count(), SNIPPET_CHARS + 3);
        assert_eq!(hits[1].title, "Official site");
        assert_eq!(hits[1].url, "https://www.rust-lang.org");
        assert_eq!(hits[2].title, "Cargo");
    }

    #[test]
    fn grouped_topics_are_flattened() {
        let hits = parse_instant_answer(PAYLOAD, 10).expect("payload parses");
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[3].url, "https://rustacean.net");
    }

    #[test]
    fn empty_answer_yields_no_hits() {
        let hits = parse_instant_answer("{}", 3).expect("empty payload parses");
        assert!(hits.is_empty());
    }

    #[test]
    fn garbage_is_a_service_error() {
        let err = parse_instant_answer("<html>", 3).unwrap_err();
        assert!(matches!(err, ToolError::Service(_)));
    }
}
