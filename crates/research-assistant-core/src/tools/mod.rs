//! Capabilities offered to the agent session.
//!
//! The agent picks tools by name; [`ToolCall::parse`] maps that name through
//! [`TOOL_TABLE`] to a closed [`ToolName`] and checks the arguments against
//! the advertised schema before [`ToolProvider::invoke`] runs the typed
//! handler. Every handler converts its own failures into a
//! [`ToolInvocation`] with `succeeded == false`.

pub mod arxiv;
pub mod calculator;
pub mod web;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{instrument, warn};

pub use arxiv::{ArxivIndex, PaperHit, PaperIndex};
pub use calculator::calculate;
pub use web::{DuckDuckGoSearch, WebHit, WebSearchService};

use crate::{ResearchConfig, ResearchError};

/// Results requested from each search backend.
pub const SEARCH_RESULT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    WebSearch,
    AcademicSearch,
    Calculate,
}

/// Name, description and input field advertised to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub tool: ToolName,
    pub name: &'static str,
    pub description: &'static str,
    pub input: &'static str,
    pub input_description: &'static str,
}

impl ToolDescriptor {
    /// JSON schema with the single required string input.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            self.input.to_string(),
            json!({ "type": "string", "description": self.input_description }),
        );
        json!({
            "type": "object",
            "properties": properties,
            "required": [self.input],
        })
    }
}

pub static TOOL_TABLE: [ToolDescriptor; 3] = [
    ToolDescriptor {
        tool: ToolName::WebSearch,
        name: "web_search",
        description: "Search the web for current information using DuckDuckGo",
        input: "query",
        input_description: "Search query to look up",
    },
    ToolDescriptor {
        tool: ToolName::AcademicSearch,
        name: "arxiv_search",
        description: "Search arXiv for academic papers and research articles",
        input: "query",
        input_description: "Search query to look up",
    },
    ToolDescriptor {
        tool: ToolName::Calculate,
        name: "calculator",
        description: "Evaluate mathematical expressions. Input should be a mathematical expression like '2 + 2' or '3 * 5'.",
        input: "expression",
        input_description: "Arithmetic expression using digits, + - * / . ( ) and spaces",
    },
];

impl ToolName {
    pub fn descriptor(self) -> &'static ToolDescriptor {
        match self {
            ToolName::WebSearch => &TOOL_TABLE[0],
            ToolName::AcademicSearch => &TOOL_TABLE[1],
            ToolName::Calculate => &TOOL_TABLE[2],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.descriptor().name
    }

    /// Resolve an advertised tool name.
    pub fn lookup(name: &str) -> Option<Self> {
        TOOL_TABLE
            .iter()
            .find(|descriptor| descriptor.name == name.trim())
            .map(|descriptor| descriptor.tool)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned an unusable response: {0}")]
    Service(String),
    #[error("{0}")]
    Validation(String),
    /// Local evaluation failed; carries the evaluator's own message.
    #[error("{0}")]
    Evaluation(String),
}

/// Rejection of a tool call before any handler runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("unknown tool `{0}`; available tools are web_search, arxiv_search, calculator")]
    UnknownTool(String),
    #[error("tool `{tool}` expects a string argument `{field}`")]
    InvalidArguments { tool: ToolName, field: &'static str },
}

/// A schema-checked request for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    WebSearch { query: String },
    AcademicSearch { query: String },
    Calculate { expression: String },
}

impl ToolCall {
    /// Validate a model-issued call.
    ///
    /// Accepts either an object carrying the declared input field or a bare
    /// string, which some models emit for single-argument tools.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolCallError> {
        let tool = ToolName::lookup(name).ok_or_else(|| ToolCallError::UnknownTool(name.into()))?;
        let field = tool.descriptor().input;

        let input = match arguments {
            Value::String(text) => Some(text.as_str()),
            Value::Object(map) => map.get(field).and_then(Value::as_str),
            _ => None,
        }
        .ok_or(ToolCallError::InvalidArguments { tool, field })?
        .to_string();

        Ok(match tool {
            ToolName::WebSearch => ToolCall::WebSearch { query: input },
            ToolName::AcademicSearch => ToolCall::AcademicSearch { query: input },
            ToolName::Calculate => ToolCall::Calculate { expression: input },
        })
    }

    pub fn tool(&self) -> ToolName {
        match self {
            ToolCall::WebSearch { .. } => ToolName::WebSearch,
            ToolCall::AcademicSearch { .. } => ToolName::AcademicSearch,
            ToolCall::Calculate { .. } => ToolName::Calculate,
        }
    }

    pub fn input(&self) -> &str {
        match self {
            ToolCall::WebSearch { query } | ToolCall::AcademicSearch { query } => query,
            ToolCall::Calculate { expression } => expression,
        }
    }
}

/// One recorded tool call and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: ToolName,
    pub query: String,
    pub result: String,
    pub succeeded: bool,
}

impl ToolInvocation {
    pub fn ok(tool_name: ToolName, query: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool_name,
            query: query.into(),
            result: result.into(),
            succeeded: true,
        }
    }

    pub fn failed(
        tool_name: ToolName,
        query: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            tool_name,
            query: query.into(),
            result: result.into(),
            succeeded: false,
        }
    }
}

/// The fixed capability set handed to the agent session.
#[derive(Clone)]
pub struct ToolProvider {
    web: Arc<dyn WebSearchService>,
    papers: Arc<dyn PaperIndex>,
}

impl ToolProvider {
    pub fn new(web: Arc<dyn WebSearchService>, papers: Arc<dyn PaperIndex>) -> Self {
        Self { web, papers }
    }

    /// Wire the production DuckDuckGo and arXiv backends.
    pub fn from_config(
        config: &ResearchConfig,
        http: reqwest::Client,
    ) -> Result<Self, ResearchError> {
        let web = DuckDuckGoSearch::new(http.clone(), &config.search.web_search_url)?;
        let papers = ArxivIndex::new(http, &config.search.arxiv_url)?;
        Ok(Self::new(Arc::new(web), Arc::new(papers)))
    }

    pub fn descriptors(&self) -> &'static [ToolDescriptor] {
        &TOOL_TABLE
    }

    pub async fn invoke(&self, call: ToolCall) -> ToolInvocation {
        match call {
            ToolCall::WebSearch { query } => self.web_search(&query).await,
            ToolCall::AcademicSearch { query } => self.academic_search(&query).await,
            ToolCall::Calculate { expression } => {
                let fallback_input = expression.clone();
                tokio::task::spawn_blocking(move || calculate(&expression))
                    .await
                    .unwrap_or_else(|err| {
                        ToolInvocation::failed(
                            ToolName::Calculate,
                            fallback_input,
                            format!("Error evaluating expression: {err}"),
                        )
                    })
            }
        }
    }

    #[instrument(name = "tool.web_search", skip(self))]
    pub async fn web_search(&self, query: &str) -> ToolInvocation {
        match self.web.search(query, SEARCH_RESULT_LIMIT).await {
            Ok(hits) => match serde_json::to_string_pretty(&hits) {
                Ok(rendered) => ToolInvocation::ok(
                    ToolName::WebSearch,
                    query,
                    format!("Web search results for '{query}':\n{rendered}"),
                ),
                Err(err) => web_failure(query, err),
            },
            Err(err) => web_failure(query, err),
        }
    }

    #[instrument(name = "tool.arxiv_search", skip(self))]
    pub async fn academic_search(&self, query: &str) -> ToolInvocation {
        match self.papers.search(query, SEARCH_RESULT_LIMIT).await {
            Ok(hits) => match serde_json::to_string_pretty(&hits) {
                Ok(rendered) => ToolInvocation::ok(
                    ToolName::AcademicSearch,
                    query,
                    format!("arXiv search results for '{query}':\n{rendered}"),
                ),
                Err(err) => arxiv_failure(query, err),
            },
            Err(err) => arxiv_failure(query, err),
        }
    }
}

fn web_failure(query: &str, err: impl fmt::Display) -> ToolInvocation {
    warn!(%query, error = %err, "web search failed");
    ToolInvocation::failed(
        ToolName::WebSearch,
        query,
        format!("Error performing web search: {err}"),
    )
}

fn arxiv_failure(query: &str, err: impl fmt::Display) -> ToolInvocation {
    warn!(%query, error = %err, "arXiv search failed");
    ToolInvocation::failed(
        ToolName::AcademicSearch,
        query,
        format!("Error searching arXiv: {err}"),
    )
}

/// Keep the first `limit` characters and append an ellipsis.
///
/// Counts Unicode scalar values so multi-byte text is never split.
pub fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}
