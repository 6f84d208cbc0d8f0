//! Research assistant core built on top of `graph_flow`.
//!
//! A request runs through a bounded tool-use session (web search, arXiv
//! search, calculator) driven by a language model. When that session cannot
//! produce an answer a single tool-free completion is tried instead, and the
//! outcome can be rendered as a fixed-layout markdown report.

mod config;
mod error;
pub mod fallback;
pub mod llm;
mod logging;
mod model;
pub mod prompts;
pub mod report;
mod security;
pub mod session;
mod tasks;
mod telemetry;
pub mod tools;
mod trace;
mod workflow;

pub use config::{HttpConfig, LlmConfig, ResearchConfig, SearchConfig};
pub use error::{ResearchError, SessionError};
pub use fallback::{FALLBACK_SOURCE, FallbackResponder};
pub use llm::{ChatMessage, CompletionRequest, LanguageModel, LlmError, ModelTurn, OpenAiChatModel};
pub use logging::{LOG_DIR_ENV, RETENTION_ENV, RunLogConfig, RunLogInput, log_research_run};
pub use model::{MAX_SOURCES, ModeUsed, ResearchMode, ResearchRequest, ResearchResult};
pub use prompts::build_prompt;
pub use report::{Report, ReportSection, assemble as assemble_report};
pub use security::{SecretValue, require_secret};
pub use session::{AgentSession, SessionAnswer, extract_sources};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use tools::{ToolCall, ToolInvocation, ToolName, ToolProvider};
pub use trace::{TraceCollector, TraceEvent, TraceStage};
pub use workflow::{ResearchOrchestrator, ResearchOutcome};
