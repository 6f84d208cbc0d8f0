use thiserror::Error;

/// Core error type for the research assistant.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("invalid research request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasons a tool-use session can end without an answer.
///
/// Every variant sends the orchestrator down the fallback path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("agent output could not be parsed: {0}")]
    Parse(String),
    #[error("agent stopped after {iterations} iterations without a usable answer")]
    BudgetExhausted { iterations: usize },
    #[error("language model unavailable: {0}")]
    LlmTransport(String),
}
