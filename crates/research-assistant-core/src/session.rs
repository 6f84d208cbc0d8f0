//! Bounded tool-use loop between the language model and the tool provider.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::llm::{ChatMessage, CompletionRequest, LanguageModel, LlmError, ModelTurn};
use crate::prompts::{FINAL_ANSWER_NUDGE, build_prompt};
use crate::tools::{ToolCall, ToolInvocation, ToolProvider};
use crate::trace::{TraceCollector, TraceStage};
use crate::{MAX_SOURCES, ResearchRequest, SessionError};

/// Answer produced by a session that reached the Succeeded state.
#[derive(Debug, Clone)]
pub struct SessionAnswer {
    pub answer: String,
    pub invocations: Vec<ToolInvocation>,
    /// Set when the answer came from the forced post-budget completion.
    pub forced: bool,
}

pub struct AgentSession {
    llm: Arc<dyn LanguageModel>,
    tools: Arc<ToolProvider>,
    temperature: f32,
}

impl AgentSession {
    pub fn new(llm: Arc<dyn LanguageModel>, tools: Arc<ToolProvider>, temperature: f32) -> Self {
        Self {
            llm,
            tools,
            temperature,
        }
    }

    /// Drive the session until a final answer or the iteration budget.
    ///
    /// Tool failures and rejected tool calls are fed back to the model and
    /// never end the session on their own.
    #[instrument(name = "session.run", skip_all, fields(mode = ?request.mode()))]
    pub async fn run(
        &self,
        request: &ResearchRequest,
        trace: &mut TraceCollector,
    ) -> Result<SessionAnswer, SessionError> {
        let budget = request.mode().iteration_budget();
        let mut messages = vec![ChatMessage::User(build_prompt(request))];
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for iteration in 1..=budget {
            let completion = CompletionRequest::new(messages.clone(), self.temperature)
                .with_tools(self.tools.descriptors());
            let turn = self.llm.complete(completion).await.map_err(session_error)?;

            match turn {
                ModelTurn::Final(answer) => {
                    trace.record(
                        TraceStage::Decision,
                        format!("iteration {iteration}: final answer"),
                    );
                    info!(iteration, tool_calls = invocations.len(), "agent produced final answer");
                    return Ok(SessionAnswer {
                        answer,
                        invocations,
                        forced: false,
                    });
                }
                ModelTurn::ToolCall {
                    id,
                    name,
                    arguments,
                } => {
                    trace.record(
                        TraceStage::Decision,
                        format!("iteration {iteration}: call {name}"),
                    );
                    messages.push(ChatMessage::ToolRequest {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: arguments.clone(),
                    });

                    let observation = match ToolCall::parse(&name, &arguments) {
                        Ok(call) => {
                            let invocation = self.tools.invoke(call).await;
                            debug!(
                                iteration,
                                tool = %invocation.tool_name,
                                succeeded = invocation.succeeded,
                                "tool invocation finished"
                            );
                            trace.record(
                                TraceStage::Tool,
                                format!(
                                    "{} {} for `{}`",
                                    invocation.tool_name,
                                    if invocation.succeeded { "succeeded" } else { "failed" },
                                    invocation.query
                                ),
                            );
                            let content = invocation.result.clone();
                            invocations.push(invocation);
                            content
                        }
                        Err(err) => {
                            warn!(iteration, tool = %name, error = %err, "rejected tool call");
                            trace.record(TraceStage::Tool, format!("rejected `{name}`: {err}"));
                            format!("Error: {err}")
                        }
                    };

                    messages.push(ChatMessage::ToolResult {
                        id,
                        content: observation,
                    });
                }
            }
        }

        if !invocations.iter().any(|invocation| invocation.succeeded) {
            return Err(SessionError::BudgetExhausted { iterations: budget });
        }

        // Early stopping by generation: one tool-free completion over the gathered context.
        info!(budget, "iteration budget spent; requesting final answer");
        messages.push(ChatMessage::User(FINAL_ANSWER_NUDGE.to_string()));
        let turn = self
            .llm
            .complete(CompletionRequest::new(messages, self.temperature))
            .await
            .map_err(session_error)?;

        match turn {
            ModelTurn::Final(answer) => {
                trace.record(TraceStage::Decision, "budget spent: forced final answer");
                Ok(SessionAnswer {
                    answer,
                    invocations,
                    forced: true,
                })
            }
            ModelTurn::ToolCall { .. } => Err(SessionError::BudgetExhausted { iterations: budget }),
        }
    }
}

fn session_error(err: LlmError) -> SessionError {
    match err {
        LlmError::Malformed(message) => SessionError::Parse(message),
        other => SessionError::LlmTransport(other.to_string()),
    }
}

/// Lines mentioning a URL or arXiv, trimmed, in order, at most [`MAX_SOURCES`].
pub fn extract_sources(answer: &str) -> Vec<String> {
    answer
        .lines()
        .filter(|line| line.contains("http") || line.to_lowercase().contains("arxiv"))
        .map(|line| line.trim().to_string())
        .take(MAX_SOURCES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_keep_order_and_trim() {
        let answer = "Intro\n  see https://a.example/x  \nno link here\nArXiv:2101.00001 discusses it\nhttp://b.example";
        assert_eq!(
            extract_sources(answer),
            [
                "see https://a.example/x",
                "ArXiv:2101.00001 discusses it",
                "http://b.example"
            ]
        );
    }

    #[test]
    fn sources_are_capped_at_five() {
        let answer = (0..7)
            .map(|idx| format!("https://example.com/{idx}"))
            .collect::<Vec<_>>()
            .join("\n");
        let sources = extract_sources(&answer);
        assert_eq!(sources.len(), 5);
        assert_eq!(sources[0], "https://example.com/0");
        assert_eq!(sources[4], "https://example.com/4");
    }

    #[test]
    fn answer_without_links_has_no_sources() {
        assert!(extract_sources("Plain prose.\nMore prose.").is_empty());
    }

    #[test]
    fn malformed_output_maps_to_parse_error() {
        assert!(matches!(
            session_error(LlmError::Malformed("empty".into())),
            SessionError::Parse(_)
        ));
        assert!(matches!(
            session_error(LlmError::RateLimited),
            SessionError::LlmTransport(_)
        ));
    }
}
