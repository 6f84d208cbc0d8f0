use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use tracing::{info, instrument, warn};

use crate::fallback::FallbackResponder;
use crate::session::{AgentSession, extract_sources};
use crate::trace::{TraceCollector, TraceEvent, TraceStage};
use crate::{ModeUsed, ResearchRequest, ResearchResult};

pub(crate) const KEY_SESSION_SUCCEEDED: &str = "session.succeeded";
pub(crate) const KEY_SESSION_ANSWER: &str = "session.answer";
pub(crate) const KEY_SESSION_ERROR: &str = "session.error";
pub(crate) const KEY_RESULT: &str = "research.result";
pub(crate) const KEY_TRACE: &str = "trace.events";

async fn load_trace(context: &Context) -> TraceCollector {
    let mut trace = TraceCollector::new();
    trace.extend(context.get::<Vec<TraceEvent>>(KEY_TRACE).await.unwrap_or_default());
    trace
}

async fn store_trace(context: &Context, trace: TraceCollector) {
    context.set(KEY_TRACE, trace.into_events()).await;
}

/// Runs the tool-use session and records whether it produced an answer.
pub struct AgentSessionTask {
    session: AgentSession,
    request: ResearchRequest,
}

impl AgentSessionTask {
    pub fn new(session: AgentSession, request: ResearchRequest) -> Self {
        Self { session, request }
    }
}

#[async_trait]
impl Task for AgentSessionTask {
    fn id(&self) -> &str {
        "agent_session"
    }

    #[instrument(name = "task.agent_session", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let mut trace = load_trace(&context).await;
        let outcome = self.session.run(&self.request, &mut trace).await;
        store_trace(&context, trace).await;

        let message = match outcome {
            Ok(answer) => {
                info!(
                    tool_calls = answer.invocations.len(),
                    forced = answer.forced,
                    "agent session succeeded"
                );
                context.set(KEY_SESSION_ANSWER, answer.answer).await;
                context.set_sync(KEY_SESSION_SUCCEEDED, true);
                "Agent session produced an answer".to_string()
            }
            Err(err) => {
                warn!(error = %err, "agent session failed; handing over to fallback");
                context.set(KEY_SESSION_ERROR, err.to_string()).await;
                context.set_sync(KEY_SESSION_SUCCEEDED, false);
                format!("Agent session failed: {err}")
            }
        };

        Ok(TaskResult::new(Some(message), NextAction::ContinueAndExecute))
    }
}

/// Turns the session answer into a successful result.
pub struct FinalizeTask {
    mode: ModeUsed,
}

impl FinalizeTask {
    pub fn new(mode: ModeUsed) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Task for FinalizeTask {
    fn id(&self) -> &str {
        "finalize"
    }

    #[instrument(name = "task.finalize", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let answer: String = context.get(KEY_SESSION_ANSWER).await.unwrap_or_default();
        let sources = extract_sources(&answer);

        let mut trace = load_trace(&context).await;
        trace.record(
            TraceStage::Finalize,
            format!("{} mode answer with {} sources", self.mode, sources.len()),
        );
        store_trace(&context, trace).await;

        info!(sources = sources.len(), mode = %self.mode, "finalized research result");
        let result = ResearchResult::success(answer, sources, self.mode);
        context.set(KEY_RESULT, &result).await;

        Ok(TaskResult::new(
            Some("Research result finalized".to_string()),
            NextAction::End,
        ))
    }
}

/// Second tier: a tool-free completion after the session failed.
pub struct FallbackTask {
    fallback: FallbackResponder,
    request: ResearchRequest,
}

impl FallbackTask {
    pub fn new(fallback: FallbackResponder, request: ResearchRequest) -> Self {
        Self { fallback, request }
    }
}

#[async_trait]
impl Task for FallbackTask {
    fn id(&self) -> &str {
        "fallback"
    }

    #[instrument(name = "task.fallback", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let primary: String = context
            .get(KEY_SESSION_ERROR)
            .await
            .unwrap_or_else(|| "agent session failed".to_string());

        let mut trace = load_trace(&context).await;
        trace.record(TraceStage::Fallback, format!("after: {primary}"));

        let result = self
            .fallback
            .respond(self.request.topic(), self.request.questions())
            .await;

        let result = match result.error() {
            Some(secondary) => {
                warn!(%primary, %secondary, "fallback failed as well");
                trace.record(TraceStage::Finalize, "both tiers failed");
                ResearchResult::failure(format!("{primary}; {secondary}"), ModeUsed::Fallback)
            }
            None => {
                trace.record(TraceStage::Finalize, "fallback answer");
                result
            }
        };
        store_trace(&context, trace).await;
        context.set(KEY_RESULT, &result).await;

        Ok(TaskResult::new(
            Some("Fallback tier completed".to_string()),
            NextAction::End,
        ))
    }
}
