use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use graph_flow::{
    ExecutionStatus, FlowRunner, Graph, GraphBuilder, InMemorySessionStorage, Session,
    SessionStorage, Task,
};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::fallback::FallbackResponder;
use crate::llm::{LanguageModel, OpenAiChatModel};
use crate::session::AgentSession;
use crate::tasks::{
    AgentSessionTask, FallbackTask, FinalizeTask, KEY_RESULT, KEY_SESSION_SUCCEEDED, KEY_TRACE,
};
use crate::tools::ToolProvider;
use crate::trace::{TraceCollector, TraceEvent};
use crate::{ModeUsed, ResearchConfig, ResearchError, ResearchRequest, ResearchResult};

/// Result of one request together with the steps that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    pub result: ResearchResult,
    pub trace: TraceCollector,
}

/// Entry point: agent session first, fallback tier on failure.
#[derive(Clone)]
pub struct ResearchOrchestrator {
    llm: Arc<dyn LanguageModel>,
    tools: Arc<ToolProvider>,
    fallback: FallbackResponder,
    temperature: f32,
}

impl ResearchOrchestrator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        tools: Arc<ToolProvider>,
        fallback: FallbackResponder,
    ) -> Self {
        Self {
            llm,
            tools,
            fallback,
            temperature: 0.0,
        }
    }

    /// Sampling temperature for the agent session.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Wire the OpenAI-compatible model and live search backends.
    pub fn from_config(config: &ResearchConfig) -> Result<Self, ResearchError> {
        let http = config.http_client()?;
        let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiChatModel::new(http.clone(), &config.llm));
        let tools = Arc::new(ToolProvider::from_config(config, http)?);
        let fallback = FallbackResponder::new(llm.clone(), config.llm.fallback_temperature);
        Ok(Self::new(llm, tools, fallback).with_temperature(config.llm.temperature))
    }

    /// Research `request`. Never fails: every error ends up in the result.
    pub async fn orchestrate(&self, request: &ResearchRequest) -> ResearchResult {
        self.orchestrate_traced(request).await.result
    }

    #[instrument(name = "orchestrate", skip_all, fields(topic = %request.topic(), mode = ?request.mode()))]
    pub async fn orchestrate_traced(&self, request: &ResearchRequest) -> ResearchOutcome {
        match self.run_graph(request).await {
            Ok(outcome) => {
                info!(
                    succeeded = outcome.result.succeeded(),
                    mode_used = %outcome.result.mode_used(),
                    sources = outcome.result.sources().len(),
                    "research completed"
                );
                outcome
            }
            Err(err) => {
                error!(error = %err, "research workflow aborted");
                ResearchOutcome {
                    result: ResearchResult::failure(
                        format!("research workflow failed: {err}"),
                        ModeUsed::from(request.mode()),
                    ),
                    trace: TraceCollector::new(),
                }
            }
        }
    }

    fn build_graph(&self, request: &ResearchRequest) -> (Arc<Graph>, String) {
        let session = AgentSession::new(self.llm.clone(), self.tools.clone(), self.temperature);
        let agent = Arc::new(AgentSessionTask::new(session, request.clone()));
        let finalize = Arc::new(FinalizeTask::new(ModeUsed::from(request.mode())));
        let fallback = Arc::new(FallbackTask::new(self.fallback.clone(), request.clone()));
        let start = agent.id().to_string();

        let graph = GraphBuilder::new("research_workflow")
            .add_task(agent.clone())
            .add_task(finalize.clone())
            .add_task(fallback.clone())
            .add_conditional_edge(
                agent.id(),
                |ctx| ctx.get_sync::<bool>(KEY_SESSION_SUCCEEDED).unwrap_or(false),
                finalize.id(),
                fallback.id(),
            )
            .set_start_task(agent.id())
            .build();

        (Arc::new(graph), start)
    }

    async fn run_graph(&self, request: &ResearchRequest) -> Result<ResearchOutcome> {
        let (graph, start) = self.build_graph(request);
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let session_id = new_session_id();
        let session = Session::new_from_task(session_id.clone(), &start);
        storage
            .save(session)
            .await
            .map_err(|err| anyhow!("failed to persist session: {err}"))?;

        loop {
            let result = runner
                .run(&session_id)
                .await
                .map_err(|err| anyhow!("graph execution failure: {err}"))?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::WaitingForInput => continue,
                ExecutionStatus::Error(message) => return Err(anyhow!(message)),
            }
        }

        let session = storage
            .get(&session_id)
            .await
            .map_err(|err| anyhow!("failed to reload session: {err}"))?
            .ok_or_else(|| anyhow!("session missing after execution"))?;

        let result: ResearchResult = session
            .context
            .get(KEY_RESULT)
            .await
            .ok_or_else(|| anyhow!("workflow finished without a result"))?;
        let mut trace = TraceCollector::new();
        trace.extend(
            session
                .context
                .get::<Vec<TraceEvent>>(KEY_TRACE)
                .await
                .unwrap_or_default(),
        );

        Ok(ResearchOutcome { result, trace })
    }
}

fn new_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("research-{nanos}")
}
