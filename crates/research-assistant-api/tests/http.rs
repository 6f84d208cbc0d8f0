use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use research_assistant_api::config::AppConfig;
use research_assistant_api::routes::{ResearchResponse, build_router};
use research_assistant_api::state::AppState;
use research_assistant_core::tools::{
    PaperHit, PaperIndex, ToolError, WebHit, WebSearchService,
};
use research_assistant_core::{
    CompletionRequest, FallbackResponder, LanguageModel, LlmError, ModeUsed, ModelTurn,
    ResearchOrchestrator, RunLogConfig, ToolProvider,
};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Replays canned turns; an exhausted script answers with a transport error.
struct ScriptedModel {
    turns: Mutex<VecDeque<Result<ModelTurn, LlmError>>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    fn new(turns: Vec<Result<ModelTurn, LlmError>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            delay: None,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<ModelTurn, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Transport("script exhausted".into())))
    }
}

struct NoWeb;

#[async_trait]
impl WebSearchService for NoWeb {
    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<WebHit>, ToolError> {
        Ok(Vec::new())
    }
}

struct NoPapers;

#[async_trait]
impl PaperIndex for NoPapers {
    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<PaperHit>, ToolError> {
        Ok(Vec::new())
    }
}

fn base_config() -> AppConfig {
    AppConfig {
        listen_addr: "127.0.0.1:0".into(),
        max_concurrency: 2,
        research_timeout: Duration::from_secs(5),
        run_log: None,
    }
}

fn state_with(model: ScriptedModel, config: &AppConfig) -> AppState {
    let llm: Arc<dyn LanguageModel> = Arc::new(model);
    let tools = Arc::new(ToolProvider::new(Arc::new(NoWeb), Arc::new(NoPapers)));
    let fallback = FallbackResponder::new(llm.clone(), 0.7);
    let orchestrator = ResearchOrchestrator::new(llm, tools, fallback);
    AppState::new(orchestrator, config, "scripted-model")
}

fn server(model: ScriptedModel) -> TestServer {
    TestServer::new(build_router(state_with(model, &base_config()))).unwrap()
}

fn body() -> Value {
    json!({
        "topic": "Quantum error correction",
        "research_questions": ["What is the surface code?", "Who leads the field?"],
    })
}

#[tokio::test]
async fn health_reports_model_and_capacity() {
    let server = server(ScriptedModel::new(Vec::new()));

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let health = response.json::<Value>();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model"], "scripted-model");
    assert_eq!(health["capacity"]["max_concurrency"], 2);
    assert_eq!(health["capacity"]["available_permits"], 2);

    let root = server.get("/").await;
    assert_eq!(root.status_code(), StatusCode::OK);
    assert_eq!(root.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn research_returns_narrative_sources_and_report() {
    let answer = "The surface code is the leading scheme.\n\nSee https://arxiv.org/abs/1208.0928\nGoogle Quantum AI leads.";
    let server = server(ScriptedModel::new(vec![Ok(ModelTurn::Final(answer.into()))]));

    let response = server.post("/research").json(&body()).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let payload = response.json::<ResearchResponse>();

    assert!(payload.success);
    assert_eq!(payload.topic, "Quantum error correction");
    assert_eq!(payload.mode, ModeUsed::Standard);
    assert_eq!(payload.research_output.as_deref(), Some(answer));
    assert_eq!(
        payload.sources,
        Some(vec!["See https://arxiv.org/abs/1208.0928".to_string()])
    );
    let report = payload.report.expect("detailed report defaults to on");
    assert!(report.starts_with("# Research Report: Quantum error correction\n"));
    assert!(report.contains("## Executive Summary\nThe surface code is the leading scheme.\n"));
    assert!(payload.error.is_none());
    assert!(payload.trace.is_none());
}

#[tokio::test]
async fn report_can_be_disabled_and_trace_requested() {
    let server = server(ScriptedModel::new(vec![Ok(ModelTurn::Final("Short answer.".into()))]));

    let mut request = body();
    request["detailed_report"] = json!(false);
    request["explain"] = json!(true);
    let payload = server
        .post("/advanced-research")
        .json(&request)
        .await
        .json::<ResearchResponse>();

    assert!(payload.success);
    assert_eq!(payload.mode, ModeUsed::Advanced);
    assert!(payload.report.is_none());
    let trace = payload.trace.expect("trace requested");
    assert!(trace.contains("**decision**"));
    assert!(trace.contains("**finalize**"));
}

#[tokio::test]
async fn session_failure_falls_back_to_direct_answer() {
    let server = server(ScriptedModel::new(vec![
        Err(LlmError::Transport("agent unreachable".into())),
        Ok(ModelTurn::Final("Fallback overview.".into())),
    ]));

    let payload = server
        .post("/research")
        .json(&body())
        .await
        .json::<ResearchResponse>();

    assert!(payload.success);
    assert_eq!(payload.mode, ModeUsed::Fallback);
    assert_eq!(payload.sources, Some(vec!["AI-generated analysis".to_string()]));
    assert!(payload.report.unwrap().contains("without live tool access"));
}

#[tokio::test]
async fn double_failure_is_reported_as_plain_error() {
    let server = server(ScriptedModel::new(vec![
        Err(LlmError::Transport("agent down".into())),
        Err(LlmError::RateLimited),
    ]));

    let response = server.post("/research").json(&body()).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let payload = response.json::<ResearchResponse>();

    assert!(!payload.success);
    assert!(payload.research_output.is_none());
    assert!(payload.report.is_none());
    assert!(payload.sources.is_none());
    let error = payload.error.expect("error expected");
    let (primary, secondary) = error.split_once("; ").expect("two-part error");
    assert!(primary.contains("agent down"));
    assert!(secondary.contains("rate limited"));
}

#[tokio::test]
async fn invalid_requests_are_unprocessable() {
    let server = server(ScriptedModel::new(Vec::new()));

    let response = server
        .post("/research")
        .json(&json!({ "topic": "   ", "research_questions": ["q"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json::<Value>()["error"].as_str().unwrap().contains("topic"));

    let response = server
        .post("/research")
        .json(&json!({ "topic": "Fusion", "research_questions": ["", " "] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn slow_research_times_out_without_partial_result() {
    let mut config = base_config();
    config.research_timeout = Duration::from_millis(50);
    let state = state_with(ScriptedModel::slow(Duration::from_secs(5)), &config);
    let server = TestServer::new(build_router(state.clone())).unwrap();

    let response = server.post("/research").json(&body()).await;
    assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert!(response.json::<Value>().get("success").is_none());
    assert_eq!(state.capacity().available_permits, 2);
}

#[tokio::test]
async fn capacity_limit_returns_429() {
    let mut config = base_config();
    config.max_concurrency = 1;
    let state = state_with(ScriptedModel::new(Vec::new()), &config);

    let permit = state.acquire_permit().expect("first permit should succeed");
    let err = state
        .acquire_permit()
        .expect_err("second permit should fail");
    assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

    let server = TestServer::new(build_router(state.clone())).unwrap();
    let response = server.post("/research").json(&body()).await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    drop(permit);
}

#[tokio::test]
async fn completed_runs_are_logged() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config();
    config.run_log = Some(RunLogConfig {
        dir: temp.path().to_path_buf(),
        retention_days: 0,
    });
    let state = state_with(
        ScriptedModel::new(vec![Ok(ModelTurn::Final("Logged answer.".into()))]),
        &config,
    );
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server.post("/research").json(&body()).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let year = temp.path().read_dir().unwrap().next().unwrap().unwrap().path();
    let month = year.read_dir().unwrap().next().unwrap().unwrap().path();
    let log = std::fs::read_to_string(month.join("runs.jsonl")).unwrap();
    let record: Value = serde_json::from_str(log.trim()).unwrap();
    assert_eq!(record["topic"], "Quantum error correction");
    assert_eq!(record["mode_used"], "standard");
    assert_eq!(record["succeeded"], true);
}
