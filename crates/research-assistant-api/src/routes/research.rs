use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use research_assistant_core::{ModeUsed, ResearchMode, ResearchRequest, assemble_report};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{ApiResult, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResearchBody {
    pub topic: String,
    pub research_questions: Vec<String>,
    #[serde(default = "default_true")]
    pub detailed_report: bool,
    #[serde(default)]
    pub explain: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub success: bool,
    pub topic: String,
    pub research_output: Option<String>,
    pub report: Option<String>,
    pub sources: Option<Vec<String>>,
    pub error: Option<String>,
    pub mode: ModeUsed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

pub fn research_router() -> Router<AppState> {
    Router::new()
        .route("/research", post(standard_research))
        .route("/advanced-research", post(advanced_research))
}

async fn standard_research(
    State(state): State<AppState>,
    Json(body): Json<ResearchBody>,
) -> ApiResult<Json<ResearchResponse>> {
    run_research(state, body, ResearchMode::Standard).await
}

async fn advanced_research(
    State(state): State<AppState>,
    Json(body): Json<ResearchBody>,
) -> ApiResult<Json<ResearchResponse>> {
    run_research(state, body, ResearchMode::Advanced).await
}

#[instrument(name = "http.research", skip(state, body), fields(topic = %body.topic))]
async fn run_research(
    state: AppState,
    body: ResearchBody,
    mode: ResearchMode,
) -> ApiResult<Json<ResearchResponse>> {
    let explain = body.explain;
    let request = ResearchRequest::new(body.topic, body.research_questions, mode)?
        .with_detailed_report(body.detailed_report);

    let _permit = state.acquire_permit()?;
    let started = Instant::now();
    let deadline = state.research_timeout();

    // Dropping the orchestration future on expiry aborts its in-flight HTTP calls.
    let outcome =
        match tokio::time::timeout(deadline, state.orchestrator().orchestrate_traced(&request))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_secs = deadline.as_secs(), "research request timed out");
                return Err(AppError::new(
                    StatusCode::GATEWAY_TIMEOUT,
                    format!(
                        "research did not finish within {} seconds",
                        deadline.as_secs()
                    ),
                ));
            }
        };

    let result = outcome.result;
    state.record_run(&request, &result, started.elapsed()).await;
    info!(
        succeeded = result.succeeded(),
        mode_used = %result.mode_used(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "research request finished"
    );

    let report = assemble_report(&request, &result).map(|report| report.render_markdown());
    let trace = explain.then(|| outcome.trace.render_markdown());

    Ok(Json(ResearchResponse {
        success: result.succeeded(),
        topic: request.topic().to_string(),
        research_output: result.narrative().map(str::to_string),
        report,
        sources: result.succeeded().then(|| result.sources().to_vec()),
        error: result.error().map(str::to_string),
        mode: result.mode_used(),
        trace,
    }))
}
