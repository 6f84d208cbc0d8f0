use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use research_assistant_core::{
    ResearchOrchestrator, ResearchRequest, ResearchResult, RunLogConfig, RunLogInput,
    log_research_run,
};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::warn;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiResult, AppError};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<ResearchOrchestrator>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    research_timeout: Duration,
    run_log: Option<Arc<RunLogConfig>>,
    model: Arc<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapacitySnapshot {
    pub max_concurrency: usize,
    pub available_permits: usize,
    pub running_requests: usize,
}

impl AppState {
    pub fn new(
        orchestrator: ResearchOrchestrator,
        config: &AppConfig,
        model: impl Into<String>,
    ) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            orchestrator: Arc::new(orchestrator),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            research_timeout: config.research_timeout,
            run_log: config.run_log.clone().map(Arc::new),
            model: Arc::new(model.into()),
        }
    }

    pub fn orchestrator(&self) -> Arc<ResearchOrchestrator> {
        self.orchestrator.clone()
    }

    pub fn research_timeout(&self) -> Duration {
        self.research_timeout
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn capacity(&self) -> CapacitySnapshot {
        let available = self.permits.available_permits();
        CapacitySnapshot {
            max_concurrency: self.max_concurrency,
            available_permits: available,
            running_requests: self.max_concurrency.saturating_sub(available),
        }
    }

    pub fn acquire_permit(&self) -> ApiResult<OwnedSemaphorePermit> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::NoPermits) => Err(AppError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "research capacity reached; retry once a slot frees up",
            )),
            Err(TryAcquireError::Closed) => Err(AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "research executor unavailable",
            )),
        }
    }

    /// Append the run to the run log off the async executor. Failures are logged only.
    pub async fn record_run(
        &self,
        request: &ResearchRequest,
        result: &ResearchResult,
        elapsed: Duration,
    ) {
        let Some(config) = self.run_log.clone() else {
            return;
        };
        let input = RunLogInput::from_result(Uuid::new_v4().to_string(), request, result, elapsed);
        match tokio::task::spawn_blocking(move || log_research_run(&config, input)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!(error = %err, "failed to write run log"),
            Err(err) => warn!(error = %err, "run log task panicked"),
        }
    }
}
