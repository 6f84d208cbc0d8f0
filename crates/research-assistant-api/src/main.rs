use anyhow::Result;
use axum::Router;
use research_assistant_api::config::AppConfig;
use research_assistant_api::routes::build_router;
use research_assistant_api::state::AppState;
use research_assistant_core::{
    ResearchConfig, ResearchOrchestrator, TelemetryOptions, init_telemetry,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryOptions::default())?;

    let research_config = ResearchConfig::from_env()?;
    let config = AppConfig::from_env()?;
    let orchestrator = ResearchOrchestrator::from_config(&research_config)?;
    let state = AppState::new(orchestrator, &config, research_config.llm.model.clone());

    let app: Router = build_router(state);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(
        address = %config.listen_addr,
        model = %research_config.llm.model,
        max_concurrency = config.max_concurrency,
        "research-assistant-api listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            error!(error = %err, "server shutdown with error");
            err
        })?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            stream.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
