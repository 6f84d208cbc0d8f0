use anyhow::{Context, Result};
use research_assistant_core::RunLogConfig;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: String,
    pub max_concurrency: usize,
    /// Upper bound on one research request, agent session and fallback included.
    pub research_timeout: Duration,
    pub run_log: Option<RunLogConfig>,
}

impl AppConfig {
    const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:8000";
    const DEFAULT_MAX_CONCURRENCY: usize = 5;
    const DEFAULT_TIMEOUT_SECS: u64 = 180;

    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("RESEARCH_API_ADDR")
            .unwrap_or_else(|_| Self::DEFAULT_LISTEN_ADDR.to_string());

        let max_concurrency = env::var("RESEARCH_API_MAX_CONCURRENCY")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(Self::DEFAULT_MAX_CONCURRENCY);

        let timeout_secs = env::var("RESEARCH_API_TIMEOUT_SECS")
            .ok()
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| "RESEARCH_API_TIMEOUT_SECS must be a whole number of seconds")
            })
            .transpose()?
            .filter(|secs| *secs > 0)
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);

        let run_log_enabled = env::var("RESEARCH_API_RUN_LOG")
            .ok()
            .and_then(|value| parse_bool(&value))
            .unwrap_or(true);

        Ok(Self {
            listen_addr,
            max_concurrency,
            research_timeout: Duration::from_secs(timeout_secs),
            run_log: run_log_enabled.then(RunLogConfig::from_env),
        })
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
