//! Append-only JSONL record of completed research requests.

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::{ModeUsed, ResearchMode, ResearchRequest, ResearchResult};

pub const LOG_DIR_ENV: &str = "RESEARCH_LOG_DIR";
pub const RETENTION_ENV: &str = "RESEARCH_LOG_RETENTION_DAYS";
const DEFAULT_LOG_DIR: &str = "data/logs";
const DEFAULT_RETENTION_DAYS: u64 = 90;

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "secret",
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token",
            Regex::new(r"(sk-[A-Za-z0-9]{16,})").expect("invalid sk_token regex"),
        ),
    ]
});

/// Where run records go and how long they are kept. Zero retention disables pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogConfig {
    pub dir: PathBuf,
    pub retention_days: u64,
}

impl Default for RunLogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RunLogConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dir: std::env::var(LOG_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.dir),
            retention_days: std::env::var(RETENTION_ENV)
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(defaults.retention_days),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunLogInput {
    pub run_id: String,
    pub topic: String,
    pub questions: Vec<String>,
    pub mode: ResearchMode,
    pub mode_used: ModeUsed,
    pub succeeded: bool,
    pub error: Option<String>,
    pub sources: Vec<String>,
    pub duration_ms: u128,
}

impl RunLogInput {
    pub fn from_result(
        run_id: impl Into<String>,
        request: &ResearchRequest,
        result: &ResearchResult,
        elapsed: Duration,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            topic: request.topic().to_string(),
            questions: request.questions().to_vec(),
            mode: request.mode(),
            mode_used: result.mode_used(),
            succeeded: result.succeeded(),
            error: result.error().map(str::to_string),
            sources: result.sources().to_vec(),
            duration_ms: elapsed.as_millis(),
        }
    }
}

#[derive(Serialize)]
struct RunRecord {
    timestamp: String,
    run_id: String,
    topic: String,
    questions: Vec<String>,
    mode: ResearchMode,
    mode_used: ModeUsed,
    succeeded: bool,
    error: Option<String>,
    sources: Vec<String>,
    duration_ms: u128,
    redactions: Vec<String>,
}

#[derive(Serialize)]
struct AuditRecord {
    timestamp: String,
    run_id: String,
    redactions: Vec<String>,
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{line}")
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn sanitize_text(input: &str, redactions: &mut BTreeSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert((*name).to_string());
        }
    }
    output
}

/// Append one run record, plus an audit entry when secrets were scrubbed.
///
/// Returns the path of the month's run log.
pub fn log_research_run(config: &RunLogConfig, input: RunLogInput) -> Result<PathBuf> {
    let timestamp = Utc::now();
    let mut redactions = BTreeSet::new();

    let topic = sanitize_text(&input.topic, &mut redactions);
    let questions = input
        .questions
        .iter()
        .map(|question| sanitize_text(question, &mut redactions))
        .collect();
    let error = input
        .error
        .as_deref()
        .map(|value| sanitize_text(value, &mut redactions));
    let sources = input
        .sources
        .iter()
        .map(|source| sanitize_text(source, &mut redactions))
        .collect();

    let record = RunRecord {
        timestamp: timestamp.to_rfc3339(),
        run_id: input.run_id.clone(),
        topic,
        questions,
        mode: input.mode,
        mode_used: input.mode_used,
        succeeded: input.succeeded,
        error,
        sources,
        duration_ms: input.duration_ms,
        redactions: redactions.into_iter().collect(),
    };

    let month_dir = config
        .dir
        .join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()));
    let run_log_path = month_dir.join("runs.jsonl");
    append_json_line(&run_log_path, &record)?;

    if !record.redactions.is_empty() {
        let audit = AuditRecord {
            timestamp: record.timestamp.clone(),
            run_id: input.run_id.clone(),
            redactions: record.redactions.clone(),
        };
        append_json_line(&month_dir.join("audit.jsonl"), &audit)?;
        warn!(
            run_id = %input.run_id,
            fields = ?record.redactions,
            "redacted potential secrets from run log"
        );
    }

    enforce_retention(config)?;
    Ok(run_log_path)
}

fn enforce_retention(config: &RunLogConfig) -> Result<()> {
    if config.retention_days == 0 || !config.dir.exists() {
        return Ok(());
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(config.retention_days.saturating_mul(86_400)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    prune_directory(&config.dir, cutoff)
}

fn prune_directory(dir: &Path, cutoff: SystemTime) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            prune_directory(&path, cutoff)?;
            if path.read_dir()?.next().is_none() {
                fs::remove_dir(&path).ok();
            }
        } else if metadata.is_file()
            && metadata
                .modified()
                .map(|time| time < cutoff)
                .unwrap_or(false)
        {
            fs::remove_file(&path).ok();
        }
    }
    Ok(())
}
