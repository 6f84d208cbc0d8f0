use std::fmt::{self, Write as _};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Kind of step recorded while a request is researched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
    Decision,
    Tool,
    Fallback,
    Finalize,
}

impl fmt::Display for TraceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceStage::Decision => "decision",
            TraceStage::Tool => "tool",
            TraceStage::Fallback => "fallback",
            TraceStage::Finalize => "finalize",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub stage: TraceStage,
    pub detail: String,
    pub timestamp_ms: u128,
}

impl TraceEvent {
    pub fn new(stage: TraceStage, detail: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self {
            stage,
            detail: detail.into(),
            timestamp_ms,
        }
    }
}

/// Ordered record of the steps taken for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCollector {
    events: Vec<TraceEvent>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: TraceStage, detail: impl Into<String>) {
        self.events.push(TraceEvent::new(stage, detail));
    }

    pub fn extend<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        self.events.extend(events);
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    pub fn count(&self, stage: TraceStage) -> usize {
        self.events.iter().filter(|event| event.stage == stage).count()
    }

    pub fn render_markdown(&self) -> String {
        if self.events.is_empty() {
            return "No trace events recorded.".to_string();
        }
        let mut output = String::from("### Research Trace\n");
        for (idx, event) in self.events.iter().enumerate() {
            let detail = event.detail.replace('\n', " ");
            let _ = writeln!(output, "{}. **{}**: {}", idx + 1, event.stage, detail);
        }
        output
    }
}
