//! Request and result records that flow through the research pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ResearchError;

/// Upper bound on the number of sources carried by a [`ResearchResult`].
pub const MAX_SOURCES: usize = 5;

/// Depth of the tool-use session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    #[default]
    Standard,
    Advanced,
}

impl ResearchMode {
    /// Number of agent decisions allowed before the session is forced to stop.
    pub const fn iteration_budget(self) -> usize {
        match self {
            ResearchMode::Standard => 3,
            ResearchMode::Advanced => 5,
        }
    }
}

/// Which path actually produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeUsed {
    Standard,
    Advanced,
    Fallback,
}

impl From<ResearchMode> for ModeUsed {
    fn from(mode: ResearchMode) -> Self {
        match mode {
            ResearchMode::Standard => ModeUsed::Standard,
            ResearchMode::Advanced => ModeUsed::Advanced,
        }
    }
}

impl fmt::Display for ModeUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModeUsed::Standard => "standard",
            ModeUsed::Advanced => "advanced",
            ModeUsed::Fallback => "fallback",
        };
        f.write_str(label)
    }
}

/// A validated research request. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchRequest {
    topic: String,
    questions: Vec<String>,
    mode: ResearchMode,
    detailed_report: bool,
}

impl ResearchRequest {
    /// Build a request, dropping blank questions.
    ///
    /// Fails when the topic is blank or no question survives.
    pub fn new<I, S>(
        topic: impl Into<String>,
        questions: I,
        mode: ResearchMode,
    ) -> Result<Self, ResearchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(ResearchError::InvalidRequest(
                "topic must not be empty".into(),
            ));
        }

        let questions: Vec<String> = questions
            .into_iter()
            .map(|question| question.into().trim().to_string())
            .filter(|question| !question.is_empty())
            .collect();
        if questions.is_empty() {
            return Err(ResearchError::InvalidRequest(
                "at least one research question is required".into(),
            ));
        }

        Ok(Self {
            topic,
            questions,
            mode,
            detailed_report: true,
        })
    }

    pub fn with_detailed_report(mut self, detailed_report: bool) -> Self {
        self.detailed_report = detailed_report;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn mode(&self) -> ResearchMode {
        self.mode
    }

    pub fn detailed_report(&self) -> bool {
        self.detailed_report
    }
}

/// Normalised outcome of either the agent session or the fallback tier.
///
/// Constructed only through [`ResearchResult::success`] and
/// [`ResearchResult::failure`]: a successful result always carries a
/// narrative and no error, a failed one always carries an error and no
/// narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ResultFields")]
pub struct ResearchResult {
    succeeded: bool,
    narrative: Option<String>,
    sources: Vec<String>,
    mode_used: ModeUsed,
    error: Option<String>,
}

impl ResearchResult {
    pub fn success(
        narrative: impl Into<String>,
        sources: impl IntoIterator<Item = String>,
        mode_used: ModeUsed,
    ) -> Self {
        Self {
            succeeded: true,
            narrative: Some(narrative.into()),
            sources: sources.into_iter().take(MAX_SOURCES).collect(),
            mode_used,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, mode_used: ModeUsed) -> Self {
        Self {
            succeeded: false,
            narrative: None,
            sources: Vec::new(),
            mode_used,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn mode_used(&self) -> ModeUsed {
        self.mode_used
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Deserialize)]
struct ResultFields {
    succeeded: bool,
    narrative: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    mode_used: ModeUsed,
    error: Option<String>,
}

impl TryFrom<ResultFields> for ResearchResult {
    type Error = String;

    fn try_from(fields: ResultFields) -> Result<Self, Self::Error> {
        match (fields.succeeded, fields.narrative, fields.error) {
            (true, Some(narrative), None) => Ok(Self::success(
                narrative,
                fields.sources,
                fields.mode_used,
            )),
            (false, None, Some(error)) => Ok(Self::failure(error, fields.mode_used)),
            _ => Err("a result carries either a narrative or an error, never both".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_questions_are_dropped_in_order() {
        let request = ResearchRequest::new(
            "  quantum sensing ",
            ["first?", "   ", "second?"],
            ResearchMode::Standard,
        )
        .expect("request should be valid");

        assert_eq!(request.topic(), "quantum sensing");
        assert_eq!(request.questions(), ["first?", "second?"]);
        assert!(request.detailed_report());
    }

    #[test]
    fn empty_topic_or_questions_are_rejected() {
        let err = ResearchRequest::new(" ", ["q"], ResearchMode::Standard).unwrap_err();
        assert!(matches!(err, ResearchError::InvalidRequest(_)));

        let err = ResearchRequest::new("topic", ["", "  "], ResearchMode::Advanced).unwrap_err();
        assert!(matches!(err, ResearchError::InvalidRequest(_)));
    }

    #[test]
    fn result_constructors_keep_narrative_and_error_exclusive() {
        let ok = ResearchResult::success("answer", vec![], ModeUsed::Advanced);
        assert!(ok.succeeded());
        assert_eq!(ok.narrative(), Some("answer"));
        assert!(ok.error().is_none());

        let failed = ResearchResult::failure("boom", ModeUsed::Standard);
        assert!(!failed.succeeded());
        assert!(failed.narrative().is_none());
        assert_eq!(failed.error(), Some("boom"));
    }

    #[test]
    fn sources_are_capped() {
        let sources = (0..8).map(|idx| format!("https://example.com/{idx}"));
        let result = ResearchResult::success("answer", sources, ModeUsed::Standard);
        assert_eq!(result.sources().len(), MAX_SOURCES);
        assert_eq!(result.sources()[0], "https://example.com/0");
    }

    #[test]
    fn deserialization_rejects_mixed_records() {
        let mixed = serde_json::json!({
            "succeeded": true,
            "narrative": "text",
            "sources": [],
            "mode_used": "standard",
            "error": "also failed"
        });
        assert!(serde_json::from_value::<ResearchResult>(mixed).is_err());

        let stored = ResearchResult::failure("offline", ModeUsed::Fallback);
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(serde_json::from_value::<ResearchResult>(value).unwrap(), stored);
    }

    #[test]
    fn budgets_follow_mode() {
        assert_eq!(ResearchMode::Standard.iteration_budget(), 3);
        assert_eq!(ResearchMode::Advanced.iteration_budget(), 5);
    }
}
