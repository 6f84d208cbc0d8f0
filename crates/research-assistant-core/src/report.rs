//! Deterministic markdown report built from a finished research result.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{ModeUsed, ResearchRequest, ResearchResult};

pub const SECTION_EXECUTIVE_SUMMARY: &str = "Executive Summary";
pub const SECTION_RESEARCH_QUESTIONS: &str = "Research Questions";
pub const SECTION_METHODOLOGY: &str = "Methodology";
pub const SECTION_KEY_FINDINGS: &str = "Key Findings";
pub const SECTION_CONCLUSION: &str = "Conclusion";

const CONCLUSION: &str =
    "This research provides comprehensive insights into the topic using AI-powered analysis.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|section| section.name == name)
            .map(|section| section.body.as_str())
    }

    pub fn render_markdown(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "# {}", self.title);
        for section in &self.sections {
            let _ = write!(output, "\n## {}\n{}\n", section.name, section.body.trim_end());
        }
        output
    }
}

/// Build the report for a finished request.
///
/// Returns `None` when no report was requested or the result carries no
/// narrative.
pub fn assemble(request: &ResearchRequest, result: &ResearchResult) -> Option<Report> {
    if !request.detailed_report() || !result.succeeded() {
        return None;
    }
    let narrative = result.narrative()?;

    let questions = request
        .questions()
        .iter()
        .map(|question| format!("- {question}"))
        .collect::<Vec<_>>()
        .join("\n");

    let section = |name: &str, body: String| ReportSection {
        name: name.to_string(),
        body,
    };

    Some(Report {
        title: format!("Research Report: {}", request.topic()),
        sections: vec![
            section(SECTION_EXECUTIVE_SUMMARY, first_paragraph(narrative)),
            section(SECTION_RESEARCH_QUESTIONS, questions),
            section(
                SECTION_METHODOLOGY,
                methodology(result.mode_used()).to_string(),
            ),
            section(SECTION_KEY_FINDINGS, narrative.trim().to_string()),
            section(SECTION_CONCLUSION, CONCLUSION.to_string()),
        ],
    })
}

pub fn methodology(mode: ModeUsed) -> &'static str {
    match mode {
        ModeUsed::Standard => {
            "Research conducted by an AI agent with access to web search, arXiv academic search and a calculator."
        }
        ModeUsed::Advanced => {
            "Advanced multi-step research analysis: current web sources first, then academic papers from arXiv, followed by a cross-source synthesis."
        }
        ModeUsed::Fallback => {
            "Research conducted using AI-assisted analysis without live tool access."
        }
    }
}

/// Text up to the first blank line, ignoring leading blank lines.
fn first_paragraph(narrative: &str) -> String {
    narrative
        .lines()
        .skip_while(|line| line.trim().is_empty())
        .take_while(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResearchMode;

    const NARRATIVE: &str = "\nPerovskite cells passed 26% efficiency in 2024.\nStability remains the main obstacle.\n\n\
Key sources:\n- https://www.nrel.gov/pv/cell-efficiency.html\n- arXiv:2401.01234";

    fn request(detailed: bool) -> ResearchRequest {
        ResearchRequest::new(
            "Perovskite solar cells",
            ["How efficient are they?", "What limits lifetime?"],
            ResearchMode::Standard,
        )
        .expect("valid request")
        .with_detailed_report(detailed)
    }

    #[test]
    fn sections_follow_fixed_order() {
        let result = ResearchResult::success(NARRATIVE, Vec::new(), ModeUsed::Standard);
        let report = assemble(&request(true), &result).expect("report expected");

        assert_eq!(report.title, "Research Report: Perovskite solar cells");
        let names: Vec<_> = report.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                SECTION_EXECUTIVE_SUMMARY,
                SECTION_RESEARCH_QUESTIONS,
                SECTION_METHODOLOGY,
                SECTION_KEY_FINDINGS,
                SECTION_CONCLUSION
            ]
        );
        assert_eq!(
            report.section(SECTION_EXECUTIVE_SUMMARY),
            Some("Perovskite cells passed 26% efficiency in 2024.\nStability remains the main obstacle.")
        );
        assert_eq!(
            report.section(SECTION_RESEARCH_QUESTIONS),
            Some("- How efficient are they?\n- What limits lifetime?")
        );
        assert!(report.section(SECTION_KEY_FINDINGS).unwrap().contains("arXiv:2401.01234"));
    }

    #[test]
    fn methodology_tracks_mode_used() {
        let fallback = ResearchResult::success("Answer.", Vec::new(), ModeUsed::Fallback);
        let report = assemble(&request(true), &fallback).expect("report expected");
        assert_eq!(
            report.section(SECTION_METHODOLOGY),
            Some(methodology(ModeUsed::Fallback))
        );
        assert_ne!(methodology(ModeUsed::Standard), methodology(ModeUsed::Advanced));
    }

    #[test]
    fn no_report_when_not_requested_or_failed() {
        let ok = ResearchResult::success("Answer.", Vec::new(), ModeUsed::Standard);
        assert!(assemble(&request(false), &ok).is_none());

        let failed = ResearchResult::failure("primary; fallback", ModeUsed::Standard);
        assert!(assemble(&request(true), &failed).is_none());
    }

    #[test]
    fn rendering_is_deterministic() {
        let result = ResearchResult::success(NARRATIVE, Vec::new(), ModeUsed::Advanced);
        let first = assemble(&request(true), &result).unwrap().render_markdown();
        let second = assemble(&request(true), &result).unwrap().render_markdown();
        assert_eq!(first, second);
        assert!(first.starts_with("# Research Report: Perovskite solar cells\n\n## Executive Summary\n"));
        assert!(first.ends_with(&format!("## Conclusion\n{CONCLUSION}\n")));
    }
}
