//! Prompt templates for the agent session and the fallback tier.

use std::fmt::Write as _;

use crate::{ResearchMode, ResearchRequest};

/// Nudge sent once the iteration budget is spent and tools are withdrawn.
pub const FINAL_ANSWER_NUDGE: &str = "You have reached the maximum number of research steps. \
Using only the information gathered so far, write your best final answer now. \
Include the source URLs you relied on.";

/// Render the initial agent prompt for `request`.
pub fn build_prompt(request: &ResearchRequest) -> String {
    match request.mode() {
        ResearchMode::Standard => standard_prompt(request.topic(), request.questions()),
        ResearchMode::Advanced => advanced_prompt(request.topic(), request.questions()),
    }
}

/// Tool-free prompt used when the agent session could not finish.
pub fn fallback_prompt(topic: &str, questions: &[String]) -> String {
    format!(
        "Conduct comprehensive research on: {topic}\n\n\
         Answer these research questions:\n{}\n\
         Provide detailed information with key findings, trends, and insights.\n\
         Include specific examples and mention important developments in this field.",
        bullets(questions)
    )
}

fn standard_prompt(topic: &str, questions: &[String]) -> String {
    format!(
        "You are a research assistant. Research the following topic and answer the specific questions.\n\n\
         Topic: {topic}\n\n\
         Research Questions:\n{}\n\
         Use the available tools to gather information:\n\
         - web_search: Search the web for current information\n\
         - arxiv_search: Search for academic papers\n\
         - calculator: Perform calculations if needed\n\n\
         Provide a comprehensive answer with sources when possible.\n",
        bullets(questions)
    )
}

fn advanced_prompt(topic: &str, questions: &[String]) -> String {
    format!(
        "You are an expert research analyst conducting in-depth research.\n\n\
         TOPIC: {topic}\n\n\
         RESEARCH QUESTIONS:\n{}\n\
         RESEARCH METHODOLOGY:\n\
         1. First, use web_search to find current information and recent developments\n\
         2. Then, use arxiv_search to find academic research and scientific papers\n\
         3. Analyze the information from both sources\n\
         4. Identify key trends, patterns, and insights\n\
         5. Provide detailed analysis with specific examples and data\n\n\
         REQUIREMENTS:\n\
         - Conduct thorough multi-source research\n\
         - Compare and contrast information from different sources\n\
         - Provide specific examples and evidence\n\
         - Include statistical data if available\n\
         - Identify any controversies or differing viewpoints\n\
         - Suggest areas for further research\n\n\
         TOOLS AVAILABLE:\n\
         - web_search: Search for current news, articles, and information\n\
         - arxiv_search: Search for academic papers and scientific research\n\
         - calculator: Perform any necessary calculations\n\n\
         Provide a comprehensive, well-structured analysis.\n",
        bullets(questions)
    )
}

fn bullets(questions: &[String]) -> String {
    let mut output = String::new();
    for question in questions {
        let _ = writeln!(output, "- {question}");
    }
    output
}
