use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::llm::{ChatMessage, CompletionRequest, LanguageModel, ModelTurn};
use crate::prompts::fallback_prompt;
use crate::{ModeUsed, ResearchResult};

/// Sole source attached to fallback answers.
pub const FALLBACK_SOURCE: &str = "AI-generated analysis";

/// Terminal tier: one tool-free completion when the agent session fails.
#[derive(Clone)]
pub struct FallbackResponder {
    llm: Arc<dyn LanguageModel>,
    temperature: f32,
}

impl FallbackResponder {
    pub fn new(llm: Arc<dyn LanguageModel>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    #[instrument(name = "fallback.respond", skip(self, questions), fields(questions = questions.len()))]
    pub async fn respond(&self, topic: &str, questions: &[String]) -> ResearchResult {
        let prompt = fallback_prompt(topic, questions);
        let request = CompletionRequest::new(vec![ChatMessage::User(prompt)], self.temperature);

        match self.llm.complete(request).await {
            Ok(ModelTurn::Final(text)) => {
                info!(chars = text.len(), "fallback completion received");
                ResearchResult::success(text, [FALLBACK_SOURCE.to_string()], ModeUsed::Fallback)
            }
            Ok(ModelTurn::ToolCall { name, .. }) => {
                warn!(tool = %name, "fallback completion requested a tool");
                ResearchResult::failure(
                    format!("fallback completion requested tool `{name}` instead of answering"),
                    ModeUsed::Fallback,
                )
            }
            Err(err) => {
                warn!(error = %err, "fallback completion failed");
                ResearchResult::failure(err.to_string(), ModeUsed::Fallback)
            }
        }
    }
}
