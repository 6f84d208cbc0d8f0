//! Chat-completion client used by the agent session and the fallback tier.

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::tools::ToolDescriptor;
use crate::{LlmConfig, SecretValue};

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    User(String),
    /// A tool call previously issued by the model.
    ToolRequest {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Observation returned for the tool call with the same id.
    ToolResult {
        id: String,
        content: String,
    },
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Empty means the model must answer in plain text.
    pub tools: Vec<ToolDescriptor>,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            temperature,
        }
    }

    pub fn with_tools(mut self, tools: &[ToolDescriptor]) -> Self {
        self.tools = tools.to_vec();
        self
    }
}

/// What the model decided to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    Final(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("request to language model failed: {0}")]
    Transport(String),
    #[error("language model rate limited the request")]
    RateLimited,
    #[error("language model returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("language model returned an unusable response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelTurn, LlmError>;
}

/// OpenAI-compatible `/chat/completions` client with function calling.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretValue,
}

impl OpenAiChatModel {
    pub fn new(client: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages_to_json(&request.messages),
            "temperature": request.temperature,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(tool_to_json).collect());
        }
        body
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelTurn, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, tools = request.tools.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|err| LlmError::Malformed(format!("invalid JSON: {err}")))?;
        parse_completion(&json)
    }
}

fn messages_to_json(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            ChatMessage::User(text) => json!({ "role": "user", "content": text }),
            ChatMessage::ToolRequest {
                id,
                name,
                arguments,
            } => json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": arguments.to_string() },
                }],
            }),
            ChatMessage::ToolResult { id, content } => json!({
                "role": "tool",
                "tool_call_id": id,
                "content": content,
            }),
        })
        .collect()
}

fn tool_to_json(descriptor: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": descriptor.name,
            "description": descriptor.description,
            "parameters": descriptor.input_schema(),
        }
    })
}

/// Interpret the first choice of a completion body.
///
/// Only the first tool call is honoured; the session runs tools one at a time.
pub fn parse_completion(body: &Value) -> Result<ModelTurn, LlmError> {
    let message = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| LlmError::Malformed("no message in response".into()))?;

    if let Some(call) = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
    {
        let function = call
            .get("function")
            .ok_or_else(|| LlmError::Malformed("tool call without function".into()))?;
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::Malformed("tool call without name".into()))?;
        let id = call
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("call_0")
            .to_string();
        let arguments = match function.get("arguments") {
            Some(Value::String(raw)) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            Some(other) => other.clone(),
            None => Value::Object(Default::default()),
        };
        return Ok(ModelTurn::ToolCall {
            id,
            name: name.to_string(),
            arguments,
        });
    }

    match message.get("content").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(ModelTurn::Final(text.to_string())),
        _ => Err(LlmError::Malformed(
            "response carried neither content nor a tool call".into(),
        )),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::TOOL_TABLE;

    #[test]
    fn text_response_is_final() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Done." } }]
        });
        assert_eq!(parse_completion(&body).unwrap(), ModelTurn::Final("Done.".into()));
    }

    #[test]
    fn tool_call_arguments_are_decoded() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_42",
                        "type": "function",
                        "function": { "name": "web_search", "arguments": "{\"query\":\"rust\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let turn = parse_completion(&body).unwrap();
        assert_eq!(
            turn,
            ModelTurn::ToolCall {
                id: "call_42".into(),
                name: "web_search".into(),
                arguments: json!({ "query": "rust" }),
            }
        );
    }

    #[test]
    fn non_json_arguments_are_kept_as_text() {
        let body = json!({
            "choices": [{ "message": { "tool_calls": [{
                "id": "c1",
                "function": { "name": "calculator", "arguments": "2 + 2" }
            }]}}]
        });
        match parse_completion(&body).unwrap() {
            ModelTurn::ToolCall { arguments, .. } => assert_eq!(arguments, json!("2 + 2")),
            other => panic!("unexpected turn {other:?}"),
        }
    }

    #[test]
    fn empty_or_missing_content_is_malformed() {
        for body in [
            json!({ "choices": [] }),
            json!({ "choices": [{ "message": { "content": "   " } }] }),
            json!({ "error": "nope" }),
        ] {
            assert!(matches!(parse_completion(&body), Err(LlmError::Malformed(_))));
        }
    }

    #[test]
    fn history_serialises_in_openai_shape() {
        let messages = vec![
            ChatMessage::User("hi".into()),
            ChatMessage::ToolRequest {
                id: "c1".into(),
                name: "calculator".into(),
                arguments: json!({ "expression": "1 + 1" }),
            },
            ChatMessage::ToolResult {
                id: "c1".into(),
                content: "1 + 1 = 2".into(),
            },
        ];
        let json = messages_to_json(&messages);
        assert_eq!(json[1]["tool_calls"][0]["function"]["name"], "calculator");
        assert_eq!(
            json[1]["tool_calls"][0]["function"]["arguments"],
            "{\"expression\":\"1 + 1\"}"
        );
        assert_eq!(json[2]["role"], "tool");
        assert_eq!(json[2]["tool_call_id"], "c1");
    }

    #[test]
    fn tools_are_advertised_as_functions() {
        let json = tool_to_json(&TOOL_TABLE[1]);
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "arxiv_search");
        assert_eq!(json["function"]["parameters"]["required"][0], "query");
    }

    #[test]
    fn provider_error_message_is_extracted() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }
}
