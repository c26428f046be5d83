//! Anthropic Claude provider implementation

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, Error> {
        let client = http_client(&config)?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.anthropic.com/v1")
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("claude-sonnet-4-20250514")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());
        let (system, messages) = convert_messages(&request.messages);

        let api_request = AnthropicRequest {
            model: model.to_string(),
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(4096),
            temperature: request.temperature,
            tools: request.tools.as_ref().map(|tools| {
                tools.iter().map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                }).collect()
            }),
            tool_choice: request.tool_choice.as_ref().and_then(|tc| match tc {
                ToolChoice::Auto => Some(serde_json::json!({ "type": "auto" })),
                ToolChoice::Required => Some(serde_json::json!({ "type": "any" })),
                ToolChoice::Function { name } => {
                    Some(serde_json::json!({ "type": "tool", "name": name }))
                }
                ToolChoice::None => None,
            }),
        };

        let api_key = self.config.api_key.as_ref()
            .ok_or(ProviderError::AuthenticationFailed)?;

        let mut req = self.client
            .post(format!("{}/messages", self.base_url()))
            .header("x-api-key", api_key)
            .header("content-type", "application/json")
            .json(&api_request);

        if !self.config.headers.contains_key("anthropic-version") {
            req = req.header("anthropic-version", "2023-06-01");
        }
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let api_response: AnthropicResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(api_response.into_completion())
    }
}

/// Split out the system prompt and fold the transcript into Anthropic turns.
///
/// Assistant tool calls become `tool_use` blocks; consecutive tool results
/// are merged into a single user turn of `tool_result` blocks.
fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system = None;
    let mut out: Vec<AnthropicMessage> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => system = msg.content.clone(),
            Role::User => out.push(AnthropicMessage {
                role: "user".into(),
                content: AnthropicContent::Text(msg.content.clone().unwrap_or_default()),
            }),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if let Some(text) = msg.content.as_ref().filter(|t| !t.is_empty()) {
                    blocks.push(AnthropicContentBlock::Text { text: text.clone() });
                }
                for call in msg.requested_calls() {
                    let input = serde_json::from_str(&call.arguments)
                        .unwrap_or_else(|_| serde_json::json!({}));
                    blocks.push(AnthropicContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input,
                    });
                }
                // The API rejects empty content; a turn with nothing to say is dropped.
                if blocks.is_empty() {
                    continue;
                }
                out.push(AnthropicMessage {
                    role: "assistant".into(),
                    content: AnthropicContent::Blocks(blocks),
                });
            }
            Role::Tool => {
                let block = AnthropicContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: msg.content.clone().unwrap_or_default(),
                };
                match out.last_mut() {
                    Some(AnthropicMessage {
                        role,
                        content: AnthropicContent::Blocks(blocks),
                    }) if role.as_str() == "user" => blocks.push(block),
                    _ => out.push(AnthropicMessage {
                        role: "user".into(),
                        content: AnthropicContent::Blocks(vec![block]),
                    }),
                }
            }
        }
    }

    (system, out)
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

impl AnthropicResponse {
    fn into_completion(self) -> CompletionResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in self.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments: input.to_string(),
                    });
                }
                ContentBlock::Other => {}
            }
        }

        let finish_reason = match self.stop_reason.as_deref() {
            Some("end_turn") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            _ => FinishReason::Unknown,
        };

        CompletionResponse {
            id: self.id,
            model: self.model,
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls,
            finish_reason,
            usage: Usage {
                prompt_tokens: self.usage.input_tokens,
                completion_tokens: self.usage.output_tokens,
                total_tokens: self.usage.input_tokens + self.usage.output_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_folds_tool_results() {
        let mut assistant = ChatMessage::assistant("installing");
        assistant.tool_calls = Some(vec![
            ToolCall::new("toolu_1", "install_package", r#"{"package_name":"foo"}"#),
            ToolCall::new("toolu_2", "task_completed", "{}"),
        ]);
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("task"),
            assistant,
            ChatMessage::tool_result("toolu_1", "install_package", "ok"),
            ChatMessage::tool_result("toolu_2", "task_completed", "done"),
        ];

        let (system, converted) = convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("sys"));
        assert_eq!(converted.len(), 3);

        let encoded = serde_json::to_value(&converted).unwrap();
        assert_eq!(encoded[1]["content"][1]["type"], "tool_use");
        assert_eq!(encoded[1]["content"][1]["input"]["package_name"], "foo");
        assert_eq!(encoded[2]["role"], "user");
        assert_eq!(encoded[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(encoded[2]["content"][1]["tool_use_id"], "toolu_2");
    }

    #[test]
    fn test_convert_messages_drops_empty_assistant_turns() {
        let mut silent = ChatMessage::assistant("");
        silent.content = None;
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("task"),
            silent,
            ChatMessage::assistant(""),
            ChatMessage::assistant("next"),
        ];

        let (_, converted) = convert_messages(&messages);
        let encoded = serde_json::to_value(&converted).unwrap();
        assert_eq!(converted.len(), 2);
        assert_eq!(encoded[0]["role"], "user");
        assert_eq!(encoded[1]["role"], "assistant");
        assert_eq!(encoded[1]["content"][0]["text"], "next");
    }

    #[test]
    fn test_response_into_completion() {
        let body = serde_json::json!({
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                { "type": "text", "text": "Let me install it." },
                { "type": "tool_use", "id": "toolu_1", "name": "install_package",
                  "input": { "package_name": "foo" } }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 20, "output_tokens": 5 }
        });

        let response: AnthropicResponse = serde_json::from_value(body).unwrap();
        let completion = response.into_completion();
        assert_eq!(completion.content.as_deref(), Some("Let me install it."));
        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert_eq!(completion.tool_calls[0].arguments, r#"{"package_name":"foo"}"#);
        assert_eq!(completion.usage.total_tokens, 25);
    }
}
