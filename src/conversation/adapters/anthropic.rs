//! Anthropic Messages API adapter.

use super::http::{build_client, send_json};
use crate::conversation::{
    domain::{Conversation, ConversationTurn, ModelTurn, RequestedToolCall, ToolCallId, TurnRole},
    ports::{AdapterResult, ModelAdapter},
};
use crate::tool_registry::domain::ToolRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Model used when none is configured.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const EMPTY_RESULT: &str = "(no output)";

/// Model adapter for Anthropic's Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    system_prompt: String,
}

impl AnthropicAdapter {
    /// Creates an adapter for the default model.
    ///
    /// # Errors
    ///
    /// Returns [`crate::conversation::ports::AdapterError::Http`] when the
    /// HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> AdapterResult<Self> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            model: DEFAULT_ANTHROPIC_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            system_prompt: system_prompt.into(),
        })
    }

    /// Selects the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn request_body<'a>(
        &'a self,
        conversation: &Conversation,
        registry: &'a ToolRegistry,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: DEFAULT_MAX_TOKENS,
            system: &self.system_prompt,
            messages: messages_for(conversation),
            tools: registry
                .tools()
                .iter()
                .map(|tool| ToolSpec {
                    name: tool.name(),
                    description: tool.description(),
                    input_schema: tool.argument_schema(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    async fn infer(
        &self,
        conversation: &Conversation,
        registry: &ToolRegistry,
    ) -> AdapterResult<ModelTurn> {
        let body = self.request_body(conversation, registry);
        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "requesting Anthropic completion"
        );

        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        let response: MessagesResponse = send_json(request).await?;

        if response.stop_reason.as_deref() == Some("max_tokens") {
            warn!("Anthropic response truncated at the token limit");
        }
        Ok(model_turn_from(response))
    }

    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec<'a>>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct ToolSpec<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

fn messages_for(conversation: &Conversation) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();
    for turn in conversation.turns() {
        let Some(block) = content_block(turn) else {
            continue;
        };
        let role = match turn.role() {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.push(block),
            _ => messages.push(Message {
                role,
                content: vec![block],
            }),
        }
    }
    messages
}

fn content_block(turn: &ConversationTurn) -> Option<ContentBlock> {
    match turn {
        ConversationTurn::UserMessage { text } | ConversationTurn::AssistantMessage { text } => {
            (!text.trim().is_empty()).then(|| ContentBlock::Text { text: text.clone() })
        }
        ConversationTurn::ToolCallRequest {
            id,
            tool_name,
            arguments,
        } => Some(ContentBlock::ToolUse {
            id: id.to_string(),
            name: tool_name.clone(),
            input: if arguments.is_object() {
                arguments.clone()
            } else {
                Value::Object(serde_json::Map::new())
            },
        }),
        ConversationTurn::ToolResult {
            id,
            content,
            is_error,
        } => {
            let rendered = content.render();
            Some(ContentBlock::ToolResult {
                tool_use_id: id.to_string(),
                content: if rendered.is_empty() {
                    EMPTY_RESULT.to_owned()
                } else {
                    rendered
                },
                is_error: *is_error,
            })
        }
    }
}

fn model_turn_from(response: MessagesResponse) -> ModelTurn {
    let mut texts = Vec::new();
    let mut calls = Vec::new();
    for block in response.content {
        match block {
            ResponseBlock::Text { text } => texts.push(text),
            ResponseBlock::ToolUse { id, name, input } => {
                let call = RequestedToolCall::new(name, input);
                calls.push(match ToolCallId::new(id) {
                    Ok(call_id) => call.with_id(call_id),
                    Err(_) => call,
                });
            }
            ResponseBlock::Other => {}
        }
    }
    ModelTurn::from_parts(texts, calls)
}
