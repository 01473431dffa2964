//! Google Gemini `generateContent` adapter.

use super::http::{build_client, send_json};
use crate::conversation::{
    domain::{Conversation, ConversationTurn, ModelTurn, RequestedToolCall, ToolCallId, TurnRole},
    ports::{AdapterError, AdapterResult, ModelAdapter},
};
use crate::tool_registry::domain::{ToolDescriptor, ToolRegistry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const UNSUPPORTED_SCHEMA_KEYS: [&str; 2] = ["$schema", "additionalProperties"];

/// Model adapter for the Gemini API.
///
/// Gemini assigns no call ids, so requested calls carry none and the loop
/// generates them.
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    system_prompt: String,
}

impl GeminiAdapter {
    /// Creates an adapter for the default model.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Http`] when the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> AdapterResult<Self> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_owned(),
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
    ) -> GenerateContentRequest<'a> {
        let declarations: Vec<FunctionDeclaration<'a>> =
            registry.tools().iter().map(declaration_for).collect();

        GenerateContentRequest {
            contents: contents_for(conversation),
            system_instruction: SystemInstruction {
                parts: [TextPart {
                    text: &self.system_prompt,
                }],
            },
            tools: if declarations.is_empty() {
                Vec::new()
            } else {
                vec![ToolGroup {
                    function_declarations: declarations,
                }]
            },
        }
    }
}

#[async_trait]
impl ModelAdapter for GeminiAdapter {
    async fn infer(
        &self,
        conversation: &Conversation,
        registry: &ToolRegistry,
    ) -> AdapterResult<ModelTurn> {
        let body = self.request_body(conversation, registry);
        debug!(
            model = %self.model,
            contents = body.contents.len(),
            "requesting Gemini completion"
        );

        let request = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let response: GenerateContentResponse = send_json(request).await?;

        model_turn_from(response)
    }

    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    system_instruction: SystemInstruction<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolGroup<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    FunctionCall { name: String, args: Value },
    FunctionResponse { name: String, response: Value },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolGroup<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<ResponseFunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    id: Option<String>,
}

fn declaration_for(tool: &ToolDescriptor) -> FunctionDeclaration<'_> {
    let schema = clean_schema(tool.argument_schema());
    let has_properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|properties| !properties.is_empty());

    FunctionDeclaration {
        name: tool.name(),
        description: tool.description(),
        parameters: has_properties.then_some(schema),
    }
}

/// Removes schema keywords Gemini rejects, recursing into properties and items.
fn clean_schema(schema: &Value) -> Value {
    let Some(object) = schema.as_object() else {
        return schema.clone();
    };

    let mut cleaned = Map::new();
    for (key, value) in object {
        if UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let converted = match (key.as_str(), value) {
            ("properties", Value::Object(properties)) => Value::Object(
                properties
                    .iter()
                    .map(|(name, property)| (name.clone(), clean_schema(property)))
                    .collect(),
            ),
            ("items", Value::Object(_)) => clean_schema(value),
            _ => value.clone(),
        };
        cleaned.insert(key.clone(), converted);
    }
    Value::Object(cleaned)
}

fn contents_for(conversation: &Conversation) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();
    for turn in conversation.turns() {
        let Some(part) = part_for(conversation, turn) else {
            continue;
        };
        let role = match turn.role() {
            TurnRole::User => "user",
            TurnRole::Assistant => "model",
        };

        match contents.last_mut() {
            Some(last) if last.role == role => last.parts.push(part),
            _ => contents.push(Content {
                role,
                parts: vec![part],
            }),
        }
    }
    contents
}

fn part_for(conversation: &Conversation, turn: &ConversationTurn) -> Option<Part> {
    match turn {
        ConversationTurn::UserMessage { text } | ConversationTurn::AssistantMessage { text } => {
            (!text.trim().is_empty()).then(|| Part::Text(text.clone()))
        }
        ConversationTurn::ToolCallRequest {
            tool_name,
            arguments,
            ..
        } => Some(Part::FunctionCall {
            name: tool_name.clone(),
            args: if arguments.is_object() {
                arguments.clone()
            } else {
                json!({})
            },
        }),
        ConversationTurn::ToolResult { id, content, .. } => Some(Part::FunctionResponse {
            name: conversation
                .tool_name_for(id)
                .map_or_else(|| id.to_string(), str::to_owned),
            response: json!({ "result": content.render() }),
        }),
    }
}

fn model_turn_from(response: GenerateContentResponse) -> AdapterResult<ModelTurn> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .map_or_else(
                || "response contained no candidates".to_owned(),
                |reason| format!("prompt blocked: {reason}"),
            );
        return Err(AdapterError::InvalidResponse(reason));
    };

    let Some(content) = candidate.content else {
        return Err(AdapterError::InvalidResponse(format!(
            "candidate finished with {} and no content",
            candidate.finish_reason.as_deref().unwrap_or("unknown reason")
        )));
    };

    let mut texts = Vec::new();
    let mut calls = Vec::new();
    for part in content.parts {
        if part.thought {
            continue;
        }
        if let Some(call) = part.function_call {
            let arguments = if call.args.is_null() {
                json!({})
            } else {
                call.args
            };
            let requested = RequestedToolCall::new(call.name, arguments);
            calls.push(match call.id.map(ToolCallId::new) {
                Some(Ok(id)) => requested.with_id(id),
                _ => requested,
            });
        } else if let Some(text) = part.text {
            texts.push(text);
        }
    }
    Ok(ModelTurn::from_parts(texts, calls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_registry::domain::InvocationResult;
    use rstest::{fixture, rstest};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[fixture]
    fn registry() -> ToolRegistry {
        ToolRegistry::new([
            ToolDescriptor::new(
                "nmap_scan",
                "Run an nmap scan",
                json!({
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "target": {"type": "string"},
                        "ports": {
                            "type": "array",
                            "items": {"type": "object", "additionalProperties": false}
                        }
                    }
                }),
            )
            .expect("valid descriptor"),
            ToolDescriptor::new("server_health", "", ToolDescriptor::default_schema())
                .expect("valid descriptor"),
        ])
        .expect("valid registry")
    }

    fn adapter(base_url: &str) -> GeminiAdapter {
        GeminiAdapter::new("test-key", "You are a pentest assistant.")
            .expect("client builds")
            .with_base_url(base_url)
    }

    #[test]
    fn schema_cleaning_recurses() {
        let cleaned = clean_schema(&json!({
            "$schema": "x",
            "type": "object",
            "additionalProperties": true,
            "properties": {
                "nested": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {"depth": {"type": "integer"}}
                },
                "list": {"type": "array", "items": {"$schema": "y", "type": "string"}}
            }
        }));

        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": {
                    "nested": {"type": "object", "properties": {"depth": {"type": "integer"}}},
                    "list": {"type": "array", "items": {"type": "string"}}
                }
            })
        );
    }

    #[rstest]
    fn request_uses_function_parts(registry: ToolRegistry) {
        let adapter = adapter(DEFAULT_BASE_URL);
        let mut conversation = Conversation::new();
        conversation.record_user_message("scan 10.10.11.50");
        let id = ToolCallId::generate();
        conversation
            .record_tool_call(id.clone(), "nmap_scan", json!({"target": "10.10.11.50"}))
            .expect("request recorded");
        conversation
            .record_tool_result(&id, InvocationResult::text("22/tcp open ssh"))
            .expect("result recorded");

        let body = serde_json::to_value(adapter.request_body(&conversation, &registry))
            .expect("request serializes");

        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "scan 10.10.11.50"}]},
                {"role": "model", "parts": [
                    {"functionCall": {"name": "nmap_scan", "args": {"target": "10.10.11.50"}}}
                ]},
                {"role": "user", "parts": [
                    {"functionResponse": {"name": "nmap_scan",
                                          "response": {"result": "22/tcp open ssh"}}}
                ]}
            ])
        );
        assert_eq!(
            body["systemInstruction"],
            json!({"parts": [{"text": "You are a pentest assistant."}]})
        );
        let declarations = &body["tools"][0]["functionDeclarations"];
        assert_eq!(declarations[0]["parameters"].get("$schema"), None);
        assert_eq!(declarations[1].get("parameters"), None);
    }

    #[rstest]
    #[tokio::test]
    async fn function_calls_carry_no_ids(registry: ToolRegistry) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"text": "planning", "thought": true},
                        {"text": "Scanning now."},
                        {"functionCall": {"name": "nmap_scan", "args": {"target": "10.10.11.50"}}}
                    ]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let mut conversation = Conversation::new();
        conversation.record_user_message("scan 10.10.11.50");

        let turn = adapter(&server.uri())
            .infer(&conversation, &registry)
            .await
            .expect("inference succeeds");

        assert_eq!(
            turn,
            ModelTurn::ToolCalls {
                commentary: Some("Scanning now.".to_owned()),
                calls: vec![RequestedToolCall::new(
                    "nmap_scan",
                    json!({"target": "10.10.11.50"})
                )],
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn blocked_prompt_is_invalid_response(registry: ToolRegistry) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            )
            .mount(&server)
            .await;
        let mut conversation = Conversation::new();
        conversation.record_user_message("scan");

        let result = adapter(&server.uri()).infer(&conversation, &registry).await;

        assert!(matches!(
            result,
            Err(AdapterError::InvalidResponse(message)) if message.contains("SAFETY")
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn server_errors_surface_status(registry: ToolRegistry) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        let mut conversation = Conversation::new();
        conversation.record_user_message("scan");

        let result = adapter(&server.uri()).infer(&conversation, &registry).await;

        assert!(matches!(
            result,
            Err(AdapterError::Status { status: 503, .. })
        ));
    }
}
