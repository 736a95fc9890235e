//! OpenAI Chat Completions backend.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult,
    ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    tool_type: String,
    function: ApiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded arguments.
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    timeout: Duration,
    system: Option<String>,
}

impl OpenAiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
            system: None,
        }
    }

    /// Any OpenAI-compatible endpoint, e.g. `http://localhost:11434/v1`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn build(self) -> Result<OpenAiBackend, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(OpenAiBackend {
            client,
            api_key: self.api_key,
            model: self.model,
            endpoint: format!("{}/chat/completions", self.base_url.trim_end_matches('/')),
            max_tokens: self.max_tokens,
            system: self.system,
        })
    }
}

/// OpenAI Chat Completions backend.
///
/// Cheap to clone: the HTTP client is reference counted.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
    system: Option<String>,
}

impl OpenAiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new(api_key, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// One history message can expand to several wire messages: every tool
    /// result travels as its own `tool` message.
    fn message_to_api(msg: &Message) -> Vec<ApiMessage> {
        let role = Self::role_to_api(msg.role);

        if msg.role == Role::Assistant {
            let calls: Vec<ApiToolCall> = msg
                .tool_calls()
                .into_iter()
                .map(|call| ApiToolCall {
                    id: call.id,
                    tool_type: function_type(),
                    function: ApiFunctionCall {
                        name: call.name,
                        arguments: encode_arguments(&call.input),
                    },
                })
                .collect();
            let text = msg.text();
            return vec![ApiMessage {
                role: role.to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!calls.is_empty()).then_some(calls),
                tool_call_id: None,
            }];
        }

        let mut out = Vec::new();
        let mut text = String::new();
        for part in &msg.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::ToolResult(result) => out.push(Self::tool_result_to_api(result)),
                Part::ToolCall(_) => {}
            }
        }
        if !text.is_empty() {
            out.push(ApiMessage::text(role, text));
        }
        out
    }

    fn tool_result_to_api(result: &ToolResult) -> ApiMessage {
        let content = match result {
            // Strings go through unquoted so the model reads the sentinel
            // and error texts as plain text.
            ToolResult::Success { output, .. } => match output {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            ToolResult::Failure { error, .. } => format!("error: {error}"),
        };
        ApiMessage {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(result.tool_call_id().to_string()),
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool {
        ApiTool {
            tool_type: "function",
            function: ApiFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.schema.clone(),
            },
        }
    }

    fn response_to_message(msg: ApiMessage) -> Message {
        let mut parts = Vec::new();
        if let Some(text) = msg.content.filter(|t| !t.is_empty()) {
            parts.push(Part::Text(text));
        }
        for call in msg.tool_calls.unwrap_or_default() {
            parts.push(Part::ToolCall(ToolCall {
                id: call.id,
                name: call.function.name,
                input: decode_arguments(call.function.arguments),
            }));
        }
        Message {
            role: Role::Assistant,
            parts,
        }
    }

    fn build_request<'a>(&'a self, request: &ModelRequest<'_>) -> ApiRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &self.system {
            messages.push(ApiMessage::text("system", system.clone()));
        }
        messages.extend(request.messages.iter().flat_map(Self::message_to_api));

        let tools: Vec<ApiTool> = request.tools.iter().map(Self::tool_to_api).collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");

        ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
            tools,
            tool_choice,
        }
    }
}

fn encode_arguments(input: &Value) -> String {
    match input {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn decode_arguments(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({}, {})", self.model, self.endpoint)
    }
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl Backend for OpenAiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = self.build_request(&request);
        debug!(
            model = %self.model,
            messages = api_request.messages.len(),
            tools = api_request.tools.len(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {}", error_message(&body))));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".into()))?;
        debug!(finish_reason = ?choice.finish_reason, "chat completion received");

        let message = Self::response_to_message(choice.message);
        let usage = api_response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ModelResponse { message, usage })
    }
}
