use super::errors::ModelError;
use crate::tools::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, echoed back with the result.
    pub id: String,
    pub name: String,
    /// Arguments as JSON. Kept as a string when the provider sent
    /// something that does not parse.
    pub input: Value,
}

/// The result the runtime returned from a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success {
        tool_call_id: String,
        output: Value,
    },
    Failure {
        tool_call_id: String,
        error: ToolError,
    },
}

impl ToolResult {
    pub fn tool_call_id(&self) -> &str {
        match self {
            Self::Success { tool_call_id, .. } | Self::Failure { tool_call_id, .. } => tool_call_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// A part of a message, which can be text or a tool interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// A message, consisting of a role and one or more parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A user-side message carrying tool results back to the model.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            parts: results.into_iter().map(Part::ToolResult).collect(),
        }
    }

    /// Get combined text content from all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool calls from this message.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema object for the arguments.
    pub schema: Value,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Everything needed for a model request.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// The response from a model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub message: Message,
    pub usage: Usage,
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            input: Value::Null,
        }
    }

    #[test]
    fn message_text_skips_tool_parts() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Hola ".into()),
                Part::ToolCall(call("1", "Add")),
                Part::Text("amigo".into()),
            ],
        };
        assert_eq!(msg.text(), "Hola amigo");
    }

    #[test]
    fn message_tool_calls_keep_order() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Un momento".into()),
                Part::ToolCall(call("1", "SQLQuery")),
                Part::ToolCall(call("2", "Divide")),
            ],
        };
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "SQLQuery");
        assert_eq!(calls[1].name, "Divide");
    }

    #[test]
    fn tool_results_message_is_user_side() {
        let msg = Message::tool_results(vec![
            ToolResult::Success {
                tool_call_id: "a".into(),
                output: Value::from(42),
            },
            ToolResult::Failure {
                tool_call_id: "b".into(),
                error: ToolError::NotFound("Sqrt".into()),
            },
        ]);
        assert_eq!(msg.role, Role::User);
        assert!(msg.text().is_empty());
        let ids: Vec<_> = msg
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolResult(r) => Some(r.tool_call_id()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn usage_accumulates() {
        let mut usage = Usage::default();
        usage += Usage {
            input_tokens: 100,
            output_tokens: 20,
        };
        usage += Usage {
            input_tokens: 50,
            output_tokens: 5,
        };
        assert_eq!(usage.total_tokens(), 175);
    }
}
