//! Session management.

use crate::history::ConversationHistory;
use crate::model::{Backend, Message, ModelRequest, ToolCall, ToolResult, Usage};
use crate::tools::ToolHost;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Model round trips allowed for one question before giving up.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Unique identifier for a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A conversation session.
///
/// Owns the model-facing message list (including tool traffic) and the
/// user-facing [`ConversationHistory`]. Nothing is persisted.
pub struct Session<B, H> {
    pub id: SessionId,
    backend: B,
    host: H,
    messages: Vec<Message>,
    history: ConversationHistory,
    usage: Usage,
    max_iterations: usize,
}

impl<B: Backend, H: ToolHost> Session<B, H> {
    pub fn new(backend: B, host: H) -> Self {
        Self {
            id: SessionId::new(),
            backend,
            host,
            messages: Vec::new(),
            history: ConversationHistory::new(),
            usage: Usage::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Tokens spent over the whole session.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Send a user message and run tool rounds until the model answers.
    ///
    /// On error the model-facing messages of this turn are discarded so the
    /// next question starts from a consistent state; the user turn stays in
    /// the transcript.
    pub async fn chat(&mut self, question: &str) -> Result<String> {
        let checkpoint = self.messages.len();
        self.history.push_user(question);
        self.messages.push(Message::user(question));

        match self.run().await {
            Ok(reply) => {
                self.history.push_assistant(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                self.messages.truncate(checkpoint);
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<String> {
        for iteration in 1..=self.max_iterations {
            let response = self
                .backend
                .call(ModelRequest {
                    messages: &self.messages,
                    tools: self.host.specs(),
                })
                .await?;
            self.usage += response.usage;

            let calls = response.message.tool_calls();
            if calls.is_empty() {
                let reply = response.message.text();
                debug!(
                    session = %self.id,
                    iteration,
                    total_tokens = self.usage.total_tokens(),
                    "final answer"
                );
                self.messages.push(response.message);
                return Ok(reply);
            }

            self.messages.push(response.message);
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute(call).await);
            }
            debug!(
                session = %self.id,
                iteration,
                calls = results.len(),
                failed = results.iter().filter(|r| r.is_failure()).count(),
                "tool round"
            );
            self.messages.push(Message::tool_results(results));
        }

        warn!(session = %self.id, max = self.max_iterations, "iteration limit reached");
        Err(Error::MaxIterations(self.max_iterations))
    }

    async fn execute(&self, call: ToolCall) -> ToolResult {
        match self.host.execute(&call).await {
            Ok(output) => {
                info!(session = %self.id, tool = %call.name, input = %call.input, %output, "tool call");
                ToolResult::Success {
                    tool_call_id: call.id,
                    output,
                }
            }
            Err(error) => {
                warn!(session = %self.id, tool = %call.name, %error, "tool call failed");
                ToolResult::Failure {
                    tool_call_id: call.id,
                    error,
                }
            }
        }
    }
}
