//! Tool host trait.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::ToolError;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Trait for tool execution hosts.
///
/// Implementations provide tool specifications and execute tool calls.
/// This is the boundary between the model loop and side effects.
pub trait ToolHost: Send + Sync {
    /// Get available tool specifications, in advertised order.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

impl<H: ToolHost> ToolHost for Arc<H> {
    fn specs(&self) -> &[ToolSpec] {
        (**self).specs()
    }

    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send {
        (**self).execute(call)
    }
}
