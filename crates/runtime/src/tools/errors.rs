use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// The query tool never produces these for statement failures; those are
/// part of its normal output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("duplicate tool name: {0}")]
    Duplicate(String),
    #[error("execution failed: {0}")]
    Execution(String),
}
