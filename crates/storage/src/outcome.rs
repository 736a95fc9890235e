//! Tagged result of running one statement.

use serde::Serialize;
use serde_json::Value;

/// What a statement produced.
///
/// Callers branch on the variant instead of inspecting strings; the wire
/// rendering the model sees is built on top of this by the tool layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// The statement produced at least one row.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        /// Set when rows past the configured limit were dropped.
        truncated: bool,
    },
    /// The statement ran and produced no rows.
    Empty,
    /// The statement could not be prepared or executed.
    Failed { reason: String },
}

impl QueryOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Number of rows returned (zero for empty and failed outcomes).
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows { rows, .. } => rows.len(),
            Self::Empty | Self::Failed { .. } => 0,
        }
    }
}

impl From<crate::Error> for QueryOutcome {
    fn from(error: crate::Error) -> Self {
        match error {
            crate::Error::Database(inner) => Self::failed(inner.to_string()),
            other => Self::failed(other.to_string()),
        }
    }
}
