//! The fixed set of tools advertised to the model.

use super::arithmetic::{ArithmeticArgs, Operation};
use super::sql::{self, SqlQueryArgs, SqlQueryTool};
use super::{ToolError, ToolHost};
use crate::model::{ToolCall, ToolSpec};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// What a registered name dispatches to.
#[derive(Debug, Clone)]
pub enum ToolKind {
    Arithmetic(Operation),
    SqlQuery(SqlQueryTool),
}

impl ToolKind {
    fn spec(&self) -> ToolSpec {
        match self {
            Self::Arithmetic(op) => ToolSpec {
                name: op.name().to_string(),
                description: op.description().to_string(),
                schema: Operation::schema(),
            },
            Self::SqlQuery(_) => ToolSpec {
                name: sql::NAME.to_string(),
                description: sql::DESCRIPTION.to_string(),
                schema: sql::schema(),
            },
        }
    }
}

/// Ordered, immutable tool table.
#[derive(Debug)]
pub struct ToolRegistry {
    kinds: Vec<ToolKind>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Build a registry, rejecting duplicate names.
    pub fn new(kinds: Vec<ToolKind>) -> Result<Self, ToolError> {
        let specs: Vec<ToolSpec> = kinds.iter().map(ToolKind::spec).collect();

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(ToolError::Duplicate(spec.name.clone()));
            }
        }

        Ok(Self { kinds, specs })
    }

    /// `Multiply`, `Add`, `Subtract`, `Divide`, `SQLQuery`, in that order.
    pub fn standard(sql: SqlQueryTool) -> Result<Self, ToolError> {
        let kinds = Operation::ALL
            .into_iter()
            .map(ToolKind::Arithmetic)
            .chain(std::iter::once(ToolKind::SqlQuery(sql)))
            .collect();
        Self::new(kinds)
    }

    fn lookup(&self, name: &str) -> Option<&ToolKind> {
        self.specs
            .iter()
            .position(|spec| spec.name == name)
            .map(|i| &self.kinds[i])
    }
}

fn parse_args<T: DeserializeOwned>(name: &str, input: &Value) -> Result<T, ToolError> {
    serde_json::from_value(input.clone())
        .map_err(|e| ToolError::InvalidInput(format!("{name}: {e}")))
}

impl ToolHost for ToolRegistry {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let kind = self
            .lookup(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        debug!(tool = %call.name, input = %call.input, "executing tool");

        match kind {
            ToolKind::Arithmetic(op) => {
                let args: ArithmeticArgs = parse_args(&call.name, &call.input)?;
                op.apply(args)
                    .map_err(|e| ToolError::Execution(e.to_string()))
            }
            ToolKind::SqlQuery(tool) => {
                let args: SqlQueryArgs = parse_args(&call.name, &call.input)?;
                let outcome = tool.run(&args.sql_query).await;
                Ok(sql::render(&outcome))
            }
        }
    }
}
