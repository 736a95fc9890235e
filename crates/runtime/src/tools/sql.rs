//! The `SQLQuery` tool.

use policy::{Decision, Policy, StatementKind};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use storage::{QueryOptions, QueryOutcome, Store};
use tracing::{debug, warn};

/// Returned to the model when a statement succeeds without rows.
pub const NO_RECORDS: &str = "No existe registro";

/// Prefix of every failure returned to the model.
pub const ERROR_PREFIX: &str = "Error en la consulta: ";

pub const NAME: &str = "SQLQuery";
pub const DESCRIPTION: &str = "Execute an SQL query and return the results.";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sql_query": {
                "type": "string",
                "description": "The SQL query to execute.",
            },
        },
        "required": ["sql_query"],
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqlQueryArgs {
    pub sql_query: String,
}

/// Runs caller-supplied statements against the store, subject to a policy.
#[derive(Debug, Clone)]
pub struct SqlQueryTool {
    store: Store,
    policy: Arc<Policy>,
}

impl SqlQueryTool {
    pub fn new(store: Store, policy: Policy) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }

    /// Run one statement on a blocking thread.
    pub async fn run(&self, sql: &str) -> QueryOutcome {
        let kind = StatementKind::classify(sql);
        if let Decision::Deny { reason } = self.policy.check(kind) {
            warn!(%kind, "statement denied");
            return QueryOutcome::failed(reason);
        }

        let options = QueryOptions {
            read_only: self.policy.is_read_only(),
            max_rows: self.policy.max_rows(),
        };
        let store = self.store.clone();
        let sql = sql.to_string();
        let outcome = tokio::task::spawn_blocking(move || store.query(&sql, options))
            .await
            .unwrap_or_else(|e| QueryOutcome::failed(format!("query task failed: {e}")));

        debug!(%kind, rows = outcome.row_count(), "statement finished");
        outcome
    }
}

/// Wire form handed back to the model: an array of row arrays, the
/// [`NO_RECORDS`] sentinel, or an [`ERROR_PREFIX`]ed message.
pub fn render(outcome: &QueryOutcome) -> Value {
    match outcome {
        QueryOutcome::Rows { rows, .. } => json!(rows),
        QueryOutcome::Empty => Value::String(NO_RECORDS.to_string()),
        QueryOutcome::Failed { reason } => Value::String(format!("{ERROR_PREFIX}{reason}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(policy: Policy) -> (tempfile::TempDir, SqlQueryTool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anhelados.db");
        std::fs::File::create(&path).unwrap();
        (dir, SqlQueryTool::new(Store::new(path), policy))
    }

    #[test]
    fn renders_three_shapes() {
        let rows = QueryOutcome::Rows {
            columns: vec!["Nombre".into(), "Precio".into()],
            rows: vec![vec![json!("Fresa"), json!(8.5)]],
            truncated: false,
        };
        assert_eq!(render(&rows), json!([["Fresa", 8.5]]));
        assert_eq!(render(&QueryOutcome::Empty), json!("No existe registro"));
        assert_eq!(
            render(&QueryOutcome::failed("no such table: helados")),
            json!("Error en la consulta: no such table: helados")
        );
    }

    #[tokio::test]
    async fn write_then_read() {
        let (_dir, tool) = tool(Policy::permissive());
        assert_eq!(
            tool.run("CREATE TABLE gastos (ID_Gasto INTEGER, Tipo TEXT, Monto REAL)")
                .await,
            QueryOutcome::Empty
        );
        assert_eq!(
            tool.run("INSERT INTO gastos VALUES (1, 'luz', 120.5)").await,
            QueryOutcome::Empty
        );

        let outcome = tool.run("SELECT Tipo, Monto FROM gastos").await;
        assert_eq!(render(&outcome), json!([["luz", 120.5]]));
    }

    #[tokio::test]
    async fn policy_denial_is_a_failed_outcome() {
        let (_dir, tool) = tool(Policy::read_only());
        let outcome = tool.run("DROP TABLE productos").await;
        assert_eq!(
            render(&outcome),
            json!("Error en la consulta: schema statements are not in the allowlist")
        );
    }

    #[tokio::test]
    async fn invalid_statement_renders_error_prefix() {
        let (_dir, tool) = tool(Policy::permissive());
        let rendered = render(&tool.run("SELEC 1").await);
        let text = rendered.as_str().unwrap();
        assert!(text.starts_with(ERROR_PREFIX), "{text}");
    }
}
