//! SQLite statement execution.

use crate::schema::{self, Schema};
use crate::{Error, QueryOutcome, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Per-call execution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Open the connection read-only and reject statements that would write.
    pub read_only: bool,
    /// Keep at most this many rows.
    pub max_rows: Option<usize>,
}

/// Handle on the business database file.
///
/// Holds only the path. Every call opens its own connection and drops it
/// before returning, so nothing is shared between calls.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Point at an existing database file. The file is not opened here.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self, read_only: bool) -> Result<Connection> {
        // Never create the file: the schema is owned elsewhere.
        let access = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        let flags = access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Ok(Connection::open_with_flags(&self.path, flags)?)
    }

    /// Run one statement verbatim.
    ///
    /// Never fails: every error is folded into [`QueryOutcome::Failed`].
    pub fn query(&self, sql: &str, options: QueryOptions) -> QueryOutcome {
        match self.try_query(sql, options) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "statement failed");
                QueryOutcome::from(e)
            }
        }
    }

    fn try_query(&self, sql: &str, options: QueryOptions) -> Result<QueryOutcome> {
        if is_blank(sql) {
            return Ok(QueryOutcome::Empty);
        }

        let conn = self.connect(options.read_only)?;
        let mut stmt = conn.prepare(sql)?;
        if options.read_only && !stmt.readonly() {
            return Err(Error::ReadOnly);
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut collected = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next()? {
            if options.max_rows.is_some_and(|max| collected.len() >= max) {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(to_json(row.get_ref(i)?));
            }
            collected.push(values);
        }

        if truncated {
            warn!(limit = ?options.max_rows, "result set truncated");
        }

        if collected.is_empty() {
            Ok(QueryOutcome::Empty)
        } else {
            Ok(QueryOutcome::Rows {
                columns,
                rows: collected,
                truncated,
            })
        }
    }

    /// Describe the tables, columns and foreign keys of the live database.
    pub fn schema(&self) -> Result<Schema> {
        if !self.path.exists() {
            return Err(Error::NotFound(self.path.display().to_string()));
        }
        let conn = self.connect(true)?;
        schema::introspect(&conn)
    }
}

/// True when `sql` holds nothing but whitespace, `;` and comments, so
/// there is no statement to prepare.
fn is_blank(sql: &str) -> bool {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, after)| after);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            // An unterminated block comment runs to the end of input.
            rest = comment.split_once("*/").map_or("", |(_, after)| after);
        } else {
            return rest.is_empty();
        }
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anhelados.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE productos (
                ID_Producto INTEGER PRIMARY KEY,
                Nombre TEXT NOT NULL,
                Precio REAL NOT NULL
            );
            INSERT INTO productos VALUES (1, 'Vainilla', 8.5);
            INSERT INTO productos VALUES (2, 'Lúcuma', 10.0);
            INSERT INTO productos VALUES (3, 'Chirimoya', 12.0);
            "#,
        )
        .unwrap();
        (dir, Store::new(path))
    }

    #[test]
    fn select_returns_every_row_in_column_order() {
        let (_dir, store) = fixture();
        let outcome = store.query(
            "SELECT ID_Producto, Nombre, Precio FROM productos ORDER BY ID_Producto",
            QueryOptions::default(),
        );

        let QueryOutcome::Rows { columns, rows, truncated } = outcome else {
            panic!("expected rows, got {outcome:?}");
        };
        assert_eq!(columns, ["ID_Producto", "Nombre", "Precio"]);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(rows[1], vec![json!(2), json!("Lúcuma"), json!(10.0)]);
        assert!(!truncated);
    }

    #[test]
    fn no_matching_rows_is_empty() {
        let (_dir, store) = fixture();
        let outcome = store.query(
            "SELECT * FROM productos WHERE Precio > 100",
            QueryOptions::default(),
        );
        assert_eq!(outcome, QueryOutcome::Empty);

        let outcome = store.query("SELECT 1 WHERE 0", QueryOptions::default());
        assert_eq!(outcome, QueryOutcome::Empty);
    }

    #[test]
    fn blank_and_comment_only_input_is_empty() {
        let (_dir, store) = fixture();
        for sql in [
            "",
            "   \n\t",
            ";",
            " ; ;",
            "-- solo comentario",
            "/* nada */",
            "-- uno\n/* dos */ ;\n",
            "/* sin cerrar",
        ] {
            assert_eq!(
                store.query(sql, QueryOptions::default()),
                QueryOutcome::Empty,
                "{sql:?}"
            );
        }
    }

    #[test]
    fn commented_statement_still_runs() {
        let (_dir, store) = fixture();
        let outcome = store.query(
            "-- total\nSELECT COUNT(*) FROM productos; -- fin",
            QueryOptions::default(),
        );
        let QueryOutcome::Rows { rows, .. } = outcome else {
            panic!("expected rows, got {outcome:?}");
        };
        assert_eq!(rows, vec![vec![json!(3)]]);
    }

    #[test]
    fn second_statement_is_rejected_unrun() {
        let (_dir, store) = fixture();
        let outcome = store.query("SELECT 1; DELETE FROM productos", QueryOptions::default());
        assert!(outcome.is_failure());

        let outcome = store.query("SELECT COUNT(*) FROM productos", QueryOptions::default());
        assert_eq!(
            outcome,
            QueryOutcome::Rows {
                columns: vec!["COUNT(*)".into()],
                rows: vec![vec![json!(3)]],
                truncated: false,
            }
        );
    }

    #[test]
    fn syntax_error_is_folded_into_outcome() {
        let (_dir, store) = fixture();
        let outcome = store.query("SELEC * FROM productos", QueryOptions::default());
        let QueryOutcome::Failed { reason } = outcome else {
            panic!("expected failure");
        };
        assert!(reason.contains("syntax error"), "{reason}");
    }

    #[test]
    fn unknown_table_fails() {
        let (_dir, store) = fixture();
        let outcome = store.query("SELECT * FROM helados", QueryOptions::default());
        assert!(outcome.is_failure());
    }

    #[test]
    fn write_is_visible_to_next_call() {
        let (_dir, store) = fixture();
        let update = store.query(
            "UPDATE productos SET Precio = 9.0 WHERE ID_Producto = 1",
            QueryOptions::default(),
        );
        assert_eq!(update, QueryOutcome::Empty);

        let outcome = store.query(
            "SELECT Precio FROM productos WHERE ID_Producto = 1",
            QueryOptions::default(),
        );
        let QueryOutcome::Rows { rows, .. } = outcome else {
            panic!("expected rows");
        };
        assert_eq!(rows, vec![vec![json!(9.0)]]);
    }

    #[test]
    fn read_only_rejects_writes() {
        let (_dir, store) = fixture();
        let options = QueryOptions {
            read_only: true,
            max_rows: None,
        };
        let outcome = store.query("DELETE FROM productos", options);
        assert!(outcome.is_failure());

        let outcome = store.query("SELECT COUNT(*) FROM productos", options);
        let QueryOutcome::Rows { rows, .. } = outcome else {
            panic!("expected rows");
        };
        assert_eq!(rows, vec![vec![json!(3)]]);
    }

    #[test]
    fn max_rows_truncates() {
        let (_dir, store) = fixture();
        let options = QueryOptions {
            read_only: false,
            max_rows: Some(2),
        };
        let outcome = store.query("SELECT Nombre FROM productos", options);
        let QueryOutcome::Rows { rows, truncated, .. } = outcome else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 2);
        assert!(truncated);
    }

    #[test]
    fn missing_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let store = Store::new(&path);

        assert!(store.query("SELECT 1", QueryOptions::default()).is_failure());
        assert!(!path.exists());
        assert!(matches!(store.schema(), Err(Error::NotFound(_))));
    }

    #[test]
    fn nulls_and_blobs_map_to_json() {
        let (_dir, store) = fixture();
        let outcome = store.query("SELECT NULL, x'0102'", QueryOptions::default());
        let QueryOutcome::Rows { rows, .. } = outcome else {
            panic!("expected rows");
        };
        assert_eq!(rows, vec![vec![Value::Null, json!([1, 2])]]);
    }
}
