//! Schema introspection.

use crate::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;

/// Tables, columns and foreign keys read from `sqlite_master`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    /// Declared type, empty when the column has none.
    pub declared_type: String,
    pub primary_key: bool,
}

/// A foreign key from `column` to `table.target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub column: String,
    pub table: String,
    /// `None` when the key points at the parent's primary key implicitly.
    pub target: Option<String>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

pub(crate) fn introspect(conn: &Connection) -> Result<Schema> {
    let names: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        stmt.query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?
    };

    let mut columns_stmt =
        conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let mut references_stmt = conn.prepare(
        r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
    )?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let columns = columns_stmt
            .query_map([&name], |row| {
                Ok(Column {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    primary_key: row.get::<_, i64>(2)? > 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let references = references_stmt
            .query_map([&name], |row| {
                Ok(Reference {
                    column: row.get(0)?,
                    table: row.get(1)?,
                    target: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        tables.push(Table {
            name,
            columns,
            references,
        });
    }

    Ok(Schema { tables })
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.declared_type.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.declared_type)
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} ({target})", self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

/// One line per table, numbered, in the "tabla: columnas, Referencia: ..."
/// shape the assistant prompt uses.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self
            .columns
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}: {columns}", self.name)?;

        if !self.references.is_empty() {
            let label = if self.references.len() == 1 {
                "Referencia"
            } else {
                "Referencias"
            };
            let references = self
                .references
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, ", {label}: {references}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}. {table}", i + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anhelados.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE maquinas (
                ID_Maquina INTEGER PRIMARY KEY,
                Tipo TEXT,
                Capacidad INTEGER,
                Consumo_Energetico REAL
            );
            CREATE TABLE registro_energetico (
                ID_Registro INTEGER PRIMARY KEY,
                ID_Maquina INTEGER REFERENCES maquinas (ID_Maquina),
                Fecha TEXT,
                Consumo REAL
            );
            CREATE TABLE notas (texto);
            "#,
        )
        .unwrap();
        (dir, Store::new(path))
    }

    #[test]
    fn lists_tables_alphabetically() {
        let (_dir, store) = store();
        let schema = store.schema().unwrap();
        let names: Vec<_> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["maquinas", "notas", "registro_energetico"]);
    }

    #[test]
    fn reads_columns_and_keys() {
        let (_dir, store) = store();
        let schema = store.schema().unwrap();

        let maquinas = schema.table("maquinas").unwrap();
        assert_eq!(maquinas.columns.len(), 4);
        assert!(maquinas.columns[0].primary_key);
        assert_eq!(maquinas.columns[3].declared_type, "REAL");
        assert!(maquinas.references.is_empty());

        let registro = schema.table("registro_energetico").unwrap();
        assert_eq!(
            registro.references,
            vec![Reference {
                column: "ID_Maquina".into(),
                table: "maquinas".into(),
                target: Some("ID_Maquina".into()),
            }]
        );
    }

    #[test]
    fn renders_numbered_lines() {
        let (_dir, store) = store();
        let rendered = store.schema().unwrap().to_string();
        let lines: Vec<_> = rendered.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "1. maquinas: ID_Maquina (INTEGER), Tipo (TEXT), Capacidad (INTEGER), Consumo_Energetico (REAL)"
        );
        assert_eq!(lines[1], "2. notas: texto");
        assert!(lines[2].ends_with(", Referencia: maquinas (ID_Maquina)"));
    }
}
