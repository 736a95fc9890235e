use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad category of a SQL statement, decided from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// `SELECT`, `VALUES`, `EXPLAIN`, or a `WITH` query without DML.
    Read,
    /// `INSERT`, `UPDATE`, `DELETE`, `REPLACE`.
    Write,
    /// `CREATE`, `DROP`, `ALTER`, `REINDEX`, `VACUUM`.
    Schema,
    /// Anything else (`PRAGMA`, `ATTACH`, transaction control, empty input).
    Other,
}

impl StatementKind {
    pub const ALL: [StatementKind; 4] = [Self::Read, Self::Write, Self::Schema, Self::Other];

    /// Classify a statement without parsing it.
    ///
    /// Comments, string literals and quoted identifiers are skipped, so
    /// `SELECT 'delete'` is still a read.
    pub fn classify(sql: &str) -> Self {
        let mut words = Words {
            sql,
            pos: 0,
            depth: 0,
        };
        let Some(first) = words.next() else {
            return Self::Other;
        };

        match first.text.to_ascii_uppercase().as_str() {
            "SELECT" | "VALUES" | "EXPLAIN" => Self::Read,
            // Only the statement after the CTE list decides; keywords inside
            // the CTE bodies and function calls such as `replace(...)` don't.
            "WITH" => {
                if words.any(|w| w.depth == 0 && !w.call && is_dml(w.text)) {
                    Self::Write
                } else {
                    Self::Read
                }
            }
            "CREATE" | "DROP" | "ALTER" | "REINDEX" | "VACUUM" => Self::Schema,
            keyword if is_dml(keyword) => Self::Write,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Schema => "schema",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

fn is_dml(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE"
    )
}

/// A bare keyword or identifier.
struct Word<'a> {
    text: &'a str,
    /// Parenthesis nesting level the word appears at.
    depth: usize,
    /// Directly followed by `(`, i.e. a function call.
    call: bool,
}

/// Bare keywords and identifiers of a statement, in order.
struct Words<'a> {
    sql: &'a str,
    pos: usize,
    depth: usize,
}

impl Words<'_> {
    fn skip_past(&mut self, terminator: &str) {
        match self.sql[self.pos..].find(terminator) {
            Some(i) => self.pos += i + terminator.len(),
            None => self.pos = self.sql.len(),
        }
    }

    fn skip_quoted(&mut self, quote: u8) {
        let bytes = self.sql.as_bytes();
        self.pos += 1;
        while self.pos < bytes.len() {
            if bytes[self.pos] == quote {
                // A doubled quote is an escaped quote character.
                if bytes.get(self.pos + 1) == Some(&quote) {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                return;
            }
            self.pos += 1;
        }
    }
}

impl<'a> Iterator for Words<'a> {
    type Item = Word<'a>;

    fn next(&mut self) -> Option<Word<'a>> {
        let bytes = self.sql.as_bytes();
        while self.pos < bytes.len() {
            let byte = bytes[self.pos];
            let following = bytes.get(self.pos + 1).copied();
            match byte {
                b'-' if following == Some(b'-') => self.skip_past("\n"),
                b'/' if following == Some(b'*') => {
                    self.pos += 2;
                    self.skip_past("*/");
                }
                b'\'' | b'"' | b'`' => self.skip_quoted(byte),
                b'[' => self.skip_past("]"),
                b'(' => {
                    self.depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.pos += 1;
                }
                b if b.is_ascii_alphabetic() || b == b'_' => {
                    let start = self.pos;
                    while self.pos < bytes.len()
                        && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_')
                    {
                        self.pos += 1;
                    }
                    let call = bytes[self.pos..]
                        .iter()
                        .find(|b| !b.is_ascii_whitespace())
                        == Some(&b'(');
                    return Some(Word {
                        text: &self.sql[start..self.pos],
                        depth: self.depth,
                        call,
                    });
                }
                b if b.is_ascii_digit() => {
                    while self.pos < bytes.len()
                        && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'.')
                    {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        None
    }
}
