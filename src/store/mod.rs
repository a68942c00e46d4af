//! Query capability over SQLite key-value stores (`state.vscdb`).
//!
//! Readers only ever see [`StoreQuery`]; whether rows come from an embedded
//! engine or from the `sqlite3` executable is decided by the caller.

use crate::error::StoreError;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One result row: column name to value, in select order.
pub type Row = serde_json::Map<String, Value>;

pub trait StoreQuery {
    /// Run a read-only `statement` against the store at `store`.
    fn query(&self, store: &Path, statement: &str) -> Result<Vec<Row>, StoreError>;

    /// Whether the capability can run at all on this machine.
    fn is_available(&self) -> bool {
        true
    }
}

/// Which [`StoreQuery`] implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Embedded,
    Sqlite3Cli,
}

impl StoreBackend {
    pub fn into_query(self) -> Box<dyn StoreQuery> {
        match self {
            StoreBackend::Embedded => Box::new(EmbeddedSqlite),
            StoreBackend::Sqlite3Cli => Box::new(Sqlite3Cli::locate()),
        }
    }
}

/// In-process SQLite via rusqlite, opened read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSqlite;

impl StoreQuery for EmbeddedSqlite {
    fn query(&self, store: &Path, statement: &str) -> Result<Vec<Row>, StoreError> {
        if !store.is_file() {
            return Err(StoreError::Missing(store.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            store,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mut stmt = conn.prepare(statement)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            out.push(map);
        }
        Ok(out)
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        // state.vscdb declares `value BLOB` but stores UTF-8 JSON text
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Shells out to `sqlite3 -json`. Keeps the query path free of a linked
/// engine on systems where the CLI is preferred.
#[derive(Debug, Clone, Default)]
pub struct Sqlite3Cli {
    binary: Option<PathBuf>,
}

impl Sqlite3Cli {
    /// Find `sqlite3` on `PATH`. A missing binary is not an error here;
    /// `is_available` reports it and `query` fails with `CliUnavailable`.
    pub fn locate() -> Self {
        Self {
            binary: which::which("sqlite3").ok(),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }
}

impl StoreQuery for Sqlite3Cli {
    fn query(&self, store: &Path, statement: &str) -> Result<Vec<Row>, StoreError> {
        let binary = self.binary.as_ref().ok_or(StoreError::CliUnavailable)?;
        if !store.is_file() {
            return Err(StoreError::Missing(store.to_path_buf()));
        }

        let output = Command::new(binary)
            .arg("-readonly")
            .arg("-json")
            .arg(store)
            .arg(statement)
            .output()
            .map_err(|source| StoreError::CliSpawn {
                path: store.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(StoreError::CliFailed {
                path: store.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_cli_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }
}

/// `sqlite3 -json` prints nothing at all for an empty result set.
fn parse_cli_output(stdout: &str) -> Result<Vec<Row>, StoreError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Column as text. Non-string scalars are rendered as JSON; NULL and missing
/// columns are `None`.
pub fn text_column(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Quote `value` as a SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
