//! SQLite driver backed by `rusqlite`.

use super::{Connection, ConnectionFactory, config::ConnectionConfig};
use crate::core::{ColumnMeta, OrmError, Result, Value, ValueType};
use crate::result::ResultSet;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::params_from_iter;

/// Opens SQLite connections on `config.database`, a file path or `:memory:`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteFactory;

impl ConnectionFactory for SqliteFactory {
    fn connect(&self, id: u64, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        if !config.driver.eq_ignore_ascii_case("sqlite") {
            return Err(OrmError::Config(format!(
                "SqliteFactory cannot open '{}' connections",
                config.driver
            )));
        }

        let inner = rusqlite::Connection::open(&config.database)
            .map_err(|e| OrmError::Connection(format!("{}: {}", config.database, e)))?;
        inner.busy_timeout(config.connect_timeout)?;

        Ok(Box::new(SqliteConnection::new(id, inner)))
    }
}

/// A single SQLite connection.
///
/// SQLite has no auto-commit switch of its own, so with auto-commit off the
/// first statement opens a transaction with `BEGIN` and it stays open until
/// `commit` or `rollback`.
pub struct SqliteConnection {
    id: u64,
    inner: rusqlite::Connection,
    auto_commit: bool,
}

impl SqliteConnection {
    pub fn new(id: u64, inner: rusqlite::Connection) -> Self {
        Self {
            id,
            inner,
            auto_commit: true,
        }
    }

    fn in_transaction(&self) -> bool {
        !self.inner.is_autocommit()
    }

    fn ensure_tx(&mut self) -> Result<()> {
        if !self.auto_commit && !self.in_transaction() {
            self.inner.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit && !self.auto_commit {
            self.commit()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.inner.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.inner.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        self.ensure_tx()?;
        tracing::trace!(connection = self.id, sql, "query");

        let mut stmt = self.inner.prepare(sql)?;
        let columns: Vec<ColumnMeta> = stmt
            .columns()
            .iter()
            .map(|col| {
                let meta = ColumnMeta::new(col.name());
                match col.decl_type() {
                    Some(decl) => meta.declared(decl_to_value_type(decl)),
                    None => meta,
                }
            })
            .collect();

        let kinds: Vec<ValueType> = columns
            .iter()
            .map(|col| col.declared_type.unwrap_or(ValueType::Any))
            .collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(kinds.len());
            for (idx, kind) in kinds.iter().enumerate() {
                values.push(decode(row.get_ref(idx)?, *kind));
            }
            rows.push(values);
        }

        Ok(ResultSet::new(columns, rows))
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_tx()?;
        tracing::trace!(connection = self.id, sql, "execute");

        let affected = self.inner.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.ensure_tx()?;
        self.inner.execute_batch(sql)?;
        Ok(())
    }
}

/// Maps a declared column type onto a value kind using SQLite's affinity
/// rules, with extra cases for the types SQLite stores as text.
fn decl_to_value_type(decl: &str) -> ValueType {
    let decl = decl.to_ascii_uppercase();
    if decl.contains("BOOL") {
        ValueType::Bool
    } else if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
        ValueType::Timestamp
    } else if decl.contains("DATE") {
        ValueType::Date
    } else if decl.contains("TIME") {
        ValueType::Time
    } else if decl.contains("JSON") {
        ValueType::Json
    } else if decl.contains("INT") {
        ValueType::I64
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        ValueType::F64
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        ValueType::Text
    } else if decl.contains("BLOB") {
        ValueType::Bytes
    } else {
        ValueType::Any
    }
}

fn decode(cell: ValueRef<'_>, kind: ValueType) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if kind == ValueType::Bool => Value::Boolean(i != 0),
        ValueRef::Integer(i) => Value::BigInt(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        ValueRef::Text(bytes) => {
            // SQLite does not validate TEXT encoding; keep malformed text as raw bytes.
            let text = match std::str::from_utf8(bytes) {
                Ok(s) => Value::Text(s.to_string()),
                Err(_) => return Value::Bytes(bytes.to_vec()),
            };
            let parsed = match kind {
                ValueType::Timestamp => text.as_timestamp().map(Value::Timestamp),
                ValueType::Date => text.as_date().map(Value::Date),
                ValueType::Time => text.as_time().map(Value::Time),
                ValueType::Json => text.as_json().map(Value::Json),
                _ => None,
            };
            parsed.unwrap_or(text)
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        let out = match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::TinyInt(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::SmallInt(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Integer(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::BigInt(v) => ToSqlOutput::Owned(Sql::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(Sql::Real(f64::from(*v))),
            Value::Double(v) => ToSqlOutput::Owned(Sql::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
            Value::Date(_) | Value::Time(_) | Value::Timestamp(_) | Value::Json(_) => {
                ToSqlOutput::Owned(Sql::Text(self.to_string()))
            }
            Value::Array(_) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    "arrays cannot be bound as SQL parameters".into(),
                ));
            }
        };
        Ok(out)
    }
}
