use crate::{
    db::{
        sql::{Dialect, SqliteDialect, Statement},
        storage::{StorageError, StorageProvider},
    },
    value::{DATE_FORMAT, DATETIME_FORMAT, Row, Value},
};
use parking_lot::Mutex;
use rusqlite::{
    Connection, ToSql,
    types::{Value as SqlValue, ValueRef},
};
use std::path::Path;

///
/// SqliteProvider
///
/// One SQLite connection behind a mutex. Foreign keys are enforced.
///

pub struct SqliteProvider {
    conn: Mutex<Connection>,
    name: String,
    dialect: SqliteDialect,
}

impl SqliteProvider {
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Connect {
            database: ":memory:".to_string(),
            message: e.to_string(),
        })?;

        Self::from_connection(conn, "main")
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StorageError::Connect {
            database: path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .map_or_else(|| "main".to_string(), |s| s.to_string_lossy().into_owned());

        Self::from_connection(conn, &name)
    }

    fn from_connection(conn: Connection, name: &str) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self {
            conn: Mutex::new(conn),
            name: name.to_string(),
            dialect: SqliteDialect,
        })
    }
}

impl StorageProvider for SqliteProvider {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn database_name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute_batch("SELECT 1;")
            .map_err(|e| StorageError::Connect {
                database: self.name.clone(),
                message: e.to_string(),
            })
    }

    fn execute(&self, statement: &Statement) -> Result<u64, StorageError> {
        let params = to_sql_values(statement)?;
        let named = named_params(statement, &params);

        let conn = self.conn.lock();
        let mut stmt = prepare(&conn, statement)?;
        let affected = stmt.execute(&named[..])?;

        Ok(affected as u64)
    }

    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StorageError> {
        let params = to_sql_values(statement)?;
        let named = named_params(statement, &params);

        let conn = self.conn.lock();
        let mut stmt = prepare(&conn, statement)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| (*s).to_string()).collect();

        let mut rows = stmt.query(&named[..])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut decoded = Row::default();
            for (i, name) in names.iter().enumerate() {
                decoded.push(name.clone(), from_sql_value(row.get_ref(i)?));
            }
            out.push(decoded);
        }

        Ok(out)
    }

    fn insert(&self, statement: &Statement) -> Result<i64, StorageError> {
        let params = to_sql_values(statement)?;
        let named = named_params(statement, &params);

        let conn = self.conn.lock();
        let mut stmt = prepare(&conn, statement)?;
        stmt.execute(&named[..])?;

        Ok(conn.last_insert_rowid())
    }

    fn begin(&self) -> Result<(), StorageError> {
        Ok(self.conn.lock().execute_batch("BEGIN")?)
    }

    fn commit(&self) -> Result<(), StorageError> {
        Ok(self.conn.lock().execute_batch("COMMIT")?)
    }

    fn rollback(&self) -> Result<(), StorageError> {
        Ok(self.conn.lock().execute_batch("ROLLBACK")?)
    }
}

fn prepare<'c>(
    conn: &'c Connection,
    statement: &Statement,
) -> Result<rusqlite::Statement<'c>, StorageError> {
    conn.prepare(&statement.sql)
        .map_err(|e| StorageError::Execution {
            sql: statement.sql.clone(),
            message: e.to_string(),
        })
}

fn to_sql_values(statement: &Statement) -> Result<Vec<SqlValue>, StorageError> {
    statement
        .params
        .iter()
        .map(|param| to_sql_value(&param.value))
        .collect()
}

fn named_params<'a>(statement: &'a Statement, values: &'a [SqlValue]) -> Vec<(&'a str, &'a dyn ToSql)> {
    statement
        .params
        .iter()
        .zip(values)
        .map(|(param, value)| (param.placeholder.as_str(), value as &dyn ToSql))
        .collect()
}

fn to_sql_value(value: &Value) -> Result<SqlValue, StorageError> {
    let out = match value {
        Value::Null => SqlValue::Null,
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Date(v) => SqlValue::Text(v.format(DATE_FORMAT).to_string()),
        Value::DateTime(v) => SqlValue::Text(v.format(DATETIME_FORMAT).to_string()),
        Value::List(_) => return Err(StorageError::UnsupportedValue { kind: "list" }),
    };

    Ok(out)
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
