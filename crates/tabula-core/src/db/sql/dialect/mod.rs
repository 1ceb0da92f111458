//! Dialect-specific SQL vocabulary.
//!
//! A `Dialect` only answers questions about spelling: quoting, placeholders,
//! type names, paging and DDL shapes. Statement structure lives in `emit`.

mod generic;
mod mssql;
mod postgres;
mod sqlite;

pub use generic::GenericDialect;
pub use mssql::MssqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::model::{ColumnModel, DEFAULT_VARCHAR_LEN, SizeClass, SqlType};

///
/// Placeholders
///
/// How a dialect spells a parameter: by name or by position.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Placeholders {
    Named(char),
    Positional(char),
}

impl Placeholders {
    #[must_use]
    pub fn render(self, name: &str, position: usize) -> String {
        match self {
            Self::Named(prefix) => format!("{prefix}{name}"),
            Self::Positional(prefix) => format!("{prefix}{position}"),
        }
    }
}

///
/// Dialect
///

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote an identifier, doubling any embedded quote character.
    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholders(&self) -> Placeholders {
        Placeholders::Named('@')
    }

    /// Placeholder text for parameter `name` at 1-based `position`.
    fn placeholder(&self, name: &str, position: usize) -> String {
        self.placeholders().render(name, position)
    }

    fn column_type(&self, ty: SqlType, size: SizeClass) -> String;

    /// Column definition after the name for an auto-increment primary key.
    fn auto_increment_key(&self, column: &ColumnModel) -> String;

    /// `ESCAPE` clause matching the backslash used by `escape_like`.
    fn like_escape(&self) -> &'static str {
        " ESCAPE '\\'"
    }

    /// Boolean literal in DDL defaults.
    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    /// Paging tail. `limit` and `offset` are placeholders.
    fn limit_clause(&self, limit: Option<&str>, offset: Option<&str>, _ordered: bool) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, Some(offset)) => format!(" OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    /// Count statement probing for a table whose name is bound at `param`.
    fn table_exists(&self, param: &str) -> String;

    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote(from),
            self.quote(to)
        )
    }

    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote(table))
    }

    fn add_column(&self, table: &str, definition: &str) -> String {
        format!("ALTER TABLE {} ADD COLUMN {definition}", self.quote(table))
    }

    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote(table),
            self.quote(column)
        )
    }

    fn rename_column(&self, table: &str, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote(table),
            self.quote(from),
            self.quote(to)
        )
    }

    fn create_index(&self, table: &str, column: &str, unique: bool) -> String {
        let unique = if unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            self.quote(&format!("IX_{table}_{column}")),
            self.quote(table),
            self.quote(column)
        )
    }
}

/// Shared text type mapping for dialects with `varchar(n)`.
pub(crate) fn varchar(size: SizeClass) -> String {
    match size {
        SizeClass::Bounded(n) => format!("varchar({n})"),
        _ => format!("varchar({DEFAULT_VARCHAR_LEN})"),
    }
}
