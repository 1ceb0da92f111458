use crate::{
    db::sql::dialect::Dialect,
    model::{ColumnModel, SizeClass, SqlType},
};

///
/// SqliteDialect
///

#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, ty: SqlType, _size: SizeClass) -> String {
        match ty {
            SqlType::SmallInt | SqlType::Int | SqlType::BigInt | SqlType::Bool => {
                "INTEGER".to_string()
            }
            SqlType::Float => "REAL".to_string(),
            SqlType::Date | SqlType::DateTime | SqlType::Text => "TEXT".to_string(),
        }
    }

    // rowid alias; must be spelled exactly INTEGER PRIMARY KEY
    fn auto_increment_key(&self, _column: &ColumnModel) -> String {
        "INTEGER PRIMARY KEY AUTOINCREMENT".to_string()
    }

    fn limit_clause(&self, limit: Option<&str>, offset: Option<&str>, _ordered: bool) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    fn table_exists(&self, param: &str) -> String {
        format!("SELECT COUNT(*) AS nb FROM sqlite_master WHERE type = 'table' AND name = {param}")
    }
}
