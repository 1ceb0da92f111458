use crate::{
    db::sql::dialect::{Dialect, varchar},
    model::{ColumnModel, SizeClass, SqlType},
};

///
/// GenericDialect
///
/// MySQL-flavoured SQL: backtick quoting, `AUTO_INCREMENT`, `@name`
/// placeholders.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct GenericDialect;

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn column_type(&self, ty: SqlType, size: SizeClass) -> String {
        match ty {
            SqlType::SmallInt => "smallint".to_string(),
            SqlType::Int => "int".to_string(),
            SqlType::BigInt => "bigint".to_string(),
            SqlType::Float => "float".to_string(),
            SqlType::Bool => "bit".to_string(),
            SqlType::Date => "date".to_string(),
            SqlType::DateTime => "datetime".to_string(),
            SqlType::Text => match size {
                SizeClass::Text => "TEXT".to_string(),
                SizeClass::MediumText => "MEDIUMTEXT".to_string(),
                SizeClass::LongText => "LONGTEXT".to_string(),
                bounded => varchar(bounded),
            },
        }
    }

    fn auto_increment_key(&self, column: &ColumnModel) -> String {
        let ty = column.sql_type().unwrap_or(SqlType::BigInt);
        format!(
            "{} NOT NULL AUTO_INCREMENT PRIMARY KEY",
            self.column_type(ty, column.size())
        )
    }

    // backslash is itself an escape inside MySQL string literals
    fn like_escape(&self) -> &'static str {
        " ESCAPE '\\\\'"
    }

    fn limit_clause(&self, limit: Option<&str>, offset: Option<&str>, _ordered: bool) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, Some(offset)) => format!(" LIMIT 18446744073709551615 OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    fn table_exists(&self, param: &str) -> String {
        format!(
            "SELECT COUNT(*) AS nb FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = {param}"
        )
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        format!("RENAME TABLE {} TO {}", self.quote(from), self.quote(to))
    }
}
