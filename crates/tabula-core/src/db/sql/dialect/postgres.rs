use crate::{
    db::sql::dialect::{Dialect, Placeholders, varchar},
    model::{ColumnModel, SizeClass, SqlType},
};

///
/// PostgresDialect
///
/// Double-quoted identifiers, `SERIAL` keys and positional `$n`
/// placeholders.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholders(&self) -> Placeholders {
        Placeholders::Positional('$')
    }

    fn column_type(&self, ty: SqlType, size: SizeClass) -> String {
        match ty {
            SqlType::SmallInt => "smallint".to_string(),
            SqlType::Int => "integer".to_string(),
            SqlType::BigInt => "bigint".to_string(),
            SqlType::Float => "double precision".to_string(),
            SqlType::Bool => "boolean".to_string(),
            SqlType::Date => "date".to_string(),
            SqlType::DateTime => "timestamp".to_string(),
            SqlType::Text => match size {
                SizeClass::Text | SizeClass::MediumText | SizeClass::LongText => {
                    "text".to_string()
                }
                bounded => varchar(bounded),
            },
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    fn auto_increment_key(&self, column: &ColumnModel) -> String {
        let serial = match column.sql_type() {
            Some(SqlType::SmallInt) => "SMALLSERIAL",
            Some(SqlType::Int) => "SERIAL",
            _ => "BIGSERIAL",
        };
        format!("{serial} PRIMARY KEY NOT NULL")
    }

    fn table_exists(&self, param: &str) -> String {
        format!(
            "SELECT COUNT(*) AS nb FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = {param}"
        )
    }
}
