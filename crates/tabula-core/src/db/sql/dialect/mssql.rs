use crate::{
    db::sql::dialect::Dialect,
    model::{ColumnModel, DEFAULT_VARCHAR_LEN, SizeClass, SqlType},
};

///
/// MssqlDialect
///
/// Bracket quoting, `IDENTITY(1,1)` keys and `OFFSET .. FETCH` paging.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn column_type(&self, ty: SqlType, size: SizeClass) -> String {
        match ty {
            SqlType::SmallInt => "smallint".to_string(),
            SqlType::Int => "int".to_string(),
            SqlType::BigInt => "bigint".to_string(),
            SqlType::Float => "float".to_string(),
            SqlType::Bool => "bit".to_string(),
            SqlType::Date => "date".to_string(),
            SqlType::DateTime => "datetime2".to_string(),
            SqlType::Text => match size {
                SizeClass::Bounded(n) => format!("nvarchar({n})"),
                SizeClass::MaxVarChar => format!("nvarchar({DEFAULT_VARCHAR_LEN})"),
                SizeClass::Text | SizeClass::MediumText | SizeClass::LongText => {
                    "nvarchar(max)".to_string()
                }
            },
        }
    }

    fn auto_increment_key(&self, column: &ColumnModel) -> String {
        let ty = column.sql_type().unwrap_or(SqlType::BigInt);
        format!(
            "{} IDENTITY(1,1) PRIMARY KEY NOT NULL",
            self.column_type(ty, column.size())
        )
    }

    // OFFSET .. FETCH is only valid after ORDER BY
    fn limit_clause(&self, limit: Option<&str>, offset: Option<&str>, ordered: bool) -> String {
        if limit.is_none() && offset.is_none() {
            return String::new();
        }

        let mut out = String::new();
        if !ordered {
            out.push_str(" ORDER BY (SELECT NULL)");
        }
        out.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or("0")));
        if let Some(limit) = limit {
            out.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
        }

        out
    }

    fn table_exists(&self, param: &str) -> String {
        format!("SELECT COUNT(*) AS nb FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = {param}")
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        format!("EXEC sp_rename '{from}', '{to}'")
    }

    fn add_column(&self, table: &str, definition: &str) -> String {
        format!("ALTER TABLE {} ADD {definition}", self.quote(table))
    }

    fn rename_column(&self, table: &str, from: &str, to: &str) -> String {
        format!("EXEC sp_rename '{table}.{from}', '{to}', 'COLUMN'")
    }
}
