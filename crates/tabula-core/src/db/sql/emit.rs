//! Statement emitters.
//!
//! Every function returns a `StatementTemplate`; values only ever reach the
//! SQL text as placeholders allocated by a `ParamWriter`.

use crate::{
    COUNT_COLUMN,
    db::{
        sql::{
            Dialect, ParamWriter, StatementTemplate,
            render::{column_sql, from_clause, where_clause},
        },
        translate::{ColumnRef, JoinGraph, WhereGroup, level_key},
    },
    model::{ColumnKind, ColumnModel, EntityModel, IntermediateModel, OnDelete, SizeClass, SqlType},
    value::Value,
};

/// Longest constraint or index name emitted; the tightest common backend
/// limit.
const MAX_CONSTRAINT_LEN: usize = 63;

///
/// Direction
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

///
/// OrderTerm
///

#[derive(Clone, Debug)]
pub struct OrderTerm {
    pub column: ColumnRef,
    pub direction: Direction,
}

///
/// SelectShape
///
/// Resolved pieces of a select: joins, filter, ordering and paging.
///

#[derive(Clone, Debug)]
pub struct SelectShape<'a> {
    pub joins: &'a JoinGraph,
    pub filter: Option<&'a WhereGroup>,
    pub order: &'a [OrderTerm],
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl<'a> SelectShape<'a> {
    #[must_use]
    pub const fn new(joins: &'a JoinGraph, filter: Option<&'a WhereGroup>) -> Self {
        Self {
            joins,
            filter,
            order: &[],
            limit: None,
            offset: None,
        }
    }
}

/// Select every physical column of every level of `model`.
#[must_use]
pub fn select(
    dialect: &dyn Dialect,
    model: &'static EntityModel,
    shape: &SelectShape<'_>,
) -> StatementTemplate {
    let mut columns = Vec::new();
    for level in model.levels() {
        let key = if level.is_root() {
            String::new()
        } else {
            level_key("", level)
        };
        let alias = shape
            .joins
            .alias_of(&key)
            .unwrap_or(crate::ROOT_ALIAS)
            .to_string();

        for column in level.own_columns() {
            if column.primary && !level.is_root() {
                continue;
            }
            let column_ref = ColumnRef {
                alias: alias.clone(),
                column: column.name,
            };
            columns.push(format!(
                "{} AS {}",
                column_sql(dialect, &column_ref),
                dialect.quote(column.name)
            ));
        }
    }

    let distinct = if shape.joins.has_collection() {
        "DISTINCT "
    } else {
        ""
    };
    finish_select(
        dialect,
        format!("SELECT {distinct}{}", columns.join(", ")),
        shape,
    )
}

/// Select only the root primary key.
#[must_use]
pub fn select_ids(
    dialect: &dyn Dialect,
    model: &'static EntityModel,
    shape: &SelectShape<'_>,
) -> StatementTemplate {
    let root = model.root();
    let id = ColumnRef {
        alias: crate::ROOT_ALIAS.to_string(),
        column: root.primary_key,
    };
    let distinct = if shape.joins.has_collection() {
        "DISTINCT "
    } else {
        ""
    };
    let head = format!(
        "SELECT {distinct}{} AS {}",
        column_sql(dialect, &id),
        dialect.quote(root.primary_key)
    );

    finish_select(dialect, head, shape)
}

fn finish_select(dialect: &dyn Dialect, head: String, shape: &SelectShape<'_>) -> StatementTemplate {
    let mut writer = ParamWriter::new(dialect);
    let mut sql = head;
    sql.push_str(&from_clause(dialect, shape.joins));
    sql.push_str(&where_clause(&mut writer, shape.filter));

    if !shape.order.is_empty() {
        let terms: Vec<String> = shape
            .order
            .iter()
            .map(|term| {
                let direction = match term.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{} {direction}", column_sql(dialect, &term.column))
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
    }

    let limit = shape.limit.map(|n| writer.literal(Value::Int(clamp(n))));
    let offset = shape.offset.map(|n| writer.literal(Value::Int(clamp(n))));
    sql.push_str(&dialect.limit_clause(
        limit.as_deref(),
        offset.as_deref(),
        !shape.order.is_empty(),
    ));

    writer.finish(sql)
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// `SELECT COUNT(*) AS nb ...`; never materializes rows.
#[must_use]
pub fn count(
    dialect: &dyn Dialect,
    model: &'static EntityModel,
    joins: &JoinGraph,
    filter: Option<&WhereGroup>,
) -> StatementTemplate {
    let counted = if joins.has_collection() {
        let id = ColumnRef {
            alias: crate::ROOT_ALIAS.to_string(),
            column: model.root().primary_key,
        };
        format!("DISTINCT {}", column_sql(dialect, &id))
    } else {
        "*".to_string()
    };

    let mut writer = ParamWriter::new(dialect);
    let mut sql = format!("SELECT COUNT({counted}) AS {COUNT_COLUMN}");
    sql.push_str(&from_clause(dialect, joins));
    sql.push_str(&where_clause(&mut writer, filter));

    writer.finish(sql)
}

/// Insert one or more rows into one table. Every row must supply a value
/// for every column; bulk and single inserts differ only in VALUES groups.
#[must_use]
pub fn insert(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[&str],
    rows: &[Vec<Value>],
) -> StatementTemplate {
    let mut writer = ParamWriter::new(dialect);
    let quoted: Vec<String> = columns.iter().map(|c| dialect.quote(c)).collect();

    let groups: Vec<String> = rows
        .iter()
        .map(|row| {
            let placeholders: Vec<String> =
                row.iter().map(|value| writer.literal(value.clone())).collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        dialect.quote(table),
        quoted.join(", "),
        groups.join(", ")
    );

    writer.finish(sql)
}

/// `UPDATE table SET ... WHERE key IN (...)`
#[must_use]
pub fn update(
    dialect: &dyn Dialect,
    table: &str,
    assignments: &[(&str, Value)],
    key: &str,
    ids: &[i64],
) -> StatementTemplate {
    let mut writer = ParamWriter::new(dialect);
    let sets: Vec<String> = assignments
        .iter()
        .map(|(column, value)| {
            let placeholder = writer.literal(value.clone());
            format!("{} = {placeholder}", dialect.quote(column))
        })
        .collect();
    let ids = writer.id_list(ids);

    let sql = format!(
        "UPDATE {} SET {} WHERE {} IN ({ids})",
        dialect.quote(table),
        sets.join(", "),
        dialect.quote(key)
    );

    writer.finish(sql)
}

/// `UPDATE table SET column = NULL WHERE column IN (...)`
#[must_use]
pub fn set_null(dialect: &dyn Dialect, table: &str, column: &str, ids: &[i64]) -> StatementTemplate {
    let mut writer = ParamWriter::new(dialect);
    let ids = writer.id_list(ids);
    let column = dialect.quote(column);
    let sql = format!(
        "UPDATE {} SET {column} = NULL WHERE {column} IN ({ids})",
        dialect.quote(table)
    );

    writer.finish(sql)
}

/// `DELETE FROM table WHERE column IN (...)`
#[must_use]
pub fn delete(dialect: &dyn Dialect, table: &str, column: &str, ids: &[i64]) -> StatementTemplate {
    let mut writer = ParamWriter::new(dialect);
    let ids = writer.id_list(ids);
    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({ids})",
        dialect.quote(table),
        dialect.quote(column)
    );

    writer.finish(sql)
}

/// `SELECT columns FROM table WHERE column IN (...)`
#[must_use]
pub fn select_where_in(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[&str],
    column: &str,
    ids: &[i64],
) -> StatementTemplate {
    let mut writer = ParamWriter::new(dialect);
    let ids = writer.id_list(ids);
    let quoted: Vec<String> = columns.iter().map(|c| dialect.quote(c)).collect();
    let sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({ids})",
        quoted.join(", "),
        dialect.quote(table),
        dialect.quote(column)
    );

    writer.finish(sql)
}

/// Column definition as used by `CREATE TABLE` and `ADD COLUMN`.
#[must_use]
pub fn column_definition(dialect: &dyn Dialect, column: &ColumnModel) -> Option<String> {
    let ty = column.sql_type()?;
    let name = dialect.quote(column.name);

    if column.primary && column.auto_increment {
        return Some(format!("{name} {}", dialect.auto_increment_key(column)));
    }

    let mut out = format!("{name} {}", dialect.column_type(ty, column.size()));
    if column.primary {
        out.push_str(" PRIMARY KEY");
    }
    if !column.nullable {
        out.push_str(" NOT NULL");
    }
    if column.unique && !column.primary {
        out.push_str(" UNIQUE");
    }

    Some(out)
}

/// `CREATE TABLE` for one level, with foreign keys for relations and, on
/// child levels, for the shared primary key.
#[must_use]
pub fn create_table(dialect: &dyn Dialect, level: &'static EntityModel) -> StatementTemplate {
    let mut parts: Vec<String> = level
        .own_columns()
        .filter_map(|column| column_definition(dialect, column))
        .collect();

    if let Some(parent) = level.parent {
        parts.push(foreign_key(
            dialect,
            level.table,
            level.primary_key,
            parent.table,
            parent.primary_key,
            OnDelete::Cascade,
        ));
    }

    for column in level.own_columns() {
        if let ColumnKind::Relation {
            target, on_delete, ..
        } = column.kind
        {
            let target = target.model();
            parts.push(foreign_key(
                dialect,
                level.table,
                column.name,
                target.table,
                target.primary_key,
                on_delete,
            ));
        }
    }

    let sql = format!(
        "CREATE TABLE {} ({})",
        dialect.quote(level.table),
        parts.join(", ")
    );

    ParamWriter::new(dialect).finish(sql)
}

/// `CREATE INDEX` statements for the indexed columns of one level.
#[must_use]
pub fn create_indexes(dialect: &dyn Dialect, level: &'static EntityModel) -> Vec<StatementTemplate> {
    level
        .own_columns()
        .filter(|column| column.indexed && !column.primary)
        .map(|column| {
            let sql = dialect.create_index(level.table, column.name, column.unique);
            ParamWriter::new(dialect).finish(sql)
        })
        .collect()
}

/// Join table of a multi-valued relation. Rows disappear with either side.
#[must_use]
pub fn create_intermediate_table(dialect: &dyn Dialect, link: &IntermediateModel) -> StatementTemplate {
    let key_type = dialect.column_type(SqlType::BigInt, SizeClass::MaxVarChar);
    let owner = dialect.quote(&link.owner_column);
    let target = dialect.quote(&link.target_column);

    let parts = [
        format!("{owner} {key_type} NOT NULL"),
        format!("{target} {key_type} NOT NULL"),
        format!("PRIMARY KEY ({owner}, {target})"),
        foreign_key(
            dialect,
            link.table,
            &link.owner_column,
            link.owner.table,
            link.owner.primary_key,
            OnDelete::Cascade,
        ),
        foreign_key(
            dialect,
            link.table,
            &link.target_column,
            link.target.table,
            link.target.primary_key,
            OnDelete::Cascade,
        ),
    ];
    let sql = format!(
        "CREATE TABLE {} ({})",
        dialect.quote(link.table),
        parts.join(", ")
    );

    ParamWriter::new(dialect).finish(sql)
}

/// Probe for a table; the table name is a bound parameter.
#[must_use]
pub fn table_exists(dialect: &dyn Dialect, table: &str) -> StatementTemplate {
    let mut writer = ParamWriter::new(dialect);
    let placeholder = writer.literal(Value::Text(table.to_string()));
    let sql = dialect.table_exists(&placeholder);

    writer.finish(sql)
}

/// Wrap a fixed DDL string (no parameters) as a template.
#[must_use]
pub fn ddl(dialect: &dyn Dialect, sql: String) -> StatementTemplate {
    ParamWriter::new(dialect).finish(sql)
}

fn foreign_key(
    dialect: &dyn Dialect,
    table: &str,
    column: &str,
    target_table: &str,
    target_column: &str,
    on_delete: OnDelete,
) -> String {
    let name = constraint_name(&format!("FK_{column}_{table}_{target_table}"));
    let mut out = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        dialect.quote(&name),
        dialect.quote(column),
        dialect.quote(target_table),
        dialect.quote(target_column)
    );
    if on_delete != OnDelete::NoAction {
        out.push_str(" ON DELETE ");
        out.push_str(on_delete.sql());
    }

    out
}

fn constraint_name(name: &str) -> String {
    name.chars().take(MAX_CONSTRAINT_LEN).collect()
}
