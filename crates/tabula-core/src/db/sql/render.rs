use crate::{
    db::{
        predicate::{CompareOp, Operand},
        sql::{Dialect, ParamWriter, PatternKind, SlotSource},
        translate::{ColumnRef, JoinGraph, JoinKind, WhereGroup, WhereLeaf},
    },
    value::Value,
};

pub(crate) fn column_sql(dialect: &dyn Dialect, column: &ColumnRef) -> String {
    format!("{}.{}", column.alias, dialect.quote(column.column))
}

/// ` FROM root t0 [JOIN ...]`
pub(crate) fn from_clause(dialect: &dyn Dialect, joins: &JoinGraph) -> String {
    let root = joins.root();
    let mut out = format!(" FROM {} {}", dialect.quote(root.table), root.alias);

    for node in joins.joins() {
        let Some(on) = &node.on else { continue };
        let keyword = match node.kind {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        };
        out.push_str(&format!(
            " {keyword} {} {} ON {}.{} = {}.{}",
            dialect.quote(node.table),
            node.alias,
            on.left_alias,
            dialect.quote(&on.left_column),
            node.alias,
            dialect.quote(&on.right_column),
        ));
    }

    out
}

/// ` WHERE ...`, or nothing for an always-true filter.
pub(crate) fn where_clause(writer: &mut ParamWriter<'_>, filter: Option<&WhereGroup>) -> String {
    match filter {
        None | Some(WhereGroup::Const(true)) => String::new(),
        Some(group) => format!(" WHERE {}", render_group(writer, group)),
    }
}

pub(crate) fn render_group(writer: &mut ParamWriter<'_>, group: &WhereGroup) -> String {
    match group {
        WhereGroup::Const(true) => "1 = 1".to_string(),
        WhereGroup::Const(false) => "1 = 0".to_string(),
        WhereGroup::And(groups) => join_groups(writer, groups, " AND "),
        WhereGroup::Or(groups) => join_groups(writer, groups, " OR "),
        WhereGroup::Not(inner) => format!("NOT ({})", render_group(writer, inner)),
        WhereGroup::Null { column, negated } => {
            let column = column_sql(writer.dialect(), column);
            if *negated {
                format!("{column} IS NOT NULL")
            } else {
                format!("{column} IS NULL")
            }
        }
        WhereGroup::Leaf(leaf) => render_leaf(writer, leaf),
    }
}

fn join_groups(writer: &mut ParamWriter<'_>, groups: &[WhereGroup], separator: &str) -> String {
    if let [single] = groups {
        return render_group(writer, single);
    }

    let parts: Vec<String> = groups.iter().map(|g| render_group(writer, g)).collect();
    format!("({})", parts.join(separator))
}

fn render_leaf(writer: &mut ParamWriter<'_>, leaf: &WhereLeaf) -> String {
    let dialect = writer.dialect();
    let mut column = column_sql(dialect, &leaf.column);
    if leaf.casefold {
        column = format!("LOWER({column})");
    }
    if let Some(default) = &leaf.coalesce {
        let placeholder = writer.literal(default.clone());
        column = format!("COALESCE({column}, {placeholder})");
    }

    match leaf.op {
        CompareOp::In | CompareOp::NotIn => {
            let keyword = if leaf.op == CompareOp::In {
                "IN"
            } else {
                "NOT IN"
            };
            let list = match &leaf.operand {
                Operand::Literal(Value::List(items)) => items
                    .iter()
                    .map(|item| writer.literal(item.clone()))
                    .collect::<Vec<_>>()
                    .join(", "),
                Operand::Variable(name) => {
                    return writer.push(SlotSource::List {
                        name: name.clone(),
                        column,
                        negated: leaf.op == CompareOp::NotIn,
                    });
                }
                other => operand(writer, other, None),
            };
            format!("{column} {keyword} ({list})")
        }
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            let kind = match leaf.op {
                CompareOp::StartsWith => PatternKind::StartsWith,
                CompareOp::EndsWith => PatternKind::EndsWith,
                _ => PatternKind::Contains,
            };
            let mut rhs = operand(writer, &leaf.operand, Some(kind));
            if leaf.casefold {
                rhs = format!("LOWER({rhs})");
            }
            format!("{column} LIKE {rhs}{}", dialect.like_escape())
        }
        op => {
            let mut rhs = operand(writer, &leaf.operand, None);
            if leaf.casefold {
                rhs = format!("LOWER({rhs})");
            }
            format!("{column} {} {rhs}", symbol(op))
        }
    }
}

fn operand(writer: &mut ParamWriter<'_>, operand: &Operand, pattern: Option<PatternKind>) -> String {
    match operand {
        Operand::Literal(value) => {
            let value = match (pattern, value) {
                (Some(kind), Value::Text(text)) => Value::Text(kind.wrap(text)),
                _ => value.clone(),
            };
            writer.literal(value)
        }
        Operand::Variable(name) => writer.push(SlotSource::Variable {
            name: name.clone(),
            pattern,
        }),
        Operand::Raw(sql) => sql.clone(),
    }
}

const fn symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Lt => "<",
        CompareOp::Lte => "<=",
        CompareOp::Gt => ">",
        CompareOp::Gte => ">=",
        CompareOp::In => "IN",
        CompareOp::NotIn => "NOT IN",
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => "LIKE",
    }
}
