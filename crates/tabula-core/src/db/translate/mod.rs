//! Predicate translation.
//!
//! Resolves dotted member paths against a model into aliased column
//! references, building the join graph on the way, and lowers a `Predicate`
//! into a `WhereGroup` tree the dialect emitters render. A path that cannot
//! be resolved fails the whole translation.

mod join;


use crate::{
    db::predicate::{Coercion, CompareOp, ComparePredicate, Operand, Predicate},
    error::ErrorClass,
    model::{ColumnKind, ColumnModel, EntityModel},
    value::Value,
};
use thiserror::Error as ThisError;

pub use join::{JoinGraph, JoinKind, JoinNode, JoinOn};
pub(crate) use join::level_key;
use join::hop_key;

///
/// TranslateError
///

#[derive(Debug, ThisError)]
pub enum TranslateError {
    #[error("unknown field '{field}' on '{model}'")]
    UnknownField { model: &'static str, field: String },

    #[error("field '{field}' on '{model}' is not a relation")]
    NotARelation { model: &'static str, field: String },

    #[error("multi-valued relation '{field}' cannot be compared directly")]
    CollectionComparison { field: String },

    #[error("invalid operand for '{field}': {reason}")]
    InvalidOperand { field: String, reason: &'static str },

    #[error("'{model}' has no relation to '{target}'")]
    NoReverseRelation {
        model: &'static str,
        target: &'static str,
    },

    #[error("'{model}' relates to '{target}' through several members ({members}); name one")]
    AmbiguousReverseRelation {
        model: &'static str,
        target: &'static str,
        members: String,
    },
}

impl TranslateError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownField { .. } | Self::NoReverseRelation { .. } => ErrorClass::NotFound,
            _ => ErrorClass::Unsupported,
        }
    }

    fn invalid(field: &str, reason: &'static str) -> Self {
        Self::InvalidOperand {
            field: field.to_string(),
            reason,
        }
    }
}

///
/// ColumnRef
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnRef {
    pub alias: String,
    pub column: &'static str,
}

///
/// WhereLeaf
///

#[derive(Clone, Debug, PartialEq)]
pub struct WhereLeaf {
    pub column: ColumnRef,
    pub op: CompareOp,
    pub operand: Operand,
    /// Substitute for NULL on the column side (`COALESCE(col, default)`).
    pub coalesce: Option<Value>,
    pub casefold: bool,
}

///
/// WhereGroup
///
/// Column-level filter tree. Leaves reference resolved aliases only.
///

#[derive(Clone, Debug, PartialEq)]
pub enum WhereGroup {
    Const(bool),
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Leaf(WhereLeaf),
    Null { column: ColumnRef, negated: bool },
}

impl WhereGroup {
    /// Leaves in render order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&WhereLeaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a WhereLeaf>) {
        match self {
            Self::And(groups) | Self::Or(groups) => {
                for group in groups {
                    group.collect_leaves(out);
                }
            }
            Self::Not(inner) => inner.collect_leaves(out),
            Self::Leaf(leaf) => out.push(leaf),
            Self::Const(_) | Self::Null { .. } => {}
        }
    }
}

///
/// Translation
///

#[derive(Clone, Debug)]
pub struct Translation {
    pub filter: WhereGroup,
    pub joins: JoinGraph,
}

/// Translate one predicate against `model`.
pub fn translate(
    model: &'static EntityModel,
    predicate: &Predicate,
) -> Result<Translation, TranslateError> {
    let mut translator = Translator::new(model);
    let filter = translator.filter(predicate)?;

    Ok(Translation {
        filter,
        joins: translator.finish(),
    })
}

/// The single-valued relation through which `model` references `target`.
/// Fails when there is none or more than one.
pub fn reverse_relation(
    model: &'static EntityModel,
    target: &'static EntityModel,
) -> Result<&'static ColumnModel, TranslateError> {
    let members: Vec<&'static ColumnModel> = model
        .related_members(target)
        .into_iter()
        .map(|(_, column)| column)
        .filter(|column| column.is_physical())
        .collect();

    match members.as_slice() {
        [single] => Ok(single),
        [] => Err(TranslateError::NoReverseRelation {
            model: model.path,
            target: target.path,
        }),
        many => Err(TranslateError::AmbiguousReverseRelation {
            model: model.path,
            target: target.path,
            members: many.iter().map(|c| c.field_name()).collect::<Vec<_>>().join(", "),
        }),
    }
}

///
/// Translator
///
/// Stateful resolver shared by filters, ordering and projection so every
/// clause of one statement draws aliases from the same join graph.
///

pub struct Translator {
    model: &'static EntityModel,
    joins: JoinGraph,
}

impl Translator {
    #[must_use]
    pub fn new(model: &'static EntityModel) -> Self {
        Self {
            model,
            joins: JoinGraph::for_model(model),
        }
    }

    #[must_use]
    pub const fn joins(&self) -> &JoinGraph {
        &self.joins
    }

    #[must_use]
    pub fn finish(self) -> JoinGraph {
        self.joins
    }

    pub fn filter(&mut self, predicate: &Predicate) -> Result<WhereGroup, TranslateError> {
        let group = match predicate {
            Predicate::True => WhereGroup::Const(true),
            Predicate::False => WhereGroup::Const(false),
            Predicate::And(preds) if preds.is_empty() => WhereGroup::Const(true),
            Predicate::Or(preds) if preds.is_empty() => WhereGroup::Const(false),
            Predicate::And(preds) => WhereGroup::And(self.filter_all(preds)?),
            Predicate::Or(preds) => WhereGroup::Or(self.filter_all(preds)?),
            Predicate::Not(inner) => WhereGroup::Not(Box::new(self.filter(inner)?)),
            Predicate::IsNull { field } => WhereGroup::Null {
                column: self.column(field)?.0,
                negated: false,
            },
            Predicate::IsNotNull { field } => WhereGroup::Null {
                column: self.column(field)?.0,
                negated: true,
            },
            Predicate::Compare(cmp) => self.compare(cmp)?,
        };

        Ok(group)
    }

    fn filter_all(&mut self, preds: &[Predicate]) -> Result<Vec<WhereGroup>, TranslateError> {
        preds.iter().map(|p| self.filter(p)).collect()
    }

    fn compare(&mut self, cmp: &ComparePredicate) -> Result<WhereGroup, TranslateError> {
        let field = cmp.field.as_str();
        let (column_ref, column) = self.column(field)?;
        let ty = column
            .sql_type()
            .ok_or_else(|| TranslateError::CollectionComparison {
                field: field.to_string(),
            })?;

        match (&cmp.operand, cmp.op) {
            (Operand::Literal(Value::Null), CompareOp::Eq) => {
                return Ok(WhereGroup::Null {
                    column: column_ref,
                    negated: false,
                });
            }
            (Operand::Literal(Value::Null), CompareOp::Ne) => {
                return Ok(WhereGroup::Null {
                    column: column_ref,
                    negated: true,
                });
            }
            (Operand::Literal(Value::Null), _) => {
                return Err(TranslateError::invalid(
                    field,
                    "null only compares with eq or ne",
                ));
            }
            (Operand::Literal(Value::List(items)), op) if op.is_membership() => {
                if items.is_empty() {
                    return Ok(WhereGroup::Const(op == CompareOp::NotIn));
                }
                if items.iter().any(|v| v.is_null() || v.is_list()) {
                    return Err(TranslateError::invalid(
                        field,
                        "membership lists hold scalar values",
                    ));
                }
            }
            (Operand::Variable(_), op) if op.is_membership() => {}
            (_, op) if op.is_membership() => {
                return Err(TranslateError::invalid(field, "membership requires a list"));
            }
            (Operand::Literal(Value::List(_)), _) => {
                return Err(TranslateError::invalid(
                    field,
                    "list operands require in or not_in",
                ));
            }
            (operand, op) if op.is_pattern() => {
                if !ty.is_text() {
                    return Err(TranslateError::invalid(
                        field,
                        "pattern operators require a text column",
                    ));
                }
                if matches!(operand, Operand::Literal(v) if !v.is_text()) {
                    return Err(TranslateError::invalid(
                        field,
                        "pattern operators require a text operand",
                    ));
                }
            }
            _ => {}
        }

        let casefold = cmp.coercion == Coercion::TextCasefold;
        if casefold && !ty.is_text() {
            return Err(TranslateError::invalid(
                field,
                "case-insensitive comparison requires a text column",
            ));
        }

        let coalesce = if column.nullable
            && !casefold
            && matches!(cmp.operand, Operand::Literal(_))
            && (cmp.op.is_ordering() || matches!(cmp.op, CompareOp::Eq | CompareOp::Ne))
        {
            ty.coalesce_default()
        } else {
            None
        };

        Ok(WhereGroup::Leaf(WhereLeaf {
            column: column_ref,
            op: cmp.op,
            operand: cmp.operand.clone(),
            coalesce,
            casefold,
        }))
    }

    /// Resolve a dotted member path to an aliased column, joining every
    /// relation hop along the way.
    pub fn column(
        &mut self,
        path: &str,
    ) -> Result<(ColumnRef, &'static ColumnModel), TranslateError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut key = String::new();
        let mut model = self.model;

        for (i, segment) in segments.iter().enumerate() {
            let (level, column) =
                model
                    .find_column(segment)
                    .ok_or_else(|| TranslateError::UnknownField {
                        model: model.path,
                        field: path.to_string(),
                    })?;
            let level_alias = self.level_alias(&key, model, level);

            if i + 1 == segments.len() {
                if !column.is_physical() {
                    return Err(TranslateError::CollectionComparison {
                        field: path.to_string(),
                    });
                }
                let column_ref = ColumnRef {
                    alias: level_alias,
                    column: column.name,
                };
                return Ok((column_ref, column));
            }

            match column.kind {
                ColumnKind::Relation { field, target, .. } => {
                    let target = target.model();
                    let target_root = target.root();
                    let next_key = hop_key(&key, field);
                    self.joins.ensure(
                        &next_key,
                        target_root.table,
                        JoinKind::LeftOuter,
                        &level_alias,
                        column.name,
                        target_root.primary_key,
                    );
                    key = next_key;
                    model = target;
                }
                ColumnKind::Many { target, .. } => {
                    let link = model.intermediate(segment).ok_or_else(|| {
                        TranslateError::NotARelation {
                            model: model.path,
                            field: (*segment).to_string(),
                        }
                    })?;
                    let target = target.model();
                    let target_root = target.root();
                    let next_key = hop_key(&key, column.name);
                    let link_alias = self.joins.ensure(
                        &format!("{next_key}#link"),
                        link.table,
                        JoinKind::LeftOuter,
                        &level_alias,
                        level.primary_key,
                        &link.owner_column,
                    );
                    self.joins.ensure(
                        &next_key,
                        target_root.table,
                        JoinKind::LeftOuter,
                        &link_alias,
                        &link.target_column,
                        target_root.primary_key,
                    );
                    self.joins.mark_collection();
                    key = next_key;
                    model = target;
                }
                ColumnKind::Scalar { .. } => {
                    return Err(TranslateError::NotARelation {
                        model: model.path,
                        field: (*segment).to_string(),
                    });
                }
            }
        }

        Err(TranslateError::UnknownField {
            model: self.model.path,
            field: path.to_string(),
        })
    }

    /// Alias of the table holding `level` for the node reached by `key`.
    fn level_alias(
        &mut self,
        key: &str,
        model: &'static EntityModel,
        level: &'static EntityModel,
    ) -> String {
        let root = model.root();
        let node_alias = self
            .joins
            .alias_of(key)
            .unwrap_or(crate::ROOT_ALIAS)
            .to_string();
        if level.same(root) {
            return node_alias;
        }

        let kind = if key.is_empty() {
            JoinKind::Inner
        } else {
            JoinKind::LeftOuter
        };
        self.joins.ensure(
            &level_key(key, level),
            level.table,
            kind,
            &node_alias,
            root.primary_key,
            level.primary_key,
        )
    }
}
