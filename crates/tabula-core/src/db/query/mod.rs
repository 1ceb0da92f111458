//! Query and mutation builders.
//!
//! Each builder is configured fluently and executed once through
//! `run_with_error`, which returns an `Outcome`; `run` collapses that
//! outcome to a bare value. `prepare` compiles a builder into a reusable
//! `Prepared` handle whose variables are rebound on every run.

mod create;
mod delete;
mod exist;
mod links;
mod prepared;
mod select;
mod update;

#[cfg(test)]
mod tests;

pub use create::Create;
pub use delete::{CompiledDelete, Delete};
pub use exist::{CompiledExist, Exist};
pub use prepared::{Compiled, Prepared, PreparedRun};
pub use select::{CompiledQuery, Query};
pub use update::{CompiledUpdate, Update};

use crate::{
    db::{
        predicate::Predicate,
        sql::{SelectShape, Statement, StatementTemplate, emit},
        storage::Storage,
        translate::{TranslateError, Translator},
    },
    error::{ErrorClass, InternalError},
    model::EntityModel,
    value::Value,
};
use thiserror::Error as ThisError;

///
/// QueryError
///

#[derive(Debug, ThisError)]
pub enum QueryError {
    #[error("variable '{name}' is not bound")]
    UnboundVariable { name: String },

    #[error("variable '{name}' cannot take a {found} value")]
    VariableType { name: String, found: &'static str },

    #[error("update requires at least one field")]
    NoFields,

    #[error("primary key '{field}' cannot be updated")]
    PrimaryKeyField { field: String },

    #[error("entity '{model}' did not supply a value for column '{column}'")]
    MissingValue {
        model: &'static str,
        column: &'static str,
    },

    #[error("entity '{model}' has not been stored yet")]
    Unsaved { model: &'static str },
}

impl QueryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::MissingValue { .. } => ErrorClass::InvariantViolation,
            Self::UnboundVariable { .. }
            | Self::VariableType { .. }
            | Self::NoFields
            | Self::PrimaryKeyField { .. }
            | Self::Unsaved { .. } => ErrorClass::Unsupported,
        }
    }
}

/// Value of `column` among an entity's column values.
fn value_of(
    model: &'static EntityModel,
    values: &[(&'static str, Value)],
    column: &'static str,
) -> Result<Value, QueryError> {
    values
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, value)| value.clone())
        .ok_or(QueryError::MissingValue {
            model: model.path,
            column,
        })
}

/// Template selecting the root ids matched by `predicate`.
fn ids_template(
    storage: &Storage,
    model: &'static EntityModel,
    predicate: &Predicate,
) -> Result<StatementTemplate, TranslateError> {
    let mut translator = Translator::new(model);
    let filter = translator.filter(predicate)?;
    let joins = translator.finish();

    Ok(emit::select_ids(
        storage.dialect(),
        model,
        &SelectShape::new(&joins, Some(&filter)),
    ))
}

/// Values of the `key` column of every row a statement returns.
fn read_ids(storage: &Storage, key: &str, statement: &Statement) -> Result<Vec<i64>, InternalError> {
    storage
        .query(statement)?
        .iter()
        .map(|row| row.get::<i64>(key))
        .collect()
}
