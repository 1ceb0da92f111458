//! Core runtime for Tabula: entity models, values, the predicate DSL, SQL
//! emitters, builders, transactions, dispatch and migrations.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod model;
pub mod obs;
pub mod outcome;
pub mod traits;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Alias of the query root in every emitted statement.
pub const ROOT_ALIAS: &str = "t0";

/// Column name used by every count statement.
pub const COUNT_COLUMN: &str = "nb";

///
/// Prelude
///
/// Domain vocabulary only: models, values, predicates and the facade types
/// callers touch on every query.
///

pub mod prelude {
    pub use crate::{
        db::{
            Database,
            predicate::{FieldRef, Predicate},
            storage::Storage,
        },
        model::{ColumnModel, EntityModel},
        outcome::Outcome,
        traits::{Entity, FieldValue},
        value::{Row, Value},
    };
}
