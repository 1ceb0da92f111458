//! ## Crate layout
//! - `core`: entity models, values, predicates, SQL emitters, builders,
//!   transactions, dispatch and migrations.
//! - `error`: public error type with a stable kind + origin taxonomy.
//! - `session`: `Result`-returning facade over a shared database.
//!
//! The `prelude` module carries the names used when declaring entities and
//! querying them.

pub use tabula_core as core;

pub mod error;
pub mod session;

pub use error::Error;
pub use session::Session;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        core::{
            config::Config,
            db::{
                Database,
                predicate::{FieldRef, Predicate},
                storage::Storage,
            },
            migration::{Migration, MigrationPlan, PropertyOptions},
            model::{ColumnModel, EntityModel, OnDelete, RelationTarget, SizeClass, SqlType},
            outcome::Outcome,
            traits::{Entity, FieldValue as _},
            value::{Row, Value},
        },
        error::Error,
        session::Session,
    };
}
