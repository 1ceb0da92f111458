//! Schema migrations.
//!
//! A migration unit declares model and property changes on a
//! [`MigrationPlan`]. Repeated declarations on the same target merge
//! through [`Action::merge`]. The [`MigrationManager`] applies each pending
//! unit once per storage, tracking applied units in a table of that storage.

mod manager;
mod plan;
mod provider;

#[cfg(test)]
mod tests;

pub use manager::MigrationManager;
pub use plan::{Action, MigrationModel, MigrationPlan, MigrationProperty, PropertyOptions};
pub use provider::{MigrationProvider, StorageMigrationProvider};

use crate::error::ErrorClass;
use thiserror::Error as ThisError;

///
/// Migration
///
/// One named unit of schema change. Units run in name order.
///

pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    fn up(&self, plan: &mut MigrationPlan);
}

///
/// MigrationError
///

#[derive(Debug, ThisError)]
pub enum MigrationError {
    #[error(
        "{count} storages are registered; enable migration.multiple_providers to migrate them together"
    )]
    MultipleProvidersNotEnabled { count: usize },

    #[error("migration '{name}' is declared twice")]
    DuplicateName { name: String },

    #[error("migration '{migration}' touches '{path}', which no storage holds")]
    ProviderNotFound { migration: String, path: String },

    #[error("migration '{migration}' was already applied on '{provider}' but not on the others")]
    ProviderRefused { migration: String, provider: String },
}

impl MigrationError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::MultipleProvidersNotEnabled { .. } => ErrorClass::Unsupported,
            Self::DuplicateName { .. } | Self::ProviderRefused { .. } => ErrorClass::Conflict,
            Self::ProviderNotFound { .. } => ErrorClass::NotFound,
        }
    }
}
