//! Type registry: inheritance pyramid, per-type managers and storages.

use crate::{
    db::{dispatch::EntityVTable, manager::DataManager, storage::Storage},
    error::ErrorClass,
    model::{EntityModel, Pyramid, PyramidId},
    obs::TARGET_REGISTRY,
    traits::Entity,
};
use parking_lot::RwLock;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};
use thiserror::Error as ThisError;

/// Type-erased `DataManager<E>`.
pub type AnyManager = Arc<dyn Any + Send + Sync>;

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("type '{path}' is already registered")]
    AlreadyRegistered { path: String },

    #[error("type '{path}' extends '{parent}', which is not registered")]
    ParentNotRegistered { path: String, parent: String },

    #[error("type '{path}' must share the storage of its parent '{parent}'")]
    StorageMismatch { path: String, parent: String },

    #[error("type '{path}' is not registered")]
    NotRegistered { path: String },

    #[error("registry is full ({len} types)")]
    Capacity { len: usize },

    #[error("a global database is already installed")]
    AlreadyInstalled,

    #[error("no global database is installed")]
    NotInstalled,
}

impl RegistryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyRegistered { .. } | Self::AlreadyInstalled => ErrorClass::Conflict,
            Self::ParentNotRegistered { .. } | Self::StorageMismatch { .. } => {
                ErrorClass::InvariantViolation
            }
            Self::NotRegistered { .. } | Self::NotInstalled => ErrorClass::NotFound,
            Self::Capacity { .. } => ErrorClass::Internal,
        }
    }
}

///
/// TypeRecord
///
/// Everything the registry knows about one registered type.
///

#[derive(Clone)]
pub struct TypeRecord {
    pub node: PyramidId,
    pub model: &'static EntityModel,
    pub storage: Arc<Storage>,
    pub manager: AnyManager,
    pub vtable: EntityVTable,
}

#[derive(Default)]
struct RegistryState {
    pyramid: Pyramid,
    types: HashMap<TypeId, TypeRecord>,
    by_path: HashMap<&'static str, TypeId>,
    storages: Vec<Arc<Storage>>,
}

///
/// Registry
///
/// Explicit, lock-guarded replacement for ambient type maps. Tests build
/// their own; a process can install one through `global`.
///

#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `E` on `storage`. Parents must be registered first and on
    /// the same storage.
    pub fn register<E: Entity>(&self, storage: &Arc<Storage>) -> Result<PyramidId, RegistryError> {
        self.register_as::<E>(storage, None)
    }

    /// Register `E` and make `alias` resolve to it wherever a type path is
    /// accepted.
    pub fn register_aliased<E: Entity>(
        &self,
        storage: &Arc<Storage>,
        alias: &'static str,
    ) -> Result<PyramidId, RegistryError> {
        self.register_as::<E>(storage, Some(alias))
    }

    fn register_as<E: Entity>(
        &self,
        storage: &Arc<Storage>,
        alias: Option<&'static str>,
    ) -> Result<PyramidId, RegistryError> {
        let mut state = self.state.write();
        let model = E::MODEL;

        if let Some(parent) = model.parent
            && let Some(parent_record) = state
                .by_path
                .get(parent.path)
                .and_then(|id| state.types.get(id))
            && !Arc::ptr_eq(&parent_record.storage, storage)
        {
            return Err(RegistryError::StorageMismatch {
                path: model.path.to_string(),
                parent: parent.path.to_string(),
            });
        }

        let node = state.pyramid.insert(model, alias)?;
        storage.add_model(model);

        let manager: AnyManager = Arc::new(DataManager::<E>::new(Arc::clone(storage)));
        state.types.insert(
            TypeId::of::<E>(),
            TypeRecord {
                node,
                model,
                storage: Arc::clone(storage),
                manager,
                vtable: EntityVTable::of::<E>(),
            },
        );
        state.by_path.insert(model.path, TypeId::of::<E>());
        if let Some(alias) = alias {
            state.by_path.insert(alias, TypeId::of::<E>());
        }
        if !state.storages.iter().any(|s| Arc::ptr_eq(s, storage)) {
            state.storages.push(Arc::clone(storage));
        }

        tracing::debug!(target: TARGET_REGISTRY, path = model.path, alias, table = model.table, "registered");

        Ok(node)
    }

    pub fn manager<E: Entity>(&self) -> Result<Arc<DataManager<E>>, RegistryError> {
        let record = self.record(TypeId::of::<E>()).ok_or_else(|| not_registered(E::MODEL.path))?;

        record
            .manager
            .downcast::<DataManager<E>>()
            .map_err(|_| not_registered(E::MODEL.path))
    }

    #[must_use]
    pub fn record(&self, type_id: TypeId) -> Option<TypeRecord> {
        self.state.read().types.get(&type_id).cloned()
    }

    /// Type registered under `path` or under its alias.
    pub fn type_id_of(&self, path: &str) -> Result<TypeId, RegistryError> {
        self.state
            .read()
            .by_path
            .get(path)
            .copied()
            .ok_or_else(|| not_registered(path))
    }

    #[must_use]
    pub fn is_registered(&self, path: &str) -> bool {
        self.state.read().by_path.contains_key(path)
    }

    pub fn storage_of(&self, path: &str) -> Result<Arc<Storage>, RegistryError> {
        let state = self.state.read();
        state
            .by_path
            .get(path)
            .and_then(|id| state.types.get(id))
            .map(|record| Arc::clone(&record.storage))
            .ok_or_else(|| not_registered(path))
    }

    /// Distinct storages in registration order.
    #[must_use]
    pub fn storages(&self) -> Vec<Arc<Storage>> {
        self.state.read().storages.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every type and storage.
    pub fn clear(&self) {
        *self.state.write() = RegistryState::default();
        tracing::debug!(target: TARGET_REGISTRY, "cleared");
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("types", &state.by_path.keys().collect::<Vec<_>>())
            .field("storages", &state.storages.len())
            .finish()
    }
}

fn not_registered(path: &str) -> RegistryError {
    RegistryError::NotRegistered {
        path: path.to_string(),
    }
}
