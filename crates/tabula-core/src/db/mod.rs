//! Data access: predicates, SQL emission, storage, transactions, builders,
//! typed managers and the dynamic facade over them.

pub mod dispatch;
pub mod global;
pub mod manager;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod sql;
pub mod storage;
pub mod transaction;
pub mod translate;

use crate::{
    config::Config,
    db::{
        dispatch::{Dispatcher, Operation, Resolved},
        manager::DataManager,
        predicate::Predicate,
        registry::Registry,
        storage::Storage,
    },
    error::InternalError,
    obs,
    outcome::Outcome,
    traits::{BoxedEntity, Entity},
};
use std::{any::TypeId, sync::Arc};

///
/// Database
///
/// Owns the type registry and the dispatch cache. Typed calls go straight
/// to the registered `DataManager<E>`; `dyn_*` calls resolve the manager
/// from a type path or from the concrete type of a boxed entity.
///

#[derive(Debug, Default)]
pub struct Database {
    registry: Registry,
    dispatcher: Dispatcher,
    config: Config,
}

impl Database {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn register<E: Entity>(&self, storage: &Arc<Storage>) -> Result<(), InternalError> {
        self.registry.register::<E>(storage)?;

        Ok(())
    }

    /// Register `E` so dynamic calls also accept `alias` as its path.
    pub fn register_aliased<E: Entity>(
        &self,
        storage: &Arc<Storage>,
        alias: &'static str,
    ) -> Result<(), InternalError> {
        self.registry.register_aliased::<E>(storage, alias)?;

        Ok(())
    }

    pub fn manager<E: Entity>(&self) -> Result<Arc<DataManager<E>>, InternalError> {
        Ok(self.registry.manager::<E>()?)
    }

    pub fn storage<E: Entity>(&self) -> Result<Arc<Storage>, InternalError> {
        Ok(self.registry.storage_of(E::MODEL.path)?)
    }

    /// Create the missing tables of every registered storage. Returns the
    /// tables created.
    pub fn init(&self) -> Result<Vec<String>, InternalError> {
        let mut created = Vec::new();
        for storage in self.registry.storages() {
            storage.connect()?;
            created.extend(storage.create_tables()?);
        }

        Ok(created)
    }

    /// Forget every registration and cached resolution.
    pub fn teardown(&self) {
        self.dispatcher.clear();
        self.registry.clear();
    }

    fn bare<T: Default>(&self, operation: &str, outcome: Outcome<T>) -> T {
        obs::collapse(&self.config.log, operation, outcome)
    }

    fn with_manager<E: Entity, T>(
        &self,
        action: impl FnOnce(&DataManager<E>) -> Outcome<T>,
    ) -> Outcome<T> {
        match self.manager::<E>() {
            Ok(manager) => action(manager.as_ref()),
            Err(err) => Outcome::from_error(err),
        }
    }

    // ------------------------------------------------------------------
    // Typed
    // ------------------------------------------------------------------

    pub fn get_all_with_error<E: Entity>(&self) -> Outcome<Vec<E>> {
        self.with_manager::<E, _>(DataManager::get_all_with_error)
    }

    #[must_use]
    pub fn get_all<E: Entity>(&self) -> Vec<E> {
        self.bare("get_all", self.get_all_with_error::<E>())
    }

    pub fn get_by_id_with_error<E: Entity>(&self, id: i64) -> Outcome<Option<E>> {
        self.with_manager::<E, _>(|m| m.get_by_id_with_error(id))
    }

    #[must_use]
    pub fn get_by_id<E: Entity>(&self, id: i64) -> Option<E> {
        self.bare("get_by_id", self.get_by_id_with_error::<E>(id))
    }

    pub fn get_by_ids_with_error<E: Entity>(&self, ids: &[i64]) -> Outcome<Vec<E>> {
        self.with_manager::<E, _>(|m| m.get_by_ids_with_error(ids))
    }

    #[must_use]
    pub fn get_by_ids<E: Entity>(&self, ids: &[i64]) -> Vec<E> {
        self.bare("get_by_ids", self.get_by_ids_with_error::<E>(ids))
    }

    pub fn filter_with_error<E: Entity>(&self, predicate: Predicate) -> Outcome<Vec<E>> {
        self.with_manager::<E, _>(|m| m.filter_with_error(predicate))
    }

    #[must_use]
    pub fn filter<E: Entity>(&self, predicate: Predicate) -> Vec<E> {
        self.bare("filter", self.filter_with_error::<E>(predicate))
    }

    /// Entities of `E` whose single relation to `T` points at one of `ids`.
    pub fn referencing_with_error<E: Entity, T: Entity>(&self, ids: &[i64]) -> Outcome<Vec<E>> {
        self.with_manager::<E, _>(|m| m.referencing_with_error::<T>(ids))
    }

    #[must_use]
    pub fn referencing<E: Entity, T: Entity>(&self, ids: &[i64]) -> Vec<E> {
        self.bare("referencing", self.referencing_with_error::<E, T>(ids))
    }

    pub fn exist_with_error<E: Entity>(&self, predicate: Predicate) -> Outcome<bool> {
        self.with_manager::<E, _>(|m| m.exist_with_error(predicate))
    }

    #[must_use]
    pub fn exist<E: Entity>(&self, predicate: Predicate) -> bool {
        self.bare("exist", self.exist_with_error::<E>(predicate))
    }

    pub fn create_with_error<E: Entity>(&self, item: E) -> Outcome<E> {
        self.with_manager::<E, _>(|m| m.create_with_error(item))
    }

    #[must_use]
    pub fn create<E: Entity>(&self, item: E) -> Option<E> {
        self.bare("create", self.create_with_error(item).map(Some))
    }

    pub fn bulk_create_with_error<E: Entity>(&self, items: Vec<E>, with_id: bool) -> Outcome<Vec<E>> {
        self.with_manager::<E, _>(|m| m.bulk_create_with_error(items, with_id))
    }

    #[must_use]
    pub fn bulk_create<E: Entity>(&self, items: Vec<E>, with_id: bool) -> Vec<E> {
        self.bare("bulk_create", self.bulk_create_with_error(items, with_id))
    }

    pub fn update_with_error<E: Entity>(&self, item: E, fields: &[&str]) -> Outcome<E> {
        self.with_manager::<E, _>(|m| m.update_with_error(item, fields))
    }

    #[must_use]
    pub fn update<E: Entity>(&self, item: E, fields: &[&str]) -> Option<E> {
        self.bare("update", self.update_with_error(item, fields).map(Some))
    }

    pub fn delete_with_error<E: Entity>(&self, item: E) -> Outcome<E> {
        self.with_manager::<E, _>(|m| m.delete_with_error(item))
    }

    #[must_use]
    pub fn delete<E: Entity>(&self, item: E) -> Option<E> {
        self.bare("delete", self.delete_with_error(item).map(Some))
    }

    /// Run `action` inside a transaction on the storage of `E`.
    pub fn run_inside_transaction<E: Entity, T>(
        &self,
        action: impl FnOnce(&Self) -> Outcome<T>,
    ) -> Outcome<T> {
        match self.storage::<E>() {
            Ok(storage) => storage.run_inside_transaction(|_| action(self)),
            Err(err) => Outcome::from_error(err),
        }
    }

    // ------------------------------------------------------------------
    // Dynamic
    // ------------------------------------------------------------------

    fn resolve_path(&self, operation: Operation, path: &str) -> Result<Resolved, InternalError> {
        let type_id = self.registry.type_id_of(path)?;
        self.resolve(operation, type_id)
    }

    fn resolve(&self, operation: Operation, type_id: TypeId) -> Result<Resolved, InternalError> {
        self.dispatcher.resolve(&self.registry, operation, type_id)
    }

    pub fn dyn_get_all_with_error(&self, path: &str) -> Outcome<Vec<BoxedEntity>> {
        match self.resolve_path(Operation::GetAll, path) {
            Ok(r) => (r.vtable.get_all)(&*r.manager),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn dyn_get_all(&self, path: &str) -> Vec<BoxedEntity> {
        self.bare("dyn_get_all", self.dyn_get_all_with_error(path))
    }

    pub fn dyn_get_by_id_with_error(&self, path: &str, id: i64) -> Outcome<Option<BoxedEntity>> {
        match self.resolve_path(Operation::GetById, path) {
            Ok(r) => (r.vtable.get_by_id)(&*r.manager, id),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn dyn_get_by_id(&self, path: &str, id: i64) -> Option<BoxedEntity> {
        self.bare("dyn_get_by_id", self.dyn_get_by_id_with_error(path, id))
    }

    pub fn dyn_filter_with_error(
        &self,
        path: &str,
        predicate: Predicate,
    ) -> Outcome<Vec<BoxedEntity>> {
        match self.resolve_path(Operation::Filter, path) {
            Ok(r) => (r.vtable.filter)(&*r.manager, predicate),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn dyn_filter(&self, path: &str, predicate: Predicate) -> Vec<BoxedEntity> {
        self.bare("dyn_filter", self.dyn_filter_with_error(path, predicate))
    }

    pub fn dyn_exist_with_error(&self, path: &str, predicate: Predicate) -> Outcome<bool> {
        match self.resolve_path(Operation::Exist, path) {
            Ok(r) => (r.vtable.exist)(&*r.manager, predicate),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn dyn_exist(&self, path: &str, predicate: Predicate) -> bool {
        self.bare("dyn_exist", self.dyn_exist_with_error(path, predicate))
    }

    /// Create a boxed entity through the manager of its concrete type.
    pub fn dyn_create_with_error(&self, item: BoxedEntity) -> Outcome<BoxedEntity> {
        match self.resolve(Operation::Create, item.as_any().type_id()) {
            Ok(r) => (r.vtable.create)(&*r.manager, item),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn dyn_create(&self, item: BoxedEntity) -> Option<BoxedEntity> {
        self.bare("dyn_create", self.dyn_create_with_error(item).map(Some))
    }

    pub fn dyn_update_with_error(
        &self,
        item: BoxedEntity,
        fields: &[&str],
    ) -> Outcome<BoxedEntity> {
        match self.resolve(Operation::Update, item.as_any().type_id()) {
            Ok(r) => (r.vtable.update)(&*r.manager, item, fields),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn dyn_update(&self, item: BoxedEntity, fields: &[&str]) -> Option<BoxedEntity> {
        self.bare("dyn_update", self.dyn_update_with_error(item, fields).map(Some))
    }

    pub fn dyn_delete_with_error(&self, item: BoxedEntity) -> Outcome<BoxedEntity> {
        match self.resolve(Operation::Delete, item.as_any().type_id()) {
            Ok(r) => (r.vtable.delete)(&*r.manager, item),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn dyn_delete(&self, item: BoxedEntity) -> Option<BoxedEntity> {
        self.bare("dyn_delete", self.dyn_delete_with_error(item).map(Some))
    }
}
