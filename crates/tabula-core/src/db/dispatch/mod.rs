//! Dynamic dispatch from type-erased calls to typed managers.
//!
//! Every registered type gets an `EntityVTable` of monomorphized handlers
//! built at registration. The `Dispatcher` caches one resolution per
//! operation and reuses it only when the requested concrete type matches
//! exactly; any other type resolves afresh and replaces the entry.


use crate::{
    db::{
        manager::DataManager,
        predicate::Predicate,
        registry::{AnyManager, Registry},
    },
    error::{ErrorClass, InternalError},
    outcome::Outcome,
    traits::{BoxedEntity, Entity, downcast},
};
use derive_more::Display;
use parking_lot::RwLock;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};
use thiserror::Error as ThisError;

///
/// DispatchError
///

#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("no {operation} handler for '{type_name}'")]
    MethodNotFound {
        operation: Operation,
        type_name: String,
    },

    #[error("{operation} expected '{expected}' but received '{found}'")]
    TypeMismatch {
        operation: Operation,
        expected: &'static str,
        found: &'static str,
    },
}

impl DispatchError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::MethodNotFound { .. } => ErrorClass::NotFound,
            Self::TypeMismatch { .. } => ErrorClass::Unsupported,
        }
    }
}

///
/// Operation
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Operation {
    #[display("get_all")]
    GetAll,
    #[display("get_by_id")]
    GetById,
    #[display("filter")]
    Filter,
    #[display("exist")]
    Exist,
    #[display("create")]
    Create,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
}

/// Handler loading every entity of one type.
pub type GetAllHandler = fn(&(dyn Any + Send + Sync)) -> Outcome<Vec<BoxedEntity>>;

/// Handler loading one entity by primary key.
pub type GetByIdHandler = fn(&(dyn Any + Send + Sync), i64) -> Outcome<Option<BoxedEntity>>;

/// Handler loading the entities matching a predicate.
pub type FilterHandler = fn(&(dyn Any + Send + Sync), Predicate) -> Outcome<Vec<BoxedEntity>>;

/// Handler checking whether any entity matches a predicate.
pub type ExistHandler = fn(&(dyn Any + Send + Sync), Predicate) -> Outcome<bool>;

/// Handler creating, or deleting, one boxed entity.
pub type EntityHandler = fn(&(dyn Any + Send + Sync), BoxedEntity) -> Outcome<BoxedEntity>;

/// Handler writing the listed fields of one boxed entity.
pub type UpdateHandler =
    fn(&(dyn Any + Send + Sync), BoxedEntity, &[&str]) -> Outcome<BoxedEntity>;

///
/// EntityVTable
///
/// Typed handlers for one registered entity type.
///

#[derive(Clone, Copy)]
pub struct EntityVTable {
    pub type_id: TypeId,
    pub path: &'static str,
    pub get_all: GetAllHandler,
    pub get_by_id: GetByIdHandler,
    pub filter: FilterHandler,
    pub exist: ExistHandler,
    pub create: EntityHandler,
    pub update: UpdateHandler,
    pub delete: EntityHandler,
}

impl EntityVTable {
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            path: E::MODEL.path,
            get_all: get_all::<E>,
            get_by_id: get_by_id::<E>,
            filter: filter::<E>,
            exist: exist::<E>,
            create: create::<E>,
            update: update::<E>,
            delete: delete::<E>,
        }
    }
}

impl std::fmt::Debug for EntityVTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityVTable").field("path", &self.path).finish()
    }
}

fn manager_of<E: Entity>(
    manager: &(dyn Any + Send + Sync),
    operation: Operation,
) -> Result<&DataManager<E>, DispatchError> {
    manager
        .downcast_ref::<DataManager<E>>()
        .ok_or(DispatchError::MethodNotFound {
            operation,
            type_name: E::MODEL.path.to_string(),
        })
}

fn entity_of<E: Entity>(item: BoxedEntity, operation: Operation) -> Result<E, DispatchError> {
    let found = item.model().path;
    downcast::<E>(item).ok_or(DispatchError::TypeMismatch {
        operation,
        expected: E::MODEL.path,
        found,
    })
}

fn boxed<E: Entity>(item: E) -> BoxedEntity {
    Box::new(item)
}

fn get_all<E: Entity>(manager: &(dyn Any + Send + Sync)) -> Outcome<Vec<BoxedEntity>> {
    match manager_of::<E>(manager, Operation::GetAll) {
        Ok(manager) => manager
            .get_all_with_error()
            .map(|items| items.into_iter().map(boxed).collect()),
        Err(err) => Outcome::from_error(err),
    }
}

fn get_by_id<E: Entity>(
    manager: &(dyn Any + Send + Sync),
    id: i64,
) -> Outcome<Option<BoxedEntity>> {
    match manager_of::<E>(manager, Operation::GetById) {
        Ok(manager) => manager.get_by_id_with_error(id).map(|item| item.map(boxed)),
        Err(err) => Outcome::from_error(err),
    }
}

fn filter<E: Entity>(
    manager: &(dyn Any + Send + Sync),
    predicate: Predicate,
) -> Outcome<Vec<BoxedEntity>> {
    match manager_of::<E>(manager, Operation::Filter) {
        Ok(manager) => manager
            .filter_with_error(predicate)
            .map(|items| items.into_iter().map(boxed).collect()),
        Err(err) => Outcome::from_error(err),
    }
}

fn exist<E: Entity>(manager: &(dyn Any + Send + Sync), predicate: Predicate) -> Outcome<bool> {
    match manager_of::<E>(manager, Operation::Exist) {
        Ok(manager) => manager.exist_with_error(predicate),
        Err(err) => Outcome::from_error(err),
    }
}

fn create<E: Entity>(manager: &(dyn Any + Send + Sync), item: BoxedEntity) -> Outcome<BoxedEntity> {
    let resolved = manager_of::<E>(manager, Operation::Create)
        .and_then(|manager| Ok((manager, entity_of::<E>(item, Operation::Create)?)));

    match resolved {
        Ok((manager, item)) => manager.create_with_error(item).map(boxed),
        Err(err) => Outcome::from_error(err),
    }
}

fn update<E: Entity>(
    manager: &(dyn Any + Send + Sync),
    item: BoxedEntity,
    fields: &[&str],
) -> Outcome<BoxedEntity> {
    let resolved = manager_of::<E>(manager, Operation::Update)
        .and_then(|manager| Ok((manager, entity_of::<E>(item, Operation::Update)?)));

    match resolved {
        Ok((manager, item)) => manager.update_with_error(item, fields).map(boxed),
        Err(err) => Outcome::from_error(err),
    }
}

fn delete<E: Entity>(manager: &(dyn Any + Send + Sync), item: BoxedEntity) -> Outcome<BoxedEntity> {
    let resolved = manager_of::<E>(manager, Operation::Delete)
        .and_then(|manager| Ok((manager, entity_of::<E>(item, Operation::Delete)?)));

    match resolved {
        Ok((manager, item)) => manager.delete_with_error(item).map(boxed),
        Err(err) => Outcome::from_error(err),
    }
}

///
/// Resolved
///

#[derive(Clone)]
pub struct Resolved {
    pub vtable: EntityVTable,
    pub manager: AnyManager,
}

///
/// Dispatcher
///
/// Per-operation resolution cache. Concurrent first resolutions may race;
/// the last writer wins and a lost entry is simply resolved again.
///

#[derive(Debug, Default)]
pub struct Dispatcher {
    cache: RwLock<HashMap<Operation, (TypeId, Resolved)>>,
    lookups: AtomicU64,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        registry: &Registry,
        operation: Operation,
        type_id: TypeId,
    ) -> Result<Resolved, InternalError> {
        if let Some((cached, resolved)) = self.cache.read().get(&operation)
            && *cached == type_id
        {
            return Ok(resolved.clone());
        }

        self.lookups.fetch_add(1, Ordering::Relaxed);
        let record = registry
            .record(type_id)
            .ok_or_else(|| DispatchError::MethodNotFound {
                operation,
                type_name: format!("{type_id:?}"),
            })?;
        let resolved = Resolved {
            vtable: record.vtable,
            manager: record.manager,
        };
        self.cache
            .write()
            .insert(operation, (type_id, resolved.clone()));

        Ok(resolved)
    }

    /// Number of resolutions that missed the cache.
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("path", &self.vtable.path)
            .finish_non_exhaustive()
    }
}
