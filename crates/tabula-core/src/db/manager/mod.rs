//! Typed data managers.
//!
//! A `DataManager<E>` is the per-type entry point registered with a
//! `Database`. It wraps the builders with hooks and observers and exposes
//! every operation in a `*_with_error` form returning an `Outcome` plus a
//! bare form that collapses it.

mod hooks;


pub use hooks::{EntityHooks, NoHooks};

use crate::{
    db::{
        predicate::{FieldRef, Predicate},
        query::{Create, Delete, Exist, Query, Update},
        storage::Storage,
        translate,
    },
    error::InternalError,
    obs,
    outcome::Outcome,
    traits::Entity,
    value::Value,
};
use hooks::{Event, Observers, guarded};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

///
/// DataManager
///

pub struct DataManager<E: Entity> {
    storage: Arc<Storage>,
    hooks: RwLock<Arc<dyn EntityHooks<E>>>,
    observers: Observers<E>,
}

impl<E: Entity> DataManager<E> {
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            hooks: RwLock::new(Arc::new(NoHooks)),
            observers: Observers::default(),
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn set_hooks(&self, hooks: impl EntityHooks<E> + 'static) {
        *self.hooks.write() = Arc::new(hooks);
    }

    pub fn on_created(&self, observer: impl Fn(&E) + Send + Sync + 'static) {
        self.observers.push(Event::Created, Box::new(observer));
    }

    pub fn on_updated(&self, observer: impl Fn(&E) + Send + Sync + 'static) {
        self.observers.push(Event::Updated, Box::new(observer));
    }

    pub fn on_deleted(&self, observer: impl Fn(&E) + Send + Sync + 'static) {
        self.observers.push(Event::Deleted, Box::new(observer));
    }

    fn hooks(&self) -> Arc<dyn EntityHooks<E>> {
        Arc::clone(&self.hooks.read())
    }

    fn bare<T: Default>(&self, operation: &str, outcome: Outcome<T>) -> T {
        obs::collapse(self.storage.log(), operation, outcome)
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    #[must_use]
    pub fn query(&self) -> Query<'_, E> {
        Query::new(&self.storage)
    }

    #[must_use]
    pub fn exist_query(&self) -> Exist<'_, E> {
        Exist::new(&self.storage)
    }

    #[must_use]
    pub fn update_query(&self, items: Vec<E>) -> Update<'_, E> {
        Update::new(&self.storage, items)
    }

    #[must_use]
    pub fn delete_query(&self) -> Delete<'_, E> {
        Delete::new(&self.storage)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_all_with_error(&self) -> Outcome<Vec<E>> {
        self.query().run_with_error()
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<E> {
        self.bare("get_all", self.get_all_with_error())
    }

    pub fn get_by_id_with_error(&self, id: i64) -> Outcome<Option<E>> {
        self.query().filter(id_filter::<E>(&[id])).single_with_error()
    }

    #[must_use]
    pub fn get_by_id(&self, id: i64) -> Option<E> {
        self.bare("get_by_id", self.get_by_id_with_error(id))
    }

    /// Entities in the order of `ids`; unknown ids are skipped.
    pub fn get_by_ids_with_error(&self, ids: &[i64]) -> Outcome<Vec<E>> {
        self.query()
            .filter(id_filter::<E>(ids))
            .run_with_error()
            .map(|items| {
                let mut by_id: HashMap<i64, E> =
                    items.into_iter().map(|item| (item.id(), item)).collect();
                ids.iter().filter_map(|id| by_id.remove(id)).collect()
            })
    }

    #[must_use]
    pub fn get_by_ids(&self, ids: &[i64]) -> Vec<E> {
        self.bare("get_by_ids", self.get_by_ids_with_error(ids))
    }

    /// Entities whose single relation to `T` points at one of `ids`.
    pub fn referencing_with_error<T: Entity>(&self, ids: &[i64]) -> Outcome<Vec<E>> {
        match translate::reverse_relation(E::MODEL, T::MODEL) {
            Ok(column) => {
                self.filter_with_error(FieldRef::new(column.name).in_list(ids.iter().copied()))
            }
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn referencing<T: Entity>(&self, ids: &[i64]) -> Vec<E> {
        self.bare("referencing", self.referencing_with_error::<T>(ids))
    }

    pub fn filter_with_error(&self, predicate: Predicate) -> Outcome<Vec<E>> {
        self.query().filter(predicate).run_with_error()
    }

    #[must_use]
    pub fn filter(&self, predicate: Predicate) -> Vec<E> {
        self.bare("filter", self.filter_with_error(predicate))
    }

    pub fn single_with_error(&self, predicate: Predicate) -> Outcome<Option<E>> {
        self.query().filter(predicate).single_with_error()
    }

    #[must_use]
    pub fn single(&self, predicate: Predicate) -> Option<E> {
        self.bare("single", self.single_with_error(predicate))
    }

    pub fn exist_with_error(&self, predicate: Predicate) -> Outcome<bool> {
        self.exist_query().filter(predicate).run_with_error()
    }

    #[must_use]
    pub fn exist(&self, predicate: Predicate) -> bool {
        self.bare("exist", self.exist_with_error(predicate))
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_with_error(&self, item: E) -> Outcome<E> {
        self.create_items(vec![item], false, false)
            .map(|items| items.into_iter().next())
            .flatten_value()
    }

    #[must_use]
    pub fn create(&self, item: E) -> Option<E> {
        self.bare("create", self.create_with_error(item).map(Some))
    }

    /// One insert per entity.
    pub fn create_many_with_error(&self, items: Vec<E>) -> Outcome<Vec<E>> {
        self.create_items(items, false, false)
    }

    #[must_use]
    pub fn create_many(&self, items: Vec<E>) -> Vec<E> {
        self.bare("create_many", self.create_many_with_error(items))
    }

    /// One multi-row insert per table level.
    pub fn bulk_create_with_error(&self, items: Vec<E>, with_id: bool) -> Outcome<Vec<E>> {
        self.create_items(items, with_id, true)
    }

    #[must_use]
    pub fn bulk_create(&self, items: Vec<E>, with_id: bool) -> Vec<E> {
        self.bare("bulk_create", self.bulk_create_with_error(items, with_id))
    }

    fn create_items(&self, items: Vec<E>, with_id: bool, bulk: bool) -> Outcome<Vec<E>> {
        let hooks = self.hooks();
        let mut outcome = Outcome::new();

        let accepted: Vec<E> = items
            .into_iter()
            .filter_map(|mut item| {
                let admitted = admit(&mut outcome, "can_create", || hooks.can_create(&item))
                    && outcome
                        .absorb_result(guarded("before_create", || hooks.before_create(&mut item)))
                        .is_some();
                admitted.then_some(item)
            })
            .collect();

        let created = outcome.absorb(
            Create::new(&self.storage, accepted)
                .with_id(with_id)
                .bulk(bulk)
                .run_with_error(),
        );
        if let Some(created) = created {
            for item in &created {
                outcome.absorb_result(guarded("after_create", || hooks.after_create(item)));
                outcome.extend_errors(self.observers.notify(Event::Created, item));
            }
            outcome.set_value(created);
        }

        outcome
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Write `fields` of `item` and return the stored state.
    pub fn update_with_error(&self, item: E, fields: &[&str]) -> Outcome<E> {
        self.update_many_with_error(vec![item], fields)
            .map(|items| items.into_iter().next())
            .flatten_value()
    }

    #[must_use]
    pub fn update(&self, item: E, fields: &[&str]) -> Option<E> {
        self.bare("update", self.update_with_error(item, fields).map(Some))
    }

    pub fn update_many_with_error(&self, items: Vec<E>, fields: &[&str]) -> Outcome<Vec<E>> {
        let hooks = self.hooks();
        let mut outcome = Outcome::new();

        let accepted: Vec<E> = items
            .into_iter()
            .filter_map(|mut item| {
                let admitted = admit(&mut outcome, "can_update", || hooks.can_update(&item))
                    && outcome
                        .absorb_result(guarded("before_update", || hooks.before_update(&mut item)))
                        .is_some();
                admitted.then_some(item)
            })
            .collect();
        let ids: Vec<i64> = accepted.iter().map(Entity::id).collect();

        let updated = outcome.absorb(self.update_query(accepted).fields(fields).run_with_error());
        if updated.is_none() {
            return outcome;
        }

        if let Some(stored) = outcome.absorb(self.get_by_ids_with_error(&ids)) {
            for item in &stored {
                outcome.absorb_result(guarded("after_update", || hooks.after_update(item)));
                outcome.extend_errors(self.observers.notify(Event::Updated, item));
            }
            outcome.set_value(stored);
        }

        outcome
    }

    #[must_use]
    pub fn update_many(&self, items: Vec<E>, fields: &[&str]) -> Vec<E> {
        self.bare("update_many", self.update_many_with_error(items, fields))
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete `item`, returning it on success.
    pub fn delete_with_error(&self, item: E) -> Outcome<E> {
        self.delete_many_with_error(vec![item])
            .map(|items| items.into_iter().next())
            .flatten_value()
    }

    #[must_use]
    pub fn delete(&self, item: E) -> Option<E> {
        self.bare("delete", self.delete_with_error(item).map(Some))
    }

    pub fn delete_many_with_error(&self, items: Vec<E>) -> Outcome<Vec<E>> {
        let hooks = self.hooks();
        let mut outcome = Outcome::new();

        let accepted: Vec<E> = items
            .into_iter()
            .filter(|item| {
                admit(&mut outcome, "can_delete", || hooks.can_delete(item))
                    && outcome
                        .absorb_result(guarded("before_delete", || hooks.before_delete(item)))
                        .is_some()
            })
            .collect();

        if outcome
            .absorb(Delete::items(&self.storage, &accepted).run_with_error())
            .is_none()
        {
            return outcome;
        }

        for item in &accepted {
            outcome.absorb_result(guarded("after_delete", || hooks.after_delete(item)));
            outcome.extend_errors(self.observers.notify(Event::Deleted, item));
        }
        outcome.set_value(accepted);

        outcome
    }

    #[must_use]
    pub fn delete_many(&self, items: Vec<E>) -> Vec<E> {
        self.bare("delete_many", self.delete_many_with_error(items))
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    pub fn run_inside_transaction<T>(&self, action: impl FnOnce(&Self) -> Outcome<T>) -> Outcome<T> {
        self.storage.run_inside_transaction(|_| action(self))
    }
}

/// Evaluate a `can_*` hook; refusals and panics become errors.
fn admit<T>(outcome: &mut Outcome<T>, label: &str, check: impl FnOnce() -> bool) -> bool {
    match guarded(label, check) {
        Ok(true) => true,
        Ok(false) => {
            outcome.push_error(InternalError::hook(format!("{label} refused the item")));
            false
        }
        Err(err) => {
            outcome.push_error(err);
            false
        }
    }
}

fn id_filter<E: Entity>(ids: &[i64]) -> Predicate {
    Predicate::in_(
        E::MODEL.root().primary_key,
        ids.iter().copied().map(Value::Int).collect(),
    )
}
