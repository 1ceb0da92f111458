use crate::error::Error;
use std::sync::Arc;
use tabula_core::{
    config::Config,
    db::{Database, global, predicate::Predicate, storage::Storage},
    migration::{Migration, MigrationManager},
    outcome::Outcome,
    traits::{BoxedEntity, Entity},
};

///
/// Session
/// Public facade over a shared database.
/// Every call returns `Result`, with core errors converted into `tabula::Error`.
///

#[derive(Clone, Debug)]
pub struct Session {
    db: Arc<Database>,
}

impl Session {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::new(Database::with_config(config))
    }

    /// Session over the process-wide database.
    pub fn global() -> Result<Self, Error> {
        let db = global::get().map_err(tabula_core::error::InternalError::from)?;

        Ok(Self { db })
    }

    /// Install this session's database as the process-wide one.
    pub fn install(db: Database) -> Result<Self, Error> {
        let db = global::install(db).map_err(tabula_core::error::InternalError::from)?;

        Ok(Self { db })
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    //
    // Setup
    //

    pub fn register<E: Entity>(&self, storage: &Arc<Storage>) -> Result<(), Error> {
        Ok(self.db.register::<E>(storage)?)
    }

    pub fn register_aliased<E: Entity>(
        &self,
        storage: &Arc<Storage>,
        alias: &'static str,
    ) -> Result<(), Error> {
        Ok(self.db.register_aliased::<E>(storage, alias)?)
    }

    /// Create missing tables on every storage.
    pub fn init(&self) -> Result<Vec<String>, Error> {
        Ok(self.db.init()?)
    }

    /// Apply pending migration units. Returns the names applied.
    pub fn migrate(&self, units: Vec<Box<dyn Migration>>) -> Result<Vec<String>, Error> {
        let outcome = MigrationManager::new(&self.db).run(&self.db, units);

        required(outcome)
    }

    //
    // Typed
    //

    pub fn get_all<E: Entity>(&self) -> Result<Vec<E>, Error> {
        required(self.db.get_all_with_error::<E>())
    }

    pub fn get_by_id<E: Entity>(&self, id: i64) -> Result<Option<E>, Error> {
        optional(self.db.get_by_id_with_error::<E>(id))
    }

    pub fn get_by_ids<E: Entity>(&self, ids: &[i64]) -> Result<Vec<E>, Error> {
        required(self.db.get_by_ids_with_error::<E>(ids))
    }

    pub fn filter<E: Entity>(&self, predicate: Predicate) -> Result<Vec<E>, Error> {
        required(self.db.filter_with_error::<E>(predicate))
    }

    /// Entities of `E` whose single relation to `T` points at one of `ids`.
    pub fn referencing<E: Entity, T: Entity>(&self, ids: &[i64]) -> Result<Vec<E>, Error> {
        required(self.db.referencing_with_error::<E, T>(ids))
    }

    pub fn exist<E: Entity>(&self, predicate: Predicate) -> Result<bool, Error> {
        required(self.db.exist_with_error::<E>(predicate))
    }

    pub fn create<E: Entity>(&self, item: E) -> Result<E, Error> {
        required(self.db.create_with_error(item))
    }

    pub fn bulk_create<E: Entity>(&self, items: Vec<E>, with_id: bool) -> Result<Vec<E>, Error> {
        required(self.db.bulk_create_with_error(items, with_id))
    }

    pub fn update<E: Entity>(&self, item: E, fields: &[&str]) -> Result<E, Error> {
        required(self.db.update_with_error(item, fields))
    }

    pub fn delete<E: Entity>(&self, item: E) -> Result<E, Error> {
        required(self.db.delete_with_error(item))
    }

    //
    // Dynamic
    //

    pub fn dyn_get_all(&self, path: &str) -> Result<Vec<BoxedEntity>, Error> {
        required(self.db.dyn_get_all_with_error(path))
    }

    pub fn dyn_filter(&self, path: &str, predicate: Predicate) -> Result<Vec<BoxedEntity>, Error> {
        required(self.db.dyn_filter_with_error(path, predicate))
    }

    pub fn dyn_create(&self, item: BoxedEntity) -> Result<BoxedEntity, Error> {
        required(self.db.dyn_create_with_error(item))
    }
}

/// Outcome whose value must be present on success.
fn required<T>(outcome: Outcome<T>) -> Result<T, Error> {
    match outcome.into_result() {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(Error::from_errors(Vec::new())),
        Err(errors) => Err(Error::from_errors(errors)),
    }
}

fn optional<T>(outcome: Outcome<Option<T>>) -> Result<Option<T>, Error> {
    outcome
        .into_result()
        .map(Option::flatten)
        .map_err(Error::from_errors)
}
