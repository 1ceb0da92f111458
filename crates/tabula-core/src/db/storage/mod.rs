//! Storage: one physical database behind a provider.
//!
//! A `Storage` owns the provider connection, the models registered against
//! it and the transaction coordinator every builder on it shares.

mod sqlite;

#[cfg(test)]
mod tests;

pub use sqlite::SqliteProvider;

use crate::{
    COUNT_COLUMN,
    config::LogConfig,
    db::{
        sql::{Dialect, Statement, StatementTemplate, emit},
        transaction::{Transaction, TransactionCoordinator, TransactionError, TransactionStatus},
    },
    error::{ErrorClass, InternalError},
    model::EntityModel,
    obs,
    outcome::Outcome,
    value::Row,
};
use parking_lot::RwLock;
use std::{collections::HashSet, path::Path};
use thiserror::Error as ThisError;

///
/// StorageError
///

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("cannot connect to '{database}': {message}")]
    Connect { database: String, message: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("statement failed: {message}\n{sql}")]
    Execution { sql: String, message: String },

    #[error("value of kind '{kind}' cannot be bound as a parameter")]
    UnsupportedValue { kind: &'static str },
}

impl StorageError {
    pub(crate) fn class(&self) -> ErrorClass {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ErrorClass::Conflict
            }
            Self::UnsupportedValue { .. } => ErrorClass::Unsupported,
            _ => ErrorClass::Internal,
        }
    }

    /// Whether the backend rejected the statement on a constraint.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }
}

///
/// StorageProvider
///
/// Driver boundary. Implementations own their connection handling; the
/// engine only hands them finished statements.
///

pub trait StorageProvider: Send + Sync {
    fn dialect(&self) -> &dyn Dialect;

    fn database_name(&self) -> &str;

    /// Check the connection is usable.
    fn connect(&self) -> Result<(), StorageError>;

    /// Run a statement, returning the number of affected rows.
    fn execute(&self, statement: &Statement) -> Result<u64, StorageError>;

    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StorageError>;

    /// Run an insert, returning the last generated key.
    fn insert(&self, statement: &Statement) -> Result<i64, StorageError>;

    fn begin(&self) -> Result<(), StorageError>;

    fn commit(&self) -> Result<(), StorageError>;

    fn rollback(&self) -> Result<(), StorageError>;
}

///
/// Storage
///

pub struct Storage {
    provider: Box<dyn StorageProvider>,
    coordinator: TransactionCoordinator,
    models: RwLock<Vec<&'static EntityModel>>,
    log: LogConfig,
}

impl Storage {
    #[must_use]
    pub fn new(provider: impl StorageProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            coordinator: TransactionCoordinator::default(),
            models: RwLock::new(Vec::new()),
            log: LogConfig::default(),
        }
    }

    pub fn sqlite_memory() -> Result<Self, StorageError> {
        Ok(Self::new(SqliteProvider::open_in_memory()?))
    }

    pub fn sqlite_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self::new(SqliteProvider::open(path)?))
    }

    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.provider.dialect()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.provider.database_name()
    }

    #[must_use]
    pub const fn log(&self) -> &LogConfig {
        &self.log
    }

    pub(crate) fn provider(&self) -> &dyn StorageProvider {
        self.provider.as_ref()
    }

    pub(crate) const fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    pub fn connect(&self) -> Result<(), InternalError> {
        Ok(self.provider.connect()?)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn execute(&self, statement: &Statement) -> Result<u64, InternalError> {
        obs::trace_statement(&self.log, statement);
        Ok(self.provider.execute(statement)?)
    }

    pub fn query(&self, statement: &Statement) -> Result<Vec<Row>, InternalError> {
        obs::trace_statement(&self.log, statement);
        Ok(self.provider.query(statement)?)
    }

    pub fn insert(&self, statement: &Statement) -> Result<i64, InternalError> {
        obs::trace_statement(&self.log, statement);
        Ok(self.provider.insert(statement)?)
    }

    /// Execute a template that has no variables.
    pub fn execute_template(&self, template: StatementTemplate) -> Result<u64, InternalError> {
        self.execute(&template.into_statement()?)
    }

    /// Query with a template that has no variables.
    pub fn query_template(&self, template: StatementTemplate) -> Result<Vec<Row>, InternalError> {
        self.query(&template.into_statement()?)
    }

    /// Run a count statement and read its single `nb` column.
    pub(crate) fn count(&self, statement: &Statement) -> Result<u64, InternalError> {
        let rows = self.query(statement)?;
        let count: i64 = match rows.first() {
            Some(row) => row.get(COUNT_COLUMN)?,
            None => 0,
        };

        Ok(u64::try_from(count).unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    /// Register a model. Registering the same path twice is a no-op.
    pub fn add_model(&self, model: &'static EntityModel) {
        let mut models = self.models.write();
        if !models.iter().any(|m| m.same(model)) {
            models.push(model);
        }
    }

    #[must_use]
    pub fn models(&self) -> Vec<&'static EntityModel> {
        self.models.read().clone()
    }

    #[must_use]
    pub fn has_model(&self, model: &EntityModel) -> bool {
        self.models.read().iter().any(|m| m.same(model))
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, InternalError> {
        let statement = emit::table_exists(self.dialect(), table).into_statement()?;

        Ok(self.count(&statement)? > 0)
    }

    /// Create every missing table of the registered models, then their
    /// indexes, then the intermediate tables of multi-valued relations.
    /// Returns the names of the tables created.
    pub fn create_tables(&self) -> Result<Vec<String>, InternalError> {
        let dialect = self.dialect();
        let mut created = Vec::new();
        let mut seen = HashSet::new();

        for level in self.creation_order() {
            if !seen.insert(level.table) || self.table_exists(level.table)? {
                continue;
            }
            self.execute_template(emit::create_table(dialect, level))?;
            for index in emit::create_indexes(dialect, level) {
                self.execute_template(index)?;
            }
            created.push(level.table.to_string());
        }

        for model in self.models() {
            for (_, column) in model.many_columns() {
                let Some(link) = model.intermediate(column.name) else {
                    continue;
                };
                if !seen.insert(link.table) || self.table_exists(link.table)? {
                    continue;
                }
                self.execute_template(emit::create_intermediate_table(dialect, &link))?;
                created.push(link.table.to_string());
            }
        }

        Ok(created)
    }

    /// Every level of every registered model, ordered so parents and
    /// relation targets come before the tables referencing them. Cycles
    /// fall back to registration order.
    fn creation_order(&self) -> Vec<&'static EntityModel> {
        let mut pending: Vec<&'static EntityModel> = Vec::new();
        for model in self.models() {
            for level in model.levels() {
                if !pending.iter().any(|p| p.same(level)) {
                    pending.push(level);
                }
            }
        }

        let mut ordered: Vec<&'static EntityModel> = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let ready = pending.iter().position(|level| {
                dependencies(level).iter().all(|dep| {
                    dep.same(level)
                        || ordered.iter().any(|o| o.same(dep))
                        || !pending.iter().any(|p| p.same(dep))
                })
            });
            let next = pending.remove(ready.unwrap_or(0));
            ordered.push(next);
        }

        ordered
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Begin or join the storage-wide transaction.
    pub fn begin(&self) -> Result<Transaction<'_>, InternalError> {
        Ok(Transaction::begin(self)?)
    }

    /// Run `action` inside a transaction: commit when it produced no
    /// errors, roll back otherwise. Commit and rollback failures are
    /// appended to the action's own outcome.
    pub fn run_inside_transaction<T>(
        &self,
        action: impl FnOnce(&Self) -> Outcome<T>,
    ) -> Outcome<T> {
        let tx = match self.begin() {
            Ok(tx) => tx,
            Err(err) => return Outcome::from_error(err),
        };

        let mut outcome = action(self);
        if outcome.is_success() {
            match tx.commit() {
                Ok(TransactionStatus::AlreadyEnded) => {
                    outcome.push_error(TransactionError::AlreadyEnded);
                }
                Ok(_) => {}
                Err(err) => outcome.push_error(err),
            }
        } else if let Err(err) = tx.rollback() {
            outcome.push_error(err);
        }

        outcome
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("name", &self.name())
            .field("dialect", &self.dialect().name())
            .finish_non_exhaustive()
    }
}

fn dependencies(level: &'static EntityModel) -> Vec<&'static EntityModel> {
    let mut deps: Vec<&'static EntityModel> = level.parent.into_iter().collect();
    for column in level.own_columns() {
        if let Some(target) = column.relation_target() {
            deps.push(target.root());
        }
    }

    deps
}
