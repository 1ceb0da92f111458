use crate::{
    COUNT_COLUMN,
    db::{
        sql::{Dialect, ParamWriter, emit},
        storage::Storage,
    },
    error::{ErrorOrigin, InternalError},
    migration::plan::{Action, MigrationModel, MigrationProperty},
    model::{ColumnModel, SizeClass, SqlType},
    obs::TARGET_MIGRATION,
    value::Value,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

///
/// MigrationProvider
///
/// Applies migration models to one storage and remembers which migrations
/// ran there. `before_up` and `after_up` bracket one unit.
///

pub trait MigrationProvider: Send + Sync {
    /// Label used in errors and logs.
    fn name(&self) -> &str;

    /// Prepare the tracking table.
    fn init(&self) -> Result<(), InternalError>;

    /// Whether `migration` still has to run here.
    fn can(&self, migration: &str) -> Result<bool, InternalError>;

    /// Record `migration` as applied.
    fn save(&self, migration: &str) -> Result<(), InternalError>;

    fn before_up(&self) -> Result<(), InternalError>;

    /// Close the unit, keeping its changes only when `success` is true.
    fn after_up(&self, success: bool) -> Result<(), InternalError>;

    fn apply(&self, model: &MigrationModel) -> Result<(), InternalError>;
}

static NAME_COLUMN: ColumnModel = ColumnModel::text("name", SizeClass::Bounded(255)).unique();
static APPLIED_AT_COLUMN: ColumnModel = ColumnModel::scalar("applied_at", SqlType::DateTime);

///
/// StorageMigrationProvider
///

pub struct StorageMigrationProvider {
    storage: Arc<Storage>,
    table: String,
    transaction: Mutex<Option<u64>>,
}

impl StorageMigrationProvider {
    #[must_use]
    pub fn new(storage: Arc<Storage>, table: impl Into<String>) -> Self {
        Self {
            storage,
            table: table.into(),
            transaction: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    fn dialect(&self) -> &dyn Dialect {
        self.storage.dialect()
    }

    fn run_ddl(&self, sql: String) -> Result<(), InternalError> {
        self.storage.execute_template(emit::ddl(self.dialect(), sql))?;

        Ok(())
    }

    fn create_table(&self, model: &MigrationModel) -> Result<(), InternalError> {
        let dialect = self.dialect();
        if self.storage.table_exists(model.table())? {
            tracing::debug!(target: TARGET_MIGRATION, table = model.table(), "table exists, create skipped");
            return Ok(());
        }

        let declared: Vec<String> = model
            .pending_properties()
            .filter(|p| p.action() == Some(Action::Create))
            .filter_map(|p| self.definition(p))
            .collect();

        if declared.is_empty() {
            let level = model.model();
            self.storage.execute_template(emit::create_table(dialect, level))?;
            for index in emit::create_indexes(dialect, level) {
                self.storage.execute_template(index)?;
            }
            for (_, column) in level.many_columns() {
                if let Some(link) = level.intermediate(column.name)
                    && !self.storage.table_exists(link.table)?
                {
                    self.storage
                        .execute_template(emit::create_intermediate_table(dialect, &link))?;
                }
            }
            return Ok(());
        }

        self.run_ddl(format!(
            "CREATE TABLE {} ({})",
            dialect.quote(model.table()),
            declared.join(", ")
        ))?;
        self.create_property_indexes(model.table(), model.pending_properties())
    }

    fn create_property_indexes<'a>(
        &self,
        table: &str,
        properties: impl Iterator<Item = &'a MigrationProperty>,
    ) -> Result<(), InternalError> {
        for property in properties {
            let options = property.options();
            if property.action() == Some(Action::Create) && options.indexed && !options.primary {
                self.run_ddl(
                    self.dialect()
                        .create_index(table, property.name(), options.unique),
                )?;
            }
        }

        Ok(())
    }

    /// Column definition with its default, if any.
    fn definition(&self, property: &MigrationProperty) -> Option<String> {
        let column = property.column()?;
        let mut definition = emit::column_definition(self.dialect(), &column)?;
        if let Some(default) = &property.options().default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&self.default_literal(default));
        }

        Some(definition)
    }

    fn default_literal(&self, value: &Value) -> String {
        match value {
            Value::Null | Value::List(_) => "NULL".to_string(),
            Value::Bool(b) => self.dialect().bool_literal(*b).to_string(),
            Value::Int(_) | Value::Float(_) => value.to_string(),
            Value::Text(_) | Value::Date(_) | Value::DateTime(_) => {
                format!("'{}'", value.to_string().replace('\'', "''"))
            }
        }
    }

    fn apply_properties(&self, model: &MigrationModel) -> Result<(), InternalError> {
        let dialect = self.dialect();
        let table = model.table();

        for property in model.pending_properties() {
            match property.action() {
                Some(Action::Create) => {
                    let definition = self.definition(property).ok_or_else(|| {
                        InternalError::invariant(
                            ErrorOrigin::Migration,
                            format!("property '{}' has no type", property.name()),
                        )
                    })?;
                    self.run_ddl(dialect.add_column(table, &definition))?;
                }
                Some(Action::Update) => {
                    if let Some(from) = property.renamed_from() {
                        self.run_ddl(dialect.rename_column(table, from, property.name()))?;
                    }
                }
                Some(Action::Delete) => {
                    self.run_ddl(dialect.drop_column(table, property.name()))?;
                }
                None => {}
            }
        }

        self.create_property_indexes(table, model.pending_properties())
    }
}

impl MigrationProvider for StorageMigrationProvider {
    fn name(&self) -> &str {
        self.storage.name()
    }

    fn init(&self) -> Result<(), InternalError> {
        if self.storage.table_exists(&self.table)? {
            return Ok(());
        }

        let dialect = self.dialect();
        let columns: Vec<String> = [&NAME_COLUMN, &APPLIED_AT_COLUMN]
            .into_iter()
            .filter_map(|column| emit::column_definition(dialect, column))
            .collect();
        self.run_ddl(format!(
            "CREATE TABLE {} ({})",
            dialect.quote(&self.table),
            columns.join(", ")
        ))?;
        tracing::debug!(target: TARGET_MIGRATION, storage = self.name(), table = %self.table, "tracking table created");

        Ok(())
    }

    fn can(&self, migration: &str) -> Result<bool, InternalError> {
        let dialect = self.dialect();
        let mut writer = ParamWriter::new(dialect);
        let name = writer.literal(Value::Text(migration.to_string()));
        let sql = format!(
            "SELECT COUNT(*) AS {} FROM {} WHERE {} = {name}",
            dialect.quote(COUNT_COLUMN),
            dialect.quote(&self.table),
            dialect.quote(NAME_COLUMN.name),
        );
        let statement = writer.finish(sql).into_statement()?;

        Ok(self.storage.count(&statement)? == 0)
    }

    fn save(&self, migration: &str) -> Result<(), InternalError> {
        let template = emit::insert(
            self.dialect(),
            &self.table,
            &[NAME_COLUMN.name, APPLIED_AT_COLUMN.name],
            &[vec![
                Value::Text(migration.to_string()),
                Value::DateTime(Utc::now().naive_utc()),
            ]],
        );
        self.storage.execute_template(template)?;

        Ok(())
    }

    fn before_up(&self) -> Result<(), InternalError> {
        let (id, _) = self
            .storage
            .coordinator()
            .begin(self.storage.provider())?;
        *self.transaction.lock() = Some(id);

        Ok(())
    }

    fn after_up(&self, success: bool) -> Result<(), InternalError> {
        let Some(id) = self.transaction.lock().take() else {
            return Ok(());
        };
        let coordinator = self.storage.coordinator();
        let provider = self.storage.provider();

        if success {
            coordinator.commit(provider, id)?;
        } else {
            coordinator.rollback(provider, id)?;
        }

        Ok(())
    }

    fn apply(&self, model: &MigrationModel) -> Result<(), InternalError> {
        tracing::debug!(target: TARGET_MIGRATION, path = model.path(), action = ?model.action(), "applying model");

        match model.action() {
            Some(Action::Create) => self.create_table(model),
            Some(Action::Delete) => self.run_ddl(self.dialect().drop_table(model.table())),
            Some(Action::Update) => {
                if let Some(from) = model.renamed_from() {
                    self.run_ddl(self.dialect().rename_table(from, model.table()))?;
                }
                self.apply_properties(model)
            }
            None => self.apply_properties(model),
        }
    }
}

impl std::fmt::Debug for StorageMigrationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageMigrationProvider")
            .field("storage", &self.storage.name())
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
