use crate::{
    config::MigrationConfig,
    db::{Database, storage::Storage},
    error::InternalError,
    migration::{
        Migration, MigrationError, MigrationPlan,
        provider::{MigrationProvider, StorageMigrationProvider},
    },
    obs::TARGET_MIGRATION,
    outcome::Outcome,
};
use std::{collections::HashSet, sync::Arc};

///
/// MigrationManager
///
/// Runs migration units against every storage of a database. Each storage
/// gets one provider; a unit only involves the providers holding the
/// models it touches, or all of them when it touches none.
///

pub struct MigrationManager {
    config: MigrationConfig,
    slots: Vec<Slot>,
}

struct Slot {
    storage: Arc<Storage>,
    provider: Box<dyn MigrationProvider>,
}

impl MigrationManager {
    /// One `StorageMigrationProvider` per registered storage.
    #[must_use]
    pub fn new(database: &Database) -> Self {
        let config = database.config().migration.clone();
        let slots = database
            .registry()
            .storages()
            .into_iter()
            .map(|storage| Slot {
                provider: Box::new(StorageMigrationProvider::new(
                    Arc::clone(&storage),
                    config.table.clone(),
                )),
                storage,
            })
            .collect();

        Self { config, slots }
    }

    /// Replace the provider used for `storage`, or add one.
    #[must_use]
    pub fn with_provider(
        mut self,
        storage: &Arc<Storage>,
        provider: impl MigrationProvider + 'static,
    ) -> Self {
        let provider: Box<dyn MigrationProvider> = Box::new(provider);
        match self.slots.iter_mut().find(|s| Arc::ptr_eq(&s.storage, storage)) {
            Some(slot) => slot.provider = provider,
            None => self.slots.push(Slot {
                storage: Arc::clone(storage),
                provider,
            }),
        }

        self
    }

    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.slots.len()
    }

    /// Apply every pending unit in name order, stopping at the first one
    /// that fails. Returns the names of the units applied.
    pub fn run(&self, database: &Database, units: Vec<Box<dyn Migration>>) -> Outcome<Vec<String>> {
        let mut outcome = Outcome::ok(Vec::new());
        let mut applied = Vec::new();

        if let Err(err) = self.prepare() {
            outcome.push_error(err);
            return outcome;
        }

        let mut units = units;
        units.sort_by(|a, b| a.name().cmp(b.name()));
        if let Some(pair) = units.windows(2).find(|pair| pair[0].name() == pair[1].name()) {
            outcome.push_error(MigrationError::DuplicateName {
                name: pair[0].name().to_string(),
            });
            return outcome;
        }

        for unit in &units {
            match self.run_unit(database, unit.as_ref()) {
                Ok(true) => applied.push(unit.name().to_string()),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(target: TARGET_MIGRATION, migration = unit.name(), error = %err, "migration failed");
                    outcome.push_error(err);
                    break;
                }
            }
        }

        outcome.set_value(applied);
        outcome
    }

    fn prepare(&self) -> Result<(), InternalError> {
        let count = self.slots.len();
        if count > 1 && !self.config.multiple_providers {
            return Err(MigrationError::MultipleProvidersNotEnabled { count }.into());
        }

        for slot in &self.slots {
            slot.storage.connect()?;
            slot.provider.init()?;
        }

        Ok(())
    }

    /// Slots holding the models the plan touches, in slot order.
    fn participants(
        &self,
        database: &Database,
        migration: &str,
        plan: &MigrationPlan,
    ) -> Result<Vec<&Slot>, InternalError> {
        let mut wanted = HashSet::new();
        for model in plan.models().iter().filter(|m| m.is_pending()) {
            let storage = database.registry().storage_of(model.path()).ok();
            let index = storage
                .and_then(|storage| self.slot_index(&storage))
                .ok_or_else(|| MigrationError::ProviderNotFound {
                    migration: migration.to_string(),
                    path: model.path().to_string(),
                })?;
            wanted.insert(index);
        }

        Ok(self
            .slots
            .iter()
            .enumerate()
            .filter(|(index, _)| wanted.is_empty() || wanted.contains(index))
            .map(|(_, slot)| slot)
            .collect())
    }

    fn slot_index(&self, storage: &Arc<Storage>) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| Arc::ptr_eq(&slot.storage, storage))
    }

    /// Returns whether the unit was applied.
    fn run_unit(&self, database: &Database, unit: &dyn Migration) -> Result<bool, InternalError> {
        let name = unit.name();
        let mut plan = MigrationPlan::new();
        unit.up(&mut plan);

        let participants = self.participants(database, name, &plan)?;
        let mut pending = Vec::with_capacity(participants.len());
        for slot in &participants {
            pending.push(slot.provider.can(name)?);
        }

        if pending.iter().all(|can| !can) {
            tracing::info!(target: TARGET_MIGRATION, migration = name, "already applied, skipped");
            return Ok(false);
        }
        if let Some(refused) = participants
            .iter()
            .zip(&pending)
            .find_map(|(slot, can)| (!can).then_some(slot))
        {
            return Err(MigrationError::ProviderRefused {
                migration: name.to_string(),
                provider: refused.provider.name().to_string(),
            }
            .into());
        }

        let mut opened = 0;
        let mut result = Ok(());
        for slot in &participants {
            if let Err(err) = slot.provider.before_up() {
                result = Err(err);
                break;
            }
            opened += 1;
        }

        if result.is_ok() {
            result = self.apply(&participants, name, &plan);
        }
        let success = result.is_ok();
        let closing = close(&participants[..opened], success);
        result?;
        closing?;

        tracing::info!(target: TARGET_MIGRATION, migration = name, providers = participants.len(), "applied");

        Ok(true)
    }

    fn apply(&self, participants: &[&Slot], name: &str, plan: &MigrationPlan) -> Result<(), InternalError> {
        let mut models: Vec<_> = plan.models().iter().filter(|m| m.is_pending()).collect();
        models.sort_by_key(|m| m.priority());

        for model in models {
            let slot = participants
                .iter()
                .find(|slot| slot.storage.has_model(model.model()))
                .or_else(|| participants.first())
                .ok_or_else(|| MigrationError::ProviderNotFound {
                    migration: name.to_string(),
                    path: model.path().to_string(),
                })?;
            slot.provider.apply(model)?;
        }

        for slot in participants {
            slot.provider.save(name)?;
        }

        Ok(())
    }
}

/// End the unit on every opened provider, reporting the first failure.
fn close(opened: &[&Slot], success: bool) -> Result<(), InternalError> {
    let mut closing = Ok(());
    for slot in opened {
        if let Err(err) = slot.provider.after_up(success)
            && closing.is_ok()
        {
            closing = Err(err);
        }
    }

    closing
}

impl std::fmt::Debug for MigrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<&str> = self.slots.iter().map(|s| s.provider.name()).collect();
        f.debug_struct("MigrationManager")
            .field("config", &self.config)
            .field("providers", &providers)
            .finish()
    }
}
