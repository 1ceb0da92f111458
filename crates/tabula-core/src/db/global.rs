//! Process-wide database slot with explicit install and teardown.

use crate::{
    db::{Database, registry::RegistryError},
    obs::TARGET_REGISTRY,
};
use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL: RwLock<Option<Arc<Database>>> = RwLock::new(None);

/// Install `database` as the process-wide instance.
pub fn install(database: Database) -> Result<Arc<Database>, RegistryError> {
    let mut slot = GLOBAL.write();
    if slot.is_some() {
        return Err(RegistryError::AlreadyInstalled);
    }

    let database = Arc::new(database);
    *slot = Some(Arc::clone(&database));
    tracing::debug!(target: TARGET_REGISTRY, "global database installed");

    Ok(database)
}

pub fn get() -> Result<Arc<Database>, RegistryError> {
    GLOBAL.read().clone().ok_or(RegistryError::NotInstalled)
}

#[must_use]
pub fn is_installed() -> bool {
    GLOBAL.read().is_some()
}

/// Remove the installed instance and clear its registrations. Handles
/// still held elsewhere see an empty registry.
pub fn teardown() -> Option<Arc<Database>> {
    let database = GLOBAL.write().take()?;
    database.teardown();
    tracing::debug!(target: TARGET_REGISTRY, "global database torn down");

    Some(database)
}
