//! Reentrant, reference-counted transactions.
//!
//! One storage has at most one physical transaction. Nested `begin` calls
//! join it and bump a counter; the physical commit happens when the counter
//! returns to zero. A rollback at any depth ends the whole transaction.
//!
//! The coordinator lock is held across the physical begin, commit and
//! rollback calls, so no thread observes a state that disagrees with the
//! backend.

#[cfg(test)]
mod tests;

use crate::{
    db::storage::{Storage, StorageError, StorageProvider},
    error::ErrorClass,
    obs::TARGET_TXN,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error as ThisError;

///
/// TransactionError
///

#[derive(Debug, ThisError)]
pub enum TransactionError {
    #[error("transaction already ended")]
    AlreadyEnded,

    #[error("cannot begin transaction: {0}")]
    Begin(StorageError),

    #[error("commit failed: {0}")]
    Commit(StorageError),

    #[error("rollback failed: {0}")]
    Rollback(StorageError),
}

impl TransactionError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyEnded => ErrorClass::Conflict,
            Self::Begin(_) | Self::Commit(_) | Self::Rollback(_) => ErrorClass::Internal,
        }
    }
}

///
/// TransactionStatus
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionStatus {
    /// Physical commit done.
    Committed,
    /// Counter decremented; outer participants still hold the transaction.
    Pending { depth: u32 },
    RolledBack,
    /// The transaction was already ended by another participant.
    AlreadyEnded,
}

///
/// TransactionCoordinator
///

#[derive(Debug, Default)]
pub struct TransactionCoordinator {
    state: Mutex<Option<ActiveTransaction>>,
    next_id: AtomicU64,
}

#[derive(Clone, Copy, Debug)]
struct ActiveTransaction {
    id: u64,
    depth: u32,
}

impl TransactionCoordinator {
    /// Open the physical transaction or join the active one.
    /// Returns the transaction id and the new depth.
    pub(crate) fn begin(
        &self,
        provider: &dyn StorageProvider,
    ) -> Result<(u64, u32), TransactionError> {
        let mut state = self.state.lock();

        if let Some(active) = state.as_mut() {
            active.depth += 1;
            tracing::debug!(target: TARGET_TXN, id = active.id, depth = active.depth, "join");

            return Ok((active.id, active.depth));
        }

        provider.begin().map_err(TransactionError::Begin)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        *state = Some(ActiveTransaction { id, depth: 1 });
        tracing::debug!(target: TARGET_TXN, id, "begin");

        Ok((id, 1))
    }

    /// Leave the transaction, committing physically at depth zero. A failed
    /// physical commit still ends the transaction.
    pub(crate) fn commit(
        &self,
        provider: &dyn StorageProvider,
        id: u64,
    ) -> Result<TransactionStatus, TransactionError> {
        let mut state = self.state.lock();

        let Some(active) = state.as_mut().filter(|active| active.id == id) else {
            return Ok(TransactionStatus::AlreadyEnded);
        };
        if active.depth > 1 {
            active.depth -= 1;
            return Ok(TransactionStatus::Pending {
                depth: active.depth,
            });
        }

        *state = None;
        match provider.commit() {
            Ok(()) => {
                tracing::debug!(target: TARGET_TXN, id, "commit");
                Ok(TransactionStatus::Committed)
            }
            Err(err) => {
                tracing::warn!(target: TARGET_TXN, id, error = %err, "commit failed");
                Err(TransactionError::Commit(err))
            }
        }
    }

    /// End the transaction regardless of depth.
    pub(crate) fn rollback(
        &self,
        provider: &dyn StorageProvider,
        id: u64,
    ) -> Result<TransactionStatus, TransactionError> {
        let mut state = self.state.lock();

        if !state.is_some_and(|active| active.id == id) {
            return Ok(TransactionStatus::AlreadyEnded);
        }

        *state = None;
        match provider.rollback() {
            Ok(()) => {
                tracing::debug!(target: TARGET_TXN, id, "rollback");
                Ok(TransactionStatus::RolledBack)
            }
            Err(err) => {
                tracing::warn!(target: TARGET_TXN, id, error = %err, "rollback failed");
                Err(TransactionError::Rollback(err))
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Current nesting depth; zero when no transaction is open.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.state.lock().map_or(0, |active| active.depth)
    }
}

///
/// Transaction
///
/// Handle of one participant. Dropping it without `commit` rolls back.
///

#[derive(Debug)]
#[must_use = "dropping a transaction rolls it back"]
pub struct Transaction<'a> {
    storage: &'a Storage,
    id: u64,
    depth: u32,
    done: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(storage: &'a Storage) -> Result<Self, TransactionError> {
        let (id, depth) = storage.coordinator().begin(storage.provider())?;

        Ok(Self {
            storage,
            id,
            depth,
            done: false,
        })
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Depth at which this participant joined; `1` for the outermost.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    pub fn commit(mut self) -> Result<TransactionStatus, TransactionError> {
        self.done = true;
        self.storage
            .coordinator()
            .commit(self.storage.provider(), self.id)
    }

    pub fn rollback(mut self) -> Result<TransactionStatus, TransactionError> {
        self.done = true;
        self.storage
            .coordinator()
            .rollback(self.storage.provider(), self.id)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        tracing::debug!(target: TARGET_TXN, id = self.id, "dropped without commit");
        if let Err(err) = self
            .storage
            .coordinator()
            .rollback(self.storage.provider(), self.id)
        {
            tracing::warn!(target: TARGET_TXN, id = self.id, error = %err, "rollback on drop failed");
        }
    }
}
