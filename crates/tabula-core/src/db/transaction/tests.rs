use super::*;
use crate::{
    db::sql::{Dialect, SqliteDialect, Statement},
    outcome::Outcome,
    value::Row,
};
use std::sync::{Arc, atomic::AtomicU32};

///
/// RecordingProvider
///

#[derive(Default)]
struct Counters {
    begins: AtomicU32,
    commits: AtomicU32,
    rollbacks: AtomicU32,
}

struct RecordingProvider {
    counters: Arc<Counters>,
    fail_commit: bool,
}

impl StorageProvider for RecordingProvider {
    fn dialect(&self) -> &dyn Dialect {
        &SqliteDialect
    }

    fn database_name(&self) -> &str {
        "recording"
    }

    fn connect(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn execute(&self, _statement: &Statement) -> Result<u64, StorageError> {
        Ok(0)
    }

    fn query(&self, _statement: &Statement) -> Result<Vec<Row>, StorageError> {
        Ok(Vec::new())
    }

    fn insert(&self, _statement: &Statement) -> Result<i64, StorageError> {
        Ok(0)
    }

    fn begin(&self) -> Result<(), StorageError> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(StorageError::Execution {
                sql: "COMMIT".to_string(),
                message: "disk full".to_string(),
            });
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), StorageError> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn recording_storage(fail_commit: bool) -> (Storage, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let provider = RecordingProvider {
        counters: Arc::clone(&counters),
        fail_commit,
    };

    (Storage::new(provider), counters)
}

fn count(counter: &AtomicU32) -> u32 {
    counter.load(Ordering::SeqCst)
}

#[test]
fn nested_begin_joins_the_same_transaction() {
    let (storage, counters) = recording_storage(false);

    let outer = storage.begin().unwrap();
    let inner = storage.begin().unwrap();

    assert_eq!(outer.id(), inner.id());
    assert_eq!(inner.depth(), 2);
    assert_eq!(count(&counters.begins), 1);

    inner.commit().unwrap();
    outer.commit().unwrap();
}

#[test]
fn commit_happens_when_counter_returns_to_zero() {
    let (storage, counters) = recording_storage(false);

    let outer = storage.begin().unwrap();
    let inner = storage.begin().unwrap();

    assert_eq!(
        inner.commit().unwrap(),
        TransactionStatus::Pending { depth: 1 }
    );
    assert!(storage.coordinator().is_active());
    assert_eq!(count(&counters.commits), 0);

    assert_eq!(outer.commit().unwrap(), TransactionStatus::Committed);
    assert!(!storage.coordinator().is_active());
    assert_eq!(count(&counters.commits), 1);
}

#[test]
fn rollback_at_any_depth_ends_the_transaction() {
    let (storage, counters) = recording_storage(false);

    let outer = storage.begin().unwrap();
    let inner = storage.begin().unwrap();

    assert_eq!(inner.rollback().unwrap(), TransactionStatus::RolledBack);
    assert!(!storage.coordinator().is_active());
    assert_eq!(storage.coordinator().depth(), 0);

    assert_eq!(outer.commit().unwrap(), TransactionStatus::AlreadyEnded);
    assert_eq!(count(&counters.commits), 0);
    assert_eq!(count(&counters.rollbacks), 1);
}

#[test]
fn second_rollback_is_a_no_op() {
    let (storage, counters) = recording_storage(false);

    let outer = storage.begin().unwrap();
    let inner = storage.begin().unwrap();

    inner.rollback().unwrap();
    assert_eq!(outer.rollback().unwrap(), TransactionStatus::AlreadyEnded);
    assert_eq!(count(&counters.rollbacks), 1);
}

#[test]
fn dropping_an_uncompleted_transaction_rolls_back() {
    let (storage, counters) = recording_storage(false);

    {
        let _tx = storage.begin().unwrap();
    }

    assert!(!storage.coordinator().is_active());
    assert_eq!(count(&counters.rollbacks), 1);
}

#[test]
fn failed_commit_still_ends_the_transaction() {
    let (storage, counters) = recording_storage(true);

    let tx = storage.begin().unwrap();
    let err = tx.commit().unwrap_err();

    assert!(matches!(err, TransactionError::Commit(_)));
    assert!(!storage.coordinator().is_active());
    assert_eq!(count(&counters.rollbacks), 0);

    // a new transaction gets a fresh id
    let next = storage.begin().unwrap();
    assert_eq!(next.depth(), 1);
    assert_eq!(count(&counters.begins), 2);
    drop(next);
}

#[test]
fn stale_handle_does_not_touch_a_newer_transaction() {
    let (storage, counters) = recording_storage(false);

    let first = storage.begin().unwrap();
    let first_id = first.id();
    first.commit().unwrap();

    let second = storage.begin().unwrap();
    assert_ne!(second.id(), first_id);

    let status = storage
        .coordinator()
        .commit(storage.provider(), first_id)
        .unwrap();
    assert_eq!(status, TransactionStatus::AlreadyEnded);
    assert!(storage.coordinator().is_active());

    second.commit().unwrap();
    assert_eq!(count(&counters.commits), 2);
}

#[test]
fn run_inside_transaction_commits_on_success() {
    let (storage, counters) = recording_storage(false);

    let outcome = storage.run_inside_transaction(|_| Outcome::ok(7));

    assert!(outcome.is_success());
    assert_eq!(outcome.value(), Some(&7));
    assert_eq!(count(&counters.commits), 1);
}

#[test]
fn run_inside_transaction_rolls_back_on_errors() {
    let (storage, counters) = recording_storage(false);

    let outcome: Outcome<i32> = storage.run_inside_transaction(|_| {
        Outcome::from_error(TransactionError::AlreadyEnded)
    });

    assert!(!outcome.is_success());
    assert_eq!(count(&counters.commits), 0);
    assert_eq!(count(&counters.rollbacks), 1);
}

#[test]
fn run_inside_transaction_reports_commit_failure() {
    let (storage, _) = recording_storage(true);

    let outcome = storage.run_inside_transaction(|_| Outcome::ok(()));

    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].origin, crate::error::ErrorOrigin::Transaction);
}

#[test]
fn nested_run_reports_rollback_by_inner_participant() {
    let (storage, _) = recording_storage(false);

    let outcome = storage.run_inside_transaction(|storage| {
        let inner = storage.begin().unwrap();
        inner.rollback().unwrap();
        Outcome::ok(())
    });

    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].class, ErrorClass::Conflict);
}

#[test]
fn concurrent_participants_share_one_physical_transaction() {
    let (storage, counters) = recording_storage(false);
    let storage = Arc::new(storage);

    let outer = storage.begin().unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let storage = Arc::clone(&storage);
            std::thread::spawn(move || {
                let tx = storage.begin().unwrap();
                tx.commit().unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(matches!(
            handle.join().unwrap(),
            TransactionStatus::Pending { .. }
        ));
    }

    assert_eq!(outer.commit().unwrap(), TransactionStatus::Committed);
    assert_eq!(count(&counters.begins), 1);
    assert_eq!(count(&counters.commits), 1);
}
