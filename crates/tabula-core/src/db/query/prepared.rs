use crate::{
    db::{sql::Bindings, storage::Storage},
    obs,
    outcome::Outcome,
    traits::FieldValue,
};
use parking_lot::{Mutex, MutexGuard};

///
/// Compiled
///
/// A builder compiled once into SQL templates. Executing it binds the
/// variables of one run.
///

pub trait Compiled {
    type Output;

    /// Operation label used when errors are reported.
    const OPERATION: &'static str;

    fn execute(&self, storage: &Storage, bindings: &Bindings) -> Outcome<Self::Output>;

    /// Variables the compiled statements expect.
    fn variables(&self) -> Vec<&str>;
}

///
/// Prepared
///
/// Reusable compiled builder. At most one run is in flight per handle:
/// `new_run` blocks until the previous `PreparedRun` is dropped.
///

pub struct Prepared<'s, C> {
    storage: &'s Storage,
    compiled: C,
    bindings: Mutex<Bindings>,
}

impl<'s, C: Compiled> Prepared<'s, C> {
    pub(crate) fn new(storage: &'s Storage, compiled: C) -> Self {
        Self {
            storage,
            compiled,
            bindings: Mutex::new(Bindings::new()),
        }
    }

    /// Start a run with empty bindings.
    pub fn new_run(&self) -> PreparedRun<'_, C> {
        let mut bindings = self.bindings.lock();
        bindings.clear();

        PreparedRun {
            storage: self.storage,
            compiled: &self.compiled,
            bindings,
        }
    }

    /// Start a run if no other run is in flight.
    pub fn try_new_run(&self) -> Option<PreparedRun<'_, C>> {
        let mut bindings = self.bindings.try_lock()?;
        bindings.clear();

        Some(PreparedRun {
            storage: self.storage,
            compiled: &self.compiled,
            bindings,
        })
    }

    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.compiled.variables()
    }

    #[must_use]
    pub const fn compiled(&self) -> &C {
        &self.compiled
    }
}

///
/// PreparedRun
///

pub struct PreparedRun<'p, C> {
    storage: &'p Storage,
    compiled: &'p C,
    bindings: MutexGuard<'p, Bindings>,
}

impl<C: Compiled> PreparedRun<'_, C> {
    pub fn set_variable(&mut self, name: &str, value: impl FieldValue) -> &mut Self {
        self.bindings.insert(name.to_string(), value.to_value());
        self
    }

    pub fn run_with_error(&self) -> Outcome<C::Output> {
        self.compiled.execute(self.storage, &self.bindings)
    }

    pub fn run(&self) -> C::Output
    where
        C::Output: Default,
    {
        obs::collapse(self.storage.log(), C::OPERATION, self.run_with_error())
    }
}
