use crate::{
    db::{
        predicate::Predicate,
        query::{Compiled, Prepared},
        sql::{Bindings, StatementTemplate, emit},
        storage::Storage,
        translate::{TranslateError, Translator},
    },
    error::InternalError,
    obs,
    outcome::Outcome,
    traits::Entity,
};
use std::marker::PhantomData;

///
/// Exist
///
/// Existence and count checks. Always a single `COUNT` statement.
///

pub struct Exist<'s, E> {
    storage: &'s Storage,
    predicate: Option<Predicate>,
    _marker: PhantomData<E>,
}

impl<'s, E: Entity> Exist<'s, E> {
    #[must_use]
    pub const fn new(storage: &'s Storage) -> Self {
        Self {
            storage,
            predicate: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(Predicate::conjoin(self.predicate.take(), predicate));
        self
    }

    pub fn compile(&self) -> Result<CompiledExist, TranslateError> {
        let mut translator = Translator::new(E::MODEL);
        let filter = self
            .predicate
            .as_ref()
            .map(|p| translator.filter(p))
            .transpose()?;
        let joins = translator.finish();

        Ok(CompiledExist {
            template: emit::count(self.storage.dialect(), E::MODEL, &joins, filter.as_ref()),
        })
    }

    pub fn count_with_error(&self) -> Outcome<u64> {
        match self.compile() {
            Ok(compiled) => compiled.count(self.storage, &Bindings::new()),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        obs::collapse(self.storage.log(), "count", self.count_with_error())
    }

    pub fn run_with_error(&self) -> Outcome<bool> {
        self.count_with_error().map(|n| n > 0)
    }

    #[must_use]
    pub fn run(&self) -> bool {
        obs::collapse(self.storage.log(), "exist", self.run_with_error())
    }

    pub fn prepare(&self) -> Result<Prepared<'s, CompiledExist>, InternalError> {
        Ok(Prepared::new(self.storage, self.compile()?))
    }
}

///
/// CompiledExist
///

#[derive(Clone, Debug)]
pub struct CompiledExist {
    pub template: StatementTemplate,
}

impl CompiledExist {
    fn count(&self, storage: &Storage, bindings: &Bindings) -> Outcome<u64> {
        let result = self
            .template
            .bind(bindings)
            .map_err(InternalError::from)
            .and_then(|statement| storage.count(&statement));

        Outcome::from(result)
    }
}

impl Compiled for CompiledExist {
    type Output = bool;

    const OPERATION: &'static str = "exist";

    fn execute(&self, storage: &Storage, bindings: &Bindings) -> Outcome<bool> {
        self.count(storage, bindings).map(|n| n > 0)
    }

    fn variables(&self) -> Vec<&str> {
        self.template.variables()
    }
}
