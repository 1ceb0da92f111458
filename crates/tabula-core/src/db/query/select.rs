use crate::{
    db::{
        predicate::Predicate,
        query::{Compiled, Prepared, links},
        sql::{Bindings, Direction, OrderTerm, SelectShape, StatementTemplate, emit},
        storage::Storage,
        translate::{TranslateError, Translator},
    },
    error::InternalError,
    obs,
    outcome::Outcome,
    traits::Entity,
    value::Row,
};
use std::marker::PhantomData;

///
/// Query
///
/// Select builder for one entity type. Repeated `filter` calls combine
/// with AND.
///

pub struct Query<'s, E> {
    storage: &'s Storage,
    predicate: Option<Predicate>,
    fields: Vec<String>,
    order: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
    _marker: PhantomData<E>,
}

impl<'s, E: Entity> Query<'s, E> {
    #[must_use]
    pub const fn new(storage: &'s Storage) -> Self {
        Self {
            storage,
            predicate: None,
            fields: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(Predicate::conjoin(self.predicate.take(), predicate));
        self
    }

    /// Project a column in `rows_with_error`. Entities are always loaded
    /// whole.
    #[must_use]
    pub fn field(mut self, name: &str) -> Self {
        self.fields.push(name.to_string());
        self
    }

    #[must_use]
    pub fn order_by(mut self, path: &str, direction: Direction) -> Self {
        self.order.push((path.to_string(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn compile(&self) -> Result<CompiledQuery<E>, TranslateError> {
        let mut translator = Translator::new(E::MODEL);
        let filter = self
            .predicate
            .as_ref()
            .map(|p| translator.filter(p))
            .transpose()?;
        let order = self
            .order
            .iter()
            .map(|(path, direction)| {
                Ok(OrderTerm {
                    column: translator.column(path)?.0,
                    direction: *direction,
                })
            })
            .collect::<Result<Vec<_>, TranslateError>>()?;
        let joins = translator.finish();

        let shape = SelectShape {
            order: &order,
            limit: self.limit,
            offset: self.offset,
            ..SelectShape::new(&joins, filter.as_ref())
        };

        Ok(CompiledQuery {
            template: emit::select(self.storage.dialect(), E::MODEL, &shape),
            _marker: PhantomData,
        })
    }

    pub fn run_with_error(&self) -> Outcome<Vec<E>> {
        match self.compile() {
            Ok(compiled) => compiled.execute(self.storage, &Bindings::new()),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn run(&self) -> Vec<E> {
        obs::collapse(self.storage.log(), "query", self.run_with_error())
    }

    /// First matching entity, if any.
    pub fn single_with_error(self) -> Outcome<Option<E>> {
        self.limit(1)
            .run_with_error()
            .map(|items| items.into_iter().next())
    }

    #[must_use]
    pub fn single(self) -> Option<E> {
        let storage = self.storage;
        obs::collapse(storage.log(), "single", self.single_with_error())
    }

    /// Raw rows, restricted to the projected fields when any were given.
    pub fn rows_with_error(&self) -> Outcome<Vec<Row>> {
        let compiled = match self.compile() {
            Ok(compiled) => compiled,
            Err(err) => return Outcome::from_error(err),
        };
        let columns = match self.projection() {
            Ok(columns) => columns,
            Err(err) => return Outcome::from_error(err),
        };

        let rows = compiled
            .template
            .bind(&Bindings::new())
            .map_err(InternalError::from)
            .and_then(|statement| self.storage.query(&statement));

        match rows {
            Ok(rows) if columns.is_empty() => Outcome::ok(rows),
            Ok(rows) => Outcome::ok(rows.iter().map(|row| row.project(&columns)).collect()),
            Err(err) => Outcome::from_error(err),
        }
    }

    fn projection(&self) -> Result<Vec<&'static str>, TranslateError> {
        self.fields
            .iter()
            .map(|name| {
                E::MODEL
                    .find_column(name)
                    .filter(|(_, column)| column.is_physical())
                    .map(|(_, column)| column.name)
                    .ok_or_else(|| TranslateError::UnknownField {
                        model: E::MODEL.path,
                        field: name.clone(),
                    })
            })
            .collect()
    }

    pub fn prepare(&self) -> Result<Prepared<'s, CompiledQuery<E>>, InternalError> {
        Ok(Prepared::new(self.storage, self.compile()?))
    }
}

///
/// CompiledQuery
///

pub struct CompiledQuery<E> {
    pub template: StatementTemplate,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Compiled for CompiledQuery<E> {
    type Output = Vec<E>;

    const OPERATION: &'static str = "query";

    fn execute(&self, storage: &Storage, bindings: &Bindings) -> Outcome<Vec<E>> {
        Outcome::from(load::<E>(storage, &self.template, bindings))
    }

    fn variables(&self) -> Vec<&str> {
        self.template.variables()
    }
}

fn load<E: Entity>(
    storage: &Storage,
    template: &StatementTemplate,
    bindings: &Bindings,
) -> Result<Vec<E>, InternalError> {
    let statement = template.bind(bindings)?;
    let mut items = storage
        .query(&statement)?
        .iter()
        .map(E::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    links::load(storage, &mut items)?;

    Ok(items)
}
