use crate::{
    db::{
        predicate::Predicate,
        query::{Compiled, Prepared, QueryError, ids_template, links, read_ids, value_of},
        sql::{Bindings, StatementTemplate, emit},
        storage::Storage,
        translate::TranslateError,
    },
    error::InternalError,
    model::{ColumnKind, ColumnModel, EntityModel},
    obs,
    outcome::Outcome,
    traits::Entity,
};

///
/// Update
///
/// Writes the listed fields only. Without a filter every item addresses
/// its own row by primary key; with a filter the first item's values are
/// written to every matched row.
///

pub struct Update<'s, E> {
    storage: &'s Storage,
    items: Vec<E>,
    fields: Vec<String>,
    predicate: Option<Predicate>,
}

impl<'s, E: Entity> Update<'s, E> {
    #[must_use]
    pub const fn new(storage: &'s Storage, items: Vec<E>) -> Self {
        Self {
            storage,
            items,
            fields: Vec::new(),
            predicate: None,
        }
    }

    #[must_use]
    pub fn one(storage: &'s Storage, item: E) -> Self {
        Self::new(storage, vec![item])
    }

    #[must_use]
    pub fn field(mut self, name: &str) -> Self {
        self.fields.push(name.to_string());
        self
    }

    #[must_use]
    pub fn fields(mut self, names: &[&str]) -> Self {
        self.fields.extend(names.iter().map(|name| (*name).to_string()));
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(Predicate::conjoin(self.predicate.take(), predicate));
        self
    }

    pub fn compile(&self) -> Result<CompiledUpdate<E>, InternalError> {
        let plan = UpdatePlan::resolve(E::MODEL, &self.fields)?;
        let filter = self
            .predicate
            .as_ref()
            .map(|p| ids_template(self.storage, E::MODEL, p))
            .transpose()?;

        Ok(CompiledUpdate {
            plan,
            filter,
            items: self.items.clone(),
        })
    }

    /// Number of rows addressed.
    pub fn run_with_error(&self) -> Outcome<u64> {
        match self.compile() {
            Ok(compiled) => compiled.execute(self.storage, &Bindings::new()),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn run(&self) -> u64 {
        obs::collapse(self.storage.log(), "update", self.run_with_error())
    }

    pub fn prepare(&self) -> Result<Prepared<'s, CompiledUpdate<E>>, InternalError> {
        Ok(Prepared::new(self.storage, self.compile()?))
    }
}

///
/// UpdatePlan
///
/// Listed fields grouped by the table level that stores them.
///

#[derive(Clone, Debug)]
struct UpdatePlan {
    levels: Vec<(&'static EntityModel, Vec<&'static ColumnModel>)>,
    links: Vec<&'static str>,
}

impl UpdatePlan {
    fn resolve(model: &'static EntityModel, fields: &[String]) -> Result<Self, InternalError> {
        if fields.is_empty() {
            return Err(QueryError::NoFields.into());
        }

        let mut plan = Self {
            levels: Vec::new(),
            links: Vec::new(),
        };
        for field in fields {
            let (level, column) =
                model
                    .find_column(field)
                    .ok_or_else(|| TranslateError::UnknownField {
                        model: model.path,
                        field: field.clone(),
                    })?;
            if column.primary {
                return Err(QueryError::PrimaryKeyField {
                    field: field.clone(),
                }
                .into());
            }

            if matches!(column.kind, ColumnKind::Many { .. }) {
                if !plan.links.contains(&column.name) {
                    plan.links.push(column.name);
                }
                continue;
            }
            match plan.levels.iter_mut().find(|(l, _)| l.same(level)) {
                Some((_, columns)) if columns.iter().any(|c| c.name == column.name) => {}
                Some((_, columns)) => columns.push(column),
                None => plan.levels.push((level, vec![column])),
            }
        }

        Ok(plan)
    }

    /// Write `item`'s values to `ids`. Returns the largest affected-row
    /// count among the level statements, or `ids.len()` when only
    /// relations were written.
    fn apply<E: Entity>(
        &self,
        storage: &Storage,
        item: &E,
        ids: &[i64],
    ) -> Result<u64, InternalError> {
        let values = item.to_values();
        let mut affected = None;

        for (level, columns) in &self.levels {
            let level = *level;
            let assignments = columns
                .iter()
                .map(|column| Ok((column.name, value_of(level, &values, column.name)?)))
                .collect::<Result<Vec<_>, QueryError>>()?;
            let template =
                emit::update(storage.dialect(), level.table, &assignments, level.primary_key, ids);
            let count = storage.execute_template(template)?;
            affected = Some(affected.map_or(count, |n: u64| n.max(count)));
        }

        if !self.links.is_empty() {
            for id in ids {
                links::write(storage, item, *id, true, Some(self.links.as_slice()))?;
            }
        }

        Ok(affected.unwrap_or(ids.len() as u64))
    }
}

///
/// CompiledUpdate
///

pub struct CompiledUpdate<E> {
    plan: UpdatePlan,
    filter: Option<StatementTemplate>,
    items: Vec<E>,
}

impl<E: Entity> CompiledUpdate<E> {
    fn update(&self, storage: &Storage, bindings: &Bindings) -> Result<u64, InternalError> {
        if let Some(filter) = &self.filter {
            let Some(item) = self.items.first() else {
                return Ok(0);
            };
            let ids = read_ids(storage, E::MODEL.root().primary_key, &filter.bind(bindings)?)?;
            if ids.is_empty() {
                return Ok(0);
            }

            return self.plan.apply(storage, item, &ids);
        }

        let mut total = 0;
        for item in &self.items {
            if item.id() == 0 {
                return Err(QueryError::Unsaved {
                    model: E::MODEL.path,
                }
                .into());
            }
            total += self.plan.apply(storage, item, &[item.id()])?;
        }

        Ok(total)
    }
}

impl<E: Entity> Compiled for CompiledUpdate<E> {
    type Output = u64;

    const OPERATION: &'static str = "update";

    fn execute(&self, storage: &Storage, bindings: &Bindings) -> Outcome<u64> {
        storage.run_inside_transaction(|storage| Outcome::from(self.update(storage, bindings)))
    }

    fn variables(&self) -> Vec<&str> {
        self.filter
            .as_ref()
            .map(StatementTemplate::variables)
            .unwrap_or_default()
    }
}
