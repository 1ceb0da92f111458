use crate::{
    db::{
        query::{links, value_of},
        sql::emit,
        storage::Storage,
    },
    error::InternalError,
    model::EntityModel,
    obs,
    outcome::Outcome,
    traits::Entity,
    value::Value,
};

/// Upper bound on parameters in one multi-row insert.
pub(super) const MAX_BULK_PARAMS: usize = 999;

///
/// Create
///
/// Inserts entities level by level, parent table first, inside one
/// transaction. Generated keys are written back to the entities.
///

pub struct Create<'s, E> {
    storage: &'s Storage,
    items: Vec<E>,
    with_id: bool,
    bulk: bool,
}

impl<'s, E: Entity> Create<'s, E> {
    #[must_use]
    pub const fn new(storage: &'s Storage, items: Vec<E>) -> Self {
        Self {
            storage,
            items,
            with_id: false,
            bulk: false,
        }
    }

    #[must_use]
    pub fn one(storage: &'s Storage, item: E) -> Self {
        Self::new(storage, vec![item])
    }

    /// Insert the entities' own primary keys instead of generating them.
    #[must_use]
    pub const fn with_id(mut self, with_id: bool) -> Self {
        self.with_id = with_id;
        self
    }

    /// One multi-row statement per level instead of one per entity.
    #[must_use]
    pub const fn bulk(mut self, bulk: bool) -> Self {
        self.bulk = bulk;
        self
    }

    pub fn run_with_error(self) -> Outcome<Vec<E>> {
        let Self {
            storage,
            mut items,
            with_id,
            bulk,
        } = self;

        storage.run_inside_transaction(|storage| {
            let inserted = if bulk {
                insert_bulk(storage, &mut items, with_id)
            } else {
                items
                    .iter_mut()
                    .try_for_each(|item| insert_one(storage, item, with_id))
            };

            let result = inserted.and_then(|()| {
                items
                    .iter()
                    .try_for_each(|item| links::write(storage, item, item.id(), false, None))
            });

            match result {
                Ok(()) => Outcome::ok(items),
                Err(err) => Outcome::from_error(err),
            }
        })
    }

    #[must_use]
    pub fn run(self) -> Vec<E> {
        let storage = self.storage;
        obs::collapse(storage.log(), "create", self.run_with_error())
    }
}

/// Columns written for `level`. The root primary key is left to the
/// database when it is generated and no explicit id was requested.
fn insert_columns(level: &'static EntityModel, with_id: bool) -> Vec<&'static str> {
    level
        .own_columns()
        .filter(|column| !(column.primary && column.auto_increment && !with_id))
        .map(|column| column.name)
        .collect()
}

fn generates_key(level: &'static EntityModel, with_id: bool) -> bool {
    !with_id
        && level
            .own_columns()
            .any(|column| column.primary && column.auto_increment)
}

fn row_values(
    level: &'static EntityModel,
    columns: &[&'static str],
    values: &[(&'static str, Value)],
    id: i64,
) -> Result<Vec<Value>, InternalError> {
    columns
        .iter()
        .map(|column| {
            if *column == level.primary_key {
                Ok(Value::Int(id))
            } else {
                Ok(value_of(level, values, *column)?)
            }
        })
        .collect()
}

fn insert_one<E: Entity>(
    storage: &Storage,
    item: &mut E,
    with_id: bool,
) -> Result<(), InternalError> {
    let values = item.to_values();
    let mut id = item.id();

    for level in E::MODEL.levels() {
        let columns = insert_columns(level, with_id);
        let row = row_values(level, &columns, &values, id)?;
        let statement =
            emit::insert(storage.dialect(), level.table, &columns, &[row]).into_statement()?;

        if level.is_root() && generates_key(level, with_id) {
            id = storage.insert(&statement)?;
        } else {
            storage.execute(&statement)?;
        }
    }
    item.set_id(id);

    Ok(())
}

fn insert_bulk<E: Entity>(
    storage: &Storage,
    items: &mut [E],
    with_id: bool,
) -> Result<(), InternalError> {
    if items.is_empty() {
        return Ok(());
    }
    let values: Vec<_> = items.iter().map(Entity::to_values).collect();

    for level in E::MODEL.levels() {
        let columns = insert_columns(level, with_id);
        let generated = level.is_root() && generates_key(level, with_id);
        let per_chunk = (MAX_BULK_PARAMS / columns.len().max(1)).max(1);

        let mut start = 0;
        while start < items.len() {
            let end = (start + per_chunk).min(items.len());
            let rows = (start..end)
                .map(|i| row_values(level, &columns, &values[i], items[i].id()))
                .collect::<Result<Vec<_>, _>>()?;
            let statement =
                emit::insert(storage.dialect(), level.table, &columns, &rows).into_statement()?;

            if generated {
                // keys of one multi-row insert are consecutive
                let last = storage.insert(&statement)?;
                let first = last - i64::try_from(end - start - 1).unwrap_or_default();
                for (offset, item) in items[start..end].iter_mut().enumerate() {
                    item.set_id(first + i64::try_from(offset).unwrap_or_default());
                }
            } else {
                storage.execute(&statement)?;
            }
            start = end;
        }
    }

    Ok(())
}
