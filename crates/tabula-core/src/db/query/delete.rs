use crate::{
    db::{
        predicate::Predicate,
        query::{Compiled, Prepared, ids_template, read_ids},
        sql::{Bindings, StatementTemplate, emit},
        storage::Storage,
    },
    error::InternalError,
    model::{ColumnKind, EntityModel, OnDelete},
    obs,
    outcome::Outcome,
    traits::Entity,
    value::Value,
};
use std::{collections::HashSet, marker::PhantomData};

///
/// Delete
///
/// Deletes matching rows with every level of their inheritance chain and
/// applies the relation policies of the models registered on the same
/// storage. A delete without filter or items matches every row.
///

pub struct Delete<'s, E> {
    storage: &'s Storage,
    target: Target,
    _marker: PhantomData<E>,
}

enum Target {
    Filter(Option<Predicate>),
    Ids(Vec<i64>),
}

impl<'s, E: Entity> Delete<'s, E> {
    #[must_use]
    pub const fn new(storage: &'s Storage) -> Self {
        Self {
            storage,
            target: Target::Filter(None),
            _marker: PhantomData,
        }
    }

    /// Delete the rows of stored `items`.
    #[must_use]
    pub fn items(storage: &'s Storage, items: &[E]) -> Self {
        Self::ids(storage, items.iter().map(Entity::id).collect())
    }

    #[must_use]
    pub const fn ids(storage: &'s Storage, ids: Vec<i64>) -> Self {
        Self {
            storage,
            target: Target::Ids(ids),
            _marker: PhantomData,
        }
    }

    /// Narrow the delete. Combined with AND; an id-based delete becomes a
    /// filter on those ids.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        let current = match self.target {
            Target::Filter(current) => current,
            Target::Ids(ids) => Some(Predicate::in_(
                E::MODEL.root().primary_key,
                ids.into_iter().map(Value::Int).collect(),
            )),
        };
        self.target = Target::Filter(Some(Predicate::conjoin(current, predicate)));
        self
    }

    pub fn compile(&self) -> Result<CompiledDelete<E>, InternalError> {
        let selection = match &self.target {
            Target::Ids(ids) => Selection::Ids(ids.clone()),
            Target::Filter(predicate) => {
                let predicate = predicate.clone().unwrap_or(Predicate::True);
                Selection::Template(ids_template(self.storage, E::MODEL, &predicate)?)
            }
        };

        Ok(CompiledDelete {
            selection,
            _marker: PhantomData,
        })
    }

    /// Number of entities deleted.
    pub fn run_with_error(&self) -> Outcome<u64> {
        match self.compile() {
            Ok(compiled) => compiled.execute(self.storage, &Bindings::new()),
            Err(err) => Outcome::from_error(err),
        }
    }

    #[must_use]
    pub fn run(&self) -> u64 {
        obs::collapse(self.storage.log(), "delete", self.run_with_error())
    }

    pub fn prepare(&self) -> Result<Prepared<'s, CompiledDelete<E>>, InternalError> {
        Ok(Prepared::new(self.storage, self.compile()?))
    }
}

///
/// CompiledDelete
///

pub struct CompiledDelete<E> {
    selection: Selection,
    _marker: PhantomData<fn() -> E>,
}

enum Selection {
    Ids(Vec<i64>),
    Template(StatementTemplate),
}

impl<E: Entity> CompiledDelete<E> {
    fn delete(&self, storage: &Storage, bindings: &Bindings) -> Result<u64, InternalError> {
        let ids = match &self.selection {
            Selection::Ids(ids) => ids.clone(),
            Selection::Template(template) => {
                read_ids(storage, E::MODEL.root().primary_key, &template.bind(bindings)?)?
            }
        };

        remove(storage, E::MODEL, &ids, &mut HashSet::new())
    }
}

impl<E: Entity> Compiled for CompiledDelete<E> {
    type Output = u64;

    const OPERATION: &'static str = "delete";

    fn execute(&self, storage: &Storage, bindings: &Bindings) -> Outcome<u64> {
        storage.run_inside_transaction(|storage| Outcome::from(self.delete(storage, bindings)))
    }

    fn variables(&self) -> Vec<&str> {
        match &self.selection {
            Selection::Ids(_) => Vec::new(),
            Selection::Template(template) => template.variables(),
        }
    }
}

/// Whether ids of `model` can be ids of `other`: one inherits the other.
fn shares_keys(model: &'static EntityModel, other: &'static EntityModel) -> bool {
    model.descends_from(other) || other.descends_from(model)
}

/// Delete `ids` of `model` in dependency order:
///
/// 1. intermediate rows naming the ids as owner or target
/// 2. rows referencing the ids through `OnDelete::Cascade`, recursively
/// 3. `OnDelete::SetNull` references cleared
/// 4. the rows themselves, descendant tables first and root last
///
/// `visited` holds `(root table, id)` pairs already handled so cyclic
/// cascades terminate. Returns the number of root rows deleted.
fn remove(
    storage: &Storage,
    model: &'static EntityModel,
    ids: &[i64],
    visited: &mut HashSet<(&'static str, i64)>,
) -> Result<u64, InternalError> {
    let root = model.root();
    let ids: Vec<i64> = ids
        .iter()
        .copied()
        .filter(|id| visited.insert((root.table, *id)))
        .collect();
    if ids.is_empty() {
        return Ok(0);
    }

    let dialect = storage.dialect();
    let registered = storage.models();

    // 1
    let mut link_tables = HashSet::new();
    for owner in &registered {
        for (_, column) in owner.many_columns() {
            let Some(link) = owner.intermediate(column.name) else {
                continue;
            };
            if !link_tables.insert(link.table) {
                continue;
            }
            if shares_keys(model, link.owner) {
                storage.execute_template(emit::delete(
                    dialect,
                    link.table,
                    &link.owner_column,
                    &ids,
                ))?;
            }
            if shares_keys(model, link.target) {
                storage.execute_template(emit::delete(
                    dialect,
                    link.table,
                    &link.target_column,
                    &ids,
                ))?;
            }
        }
    }

    // 2 and 3
    let mut targets = vec![model];
    targets.extend(
        registered
            .iter()
            .copied()
            .filter(|m| !m.same(model) && m.descends_from(model)),
    );
    let mut cascades = Vec::new();
    let mut set_nulls = Vec::new();
    let mut members_seen = HashSet::new();
    for owner in &registered {
        for &target in &targets {
            for (level, column) in owner.related_members(target) {
                let ColumnKind::Relation { on_delete, .. } = column.kind else {
                    continue;
                };
                if !members_seen.insert((level.table, column.name)) {
                    continue;
                }

                match on_delete {
                    OnDelete::Cascade => {
                        let template = emit::select_where_in(
                            dialect,
                            level.table,
                            &[level.primary_key],
                            column.name,
                            &ids,
                        );
                        let referencing =
                            read_ids(storage, level.primary_key, &template.into_statement()?)?;
                        cascades.push((level, referencing));
                    }
                    OnDelete::SetNull => {
                        set_nulls.push(emit::set_null(dialect, level.table, column.name, &ids));
                    }
                    OnDelete::Restrict | OnDelete::NoAction => {}
                }
            }
        }
    }
    for (level, referencing) in cascades {
        remove(storage, level, &referencing, visited)?;
    }
    for template in set_nulls {
        storage.execute_template(template)?;
    }

    // 4
    let mut descendants: Vec<&'static EntityModel> = registered
        .iter()
        .copied()
        .filter(|m| !m.same(model) && m.descends_from(model))
        .collect();
    descendants.sort_by_key(|m| std::cmp::Reverse(m.levels().len()));
    for descendant in descendants {
        storage.execute_template(emit::delete(
            dialect,
            descendant.table,
            descendant.primary_key,
            &ids,
        ))?;
    }

    let mut deleted = 0;
    for level in model.levels().into_iter().rev() {
        deleted = storage.execute_template(emit::delete(
            dialect,
            level.table,
            level.primary_key,
            &ids,
        ))?;
    }

    Ok(deleted)
}
