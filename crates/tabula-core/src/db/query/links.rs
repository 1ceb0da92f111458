//! Intermediate-table rows of multi-valued relations.

use crate::{
    db::{query::create::MAX_BULK_PARAMS, sql::emit, storage::Storage},
    error::InternalError,
    model::IntermediateModel,
    traits::Entity,
    value::Value,
};
use std::collections::BTreeMap;

fn intermediates<E: Entity>(fields: Option<&[&str]>) -> Vec<IntermediateModel> {
    E::MODEL
        .many_columns()
        .into_iter()
        .filter(|(_, column)| fields.is_none_or(|fields| fields.contains(&column.name)))
        .filter_map(|(_, column)| E::MODEL.intermediate(column.name))
        .collect()
}

/// Fill the multi-valued relations of `items`. Ids load in ascending order.
pub(super) fn load<E: Entity>(storage: &Storage, items: &mut [E]) -> Result<(), InternalError> {
    if items.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = items.iter().map(Entity::id).collect();

    for link in intermediates::<E>(None) {
        let template = emit::select_where_in(
            storage.dialect(),
            link.table,
            &[link.owner_column.as_str(), link.target_column.as_str()],
            &link.owner_column,
            &ids,
        );

        let mut grouped: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for row in storage.query_template(template)? {
            let owner: i64 = row.get(&link.owner_column)?;
            let target: i64 = row.get(&link.target_column)?;
            grouped.entry(owner).or_default().push(target);
        }

        for item in items.iter_mut() {
            let mut targets = grouped.remove(&item.id()).unwrap_or_default();
            targets.sort_unstable();
            item.set_links(link.field, targets);
        }
    }

    Ok(())
}

/// Insert the link rows of `item` under owner `id`. With `replace`,
/// existing rows of the written relations are removed first. `fields`
/// limits the relations touched.
pub(super) fn write<E: Entity>(
    storage: &Storage,
    item: &E,
    id: i64,
    replace: bool,
    fields: Option<&[&str]>,
) -> Result<(), InternalError> {
    for link in intermediates::<E>(fields) {
        if replace {
            storage.execute_template(emit::delete(
                storage.dialect(),
                link.table,
                &link.owner_column,
                &[id],
            ))?;
        }

        let mut targets = item.links(link.field);
        targets.sort_unstable();
        targets.dedup();
        if targets.is_empty() {
            continue;
        }

        let columns = [link.owner_column.as_str(), link.target_column.as_str()];
        for chunk in targets.chunks(MAX_BULK_PARAMS / columns.len()) {
            let rows: Vec<Vec<Value>> = chunk
                .iter()
                .map(|target| vec![Value::Int(id), Value::Int(*target)])
                .collect();
            storage.execute_template(emit::insert(
                storage.dialect(),
                link.table,
                &columns,
                &rows,
            ))?;
        }
    }

    Ok(())
}
