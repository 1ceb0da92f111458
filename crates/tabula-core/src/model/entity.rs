use crate::model::{ColumnKind, ColumnModel};
use std::fmt;

///
/// EntityModel
///
/// One table level of a persisted type. A type with a parent is stored
/// across several tables sharing the same primary key value, one per level
/// of its inheritance chain.
///

pub struct EntityModel {
    /// Fully-qualified type path (registry key and diagnostics).
    pub path: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    /// Columns declared at this level only.
    pub columns: &'static [ColumnModel],
    pub parent: Option<&'static Self>,
}

impl EntityModel {
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        self.path == other.path
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[must_use]
    pub fn root(&'static self) -> &'static Self {
        let mut current = self;
        while let Some(parent) = current.parent {
            current = parent;
        }
        current
    }

    /// Inheritance chain, root first, ending with `self`.
    #[must_use]
    pub fn levels(&'static self) -> Vec<&'static Self> {
        let mut levels = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent {
            levels.push(parent);
            current = parent;
        }
        levels.reverse();

        levels
    }

    /// Whether `ancestor` is `self` or one of its parents.
    #[must_use]
    pub fn descends_from(&'static self, ancestor: &Self) -> bool {
        self.levels().iter().any(|level| level.same(ancestor))
    }

    /// Physical columns declared at this level.
    pub fn own_columns(&self) -> impl Iterator<Item = &'static ColumnModel> + use<> {
        self.columns.iter().filter(|c| c.is_physical())
    }

    /// Find a column by stored name or predicate field name, searching this
    /// level then its ancestors. Returns the declaring level.
    #[must_use]
    pub fn find_column(
        &'static self,
        name: &str,
    ) -> Option<(&'static Self, &'static ColumnModel)> {
        let mut current = Some(self);
        while let Some(level) = current {
            if let Some(column) = level
                .columns
                .iter()
                .find(|c| c.name == name || c.field_name() == name)
            {
                return Some((level, column));
            }
            current = level.parent;
        }

        None
    }

    #[must_use]
    pub fn primary_column(&'static self) -> Option<&'static ColumnModel> {
        self.find_column(self.primary_key).map(|(_, column)| column)
    }

    /// Multi-valued relations across every level.
    #[must_use]
    pub fn many_columns(&'static self) -> Vec<(&'static Self, &'static ColumnModel)> {
        self.levels()
            .into_iter()
            .flat_map(|level| {
                level
                    .columns
                    .iter()
                    .filter(|c| matches!(c.kind, ColumnKind::Many { .. }))
                    .map(move |c| (level, c))
            })
            .collect()
    }

    /// Relation and multi-valued columns, across every level, whose target
    /// is `related` or one of its ancestors. Nearer levels come first and
    /// shadow ancestor columns of the same name.
    #[must_use]
    pub fn related_members(
        &'static self,
        related: &'static Self,
    ) -> Vec<(&'static Self, &'static ColumnModel)> {
        let mut out: Vec<(&'static Self, &'static ColumnModel)> = Vec::new();
        for level in self.levels().into_iter().rev() {
            for column in level.columns {
                if let Some(target) = column.relation_target()
                    && related.descends_from(target)
                    && !out.iter().any(|(_, c)| c.name == column.name)
                {
                    out.push((level, column));
                }
            }
        }

        out
    }

    /// Intermediate-table descriptor for a multi-valued relation.
    #[must_use]
    pub fn intermediate(&'static self, field: &str) -> Option<IntermediateModel> {
        let (level, column) = self.find_column(field)?;
        let ColumnKind::Many { target, table } = column.kind else {
            return None;
        };
        let target = target.model();

        Some(IntermediateModel::new(table, level, target, column.name))
    }
}

impl fmt::Debug for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityModel")
            .field("path", &self.path)
            .field("table", &self.table)
            .field("parent", &self.parent.map(|p| p.path))
            .finish_non_exhaustive()
    }
}

///
/// IntermediateModel
///
/// Derived descriptor of the join table behind a multi-valued relation.
/// Both columns are foreign keys; the pair is the primary key.
///

#[derive(Clone, Debug)]
pub struct IntermediateModel {
    pub table: &'static str,
    pub field: &'static str,
    pub owner: &'static EntityModel,
    pub owner_column: String,
    pub target: &'static EntityModel,
    pub target_column: String,
}

impl IntermediateModel {
    fn new(
        table: &'static str,
        owner: &'static EntityModel,
        target: &'static EntityModel,
        field: &'static str,
    ) -> Self {
        let owner_column = format!("{}_id", owner.table);
        let target_column = if owner.table == target.table {
            format!("{}_target_id", target.table)
        } else {
            format!("{}_id", target.table)
        };

        Self {
            table,
            field,
            owner,
            owner_column,
            target,
            target_column,
        }
    }
}
