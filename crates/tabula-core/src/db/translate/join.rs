use crate::{ROOT_ALIAS, model::EntityModel};

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    /// Inheritance level of the query root; the row always exists.
    Inner,
    /// Relation hop or level of a related type; the row may be absent.
    LeftOuter,
}

///
/// JoinNode
///
/// One table in the FROM clause. `key` identifies the member path that
/// introduced it, so the same path always maps to the same alias.
///

#[derive(Clone, Debug)]
pub struct JoinNode {
    pub key: String,
    pub alias: String,
    pub table: &'static str,
    pub kind: JoinKind,
    /// `left_alias.left_column = alias.right_column`; `None` for the root.
    pub on: Option<JoinOn>,
}

///
/// JoinOn
///

#[derive(Clone, Debug)]
pub struct JoinOn {
    pub left_alias: String,
    pub left_column: String,
    pub right_column: String,
}

///
/// JoinGraph
///
/// Ordered, deduplicated set of tables reached by a translation. Aliases are
/// `t0`, `t1`, ... in order of first use.
///

#[derive(Clone, Debug)]
pub struct JoinGraph {
    nodes: Vec<JoinNode>,
    collection: bool,
}

impl JoinGraph {
    /// Graph containing the root table and the inner joins of its
    /// inheritance levels.
    #[must_use]
    pub fn for_model(model: &'static EntityModel) -> Self {
        let levels = model.levels();
        let root = levels[0];

        let mut graph = Self {
            nodes: vec![JoinNode {
                key: String::new(),
                alias: ROOT_ALIAS.to_string(),
                table: root.table,
                kind: JoinKind::Inner,
                on: None,
            }],
            collection: false,
        };
        for level in &levels[1..] {
            graph.ensure(
                &level_key("", level),
                level.table,
                JoinKind::Inner,
                ROOT_ALIAS,
                root.primary_key,
                level.primary_key,
            );
        }

        graph
    }

    /// Return the alias for `key`, adding a join node the first time.
    pub(crate) fn ensure(
        &mut self,
        key: &str,
        table: &'static str,
        kind: JoinKind,
        left_alias: &str,
        left_column: &str,
        right_column: &str,
    ) -> String {
        if let Some(node) = self.nodes.iter().find(|n| n.key == key) {
            return node.alias.clone();
        }

        let alias = format!("t{}", self.nodes.len());
        self.nodes.push(JoinNode {
            key: key.to_string(),
            alias: alias.clone(),
            table,
            kind,
            on: Some(JoinOn {
                left_alias: left_alias.to_string(),
                left_column: left_column.to_string(),
                right_column: right_column.to_string(),
            }),
        });

        alias
    }

    pub(crate) const fn mark_collection(&mut self) {
        self.collection = true;
    }

    /// Whether a multi-valued hop may duplicate root rows.
    #[must_use]
    pub const fn has_collection(&self) -> bool {
        self.collection
    }

    #[must_use]
    pub fn root(&self) -> &JoinNode {
        &self.nodes[0]
    }

    /// Joined tables after the root, in emission order.
    #[must_use]
    pub fn joins(&self) -> &[JoinNode] {
        &self.nodes[1..]
    }

    #[must_use]
    pub fn alias_of(&self, key: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.key == key)
            .map(|n| n.alias.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Key of an inheritance level joined under the node `parent_key`.
pub(crate) fn level_key(parent_key: &str, level: &EntityModel) -> String {
    format!("{parent_key}@{}", level.table)
}

/// Key of a relation hop from the node `parent_key`.
pub(crate) fn hop_key(parent_key: &str, field: &str) -> String {
    if parent_key.is_empty() {
        field.to_string()
    } else {
        format!("{parent_key}.{field}")
    }
}
