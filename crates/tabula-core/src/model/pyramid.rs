use crate::{db::registry::RegistryError, model::EntityModel};
use std::collections::HashMap;

///
/// PyramidId
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PyramidId(u32);

impl PyramidId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

///
/// PyramidNode
///

#[derive(Clone, Debug)]
pub struct PyramidNode {
    pub type_path: &'static str,
    pub model: &'static EntityModel,
    pub alias: Option<&'static str>,
    pub parent: Option<PyramidId>,
    pub children: Vec<PyramidId>,
    root: PyramidId,
}

impl PyramidNode {
    /// Root of the inheritance tree this node belongs to. Fixed at insertion.
    #[must_use]
    pub const fn root(&self) -> PyramidId {
        self.root
    }
}

///
/// Pyramid
///
/// Arena mirroring the inheritance tree of registered types. Parents must be
/// inserted before their children, so every node reaches a root.
///

#[derive(Debug, Default)]
pub struct Pyramid {
    nodes: Vec<PyramidNode>,
    by_path: HashMap<&'static str, PyramidId>,
}

impl Pyramid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        model: &'static EntityModel,
        alias: Option<&'static str>,
    ) -> Result<PyramidId, RegistryError> {
        for path in std::iter::once(model.path).chain(alias) {
            if self.by_path.contains_key(path) {
                return Err(RegistryError::AlreadyRegistered {
                    path: path.to_string(),
                });
            }
        }

        let parent = match model.parent {
            Some(parent) => Some(self.find(parent.path).ok_or_else(|| {
                RegistryError::ParentNotRegistered {
                    path: model.path.to_string(),
                    parent: parent.path.to_string(),
                }
            })?),
            None => None,
        };

        let id = PyramidId(
            u32::try_from(self.nodes.len())
                .map_err(|_| RegistryError::Capacity { len: self.nodes.len() })?,
        );
        let root = parent.map_or(id, |p| self.nodes[p.index()].root);

        self.nodes.push(PyramidNode {
            type_path: model.path,
            model,
            alias,
            parent,
            children: Vec::new(),
            root,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        self.by_path.insert(model.path, id);
        if let Some(alias) = alias {
            self.by_path.insert(alias, id);
        }

        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: PyramidId) -> Option<&PyramidNode> {
        self.nodes.get(id.index())
    }

    /// Node registered under `path` or under its alias.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<PyramidId> {
        self.by_path.get(path).copied()
    }

    /// Ancestors of `id`, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: PyramidId) -> Vec<PyramidId> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.get(parent).and_then(|n| n.parent);
        }

        out
    }

    /// Every node below `id`, depth first.
    #[must_use]
    pub fn descendants(&self, id: PyramidId) -> Vec<PyramidId> {
        let mut out = Vec::new();
        let mut stack: Vec<PyramidId> = self
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }

        out
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // insertion rejects arenas beyond u32::MAX nodes
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (PyramidId, &PyramidNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (PyramidId(i as u32), node))
    }
}
