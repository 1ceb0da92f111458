//! Runtime schema descriptors.
//!
//! Models are plain `'static` data produced by hand or by a code generator
//! upstream of the engine. Everything in `db` reads them; nothing mutates
//! them.
//!
//! - `EntityModel` describes one table level of a persisted type
//! - `ColumnModel` describes one column (scalar, relation or link)
//! - `Pyramid` mirrors the inheritance tree of registered types

pub mod column;
pub mod entity;
pub mod pyramid;

#[cfg(test)]
mod tests;

// re-exports
pub use column::{
    ColumnKind, ColumnModel, DEFAULT_VARCHAR_LEN, OnDelete, RelationTarget, SizeClass, SqlType,
};
pub use entity::{EntityModel, IntermediateModel};
pub use pyramid::{Pyramid, PyramidId, PyramidNode};
