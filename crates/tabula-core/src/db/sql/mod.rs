//! SQL emission: dialects, statement templates and emitters.

pub mod dialect;
pub mod emit;
mod render;
mod statement;


pub use dialect::{
    Dialect, GenericDialect, MssqlDialect, Placeholders, PostgresDialect, SqliteDialect,
};
pub use emit::{Direction, OrderTerm, SelectShape};
pub use statement::{
    Bindings, BoundParam, ParamSlot, ParamWriter, PatternKind, SlotSource, Statement,
    StatementTemplate, escape_like,
};
