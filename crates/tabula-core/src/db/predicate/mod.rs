mod ast;
mod field;

#[cfg(test)]
mod tests;

pub use ast::{Coercion, CompareOp, ComparePredicate, Operand, Predicate};
pub use field::FieldRef;
