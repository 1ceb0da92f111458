use crate::value::Value;
use std::ops::{BitAnd, BitOr, Not};

///
/// Predicate AST
///
/// Pure, model-agnostic representation of a filter. Field paths are dotted
/// member chains (`manager.name`) resolved against a model only by the
/// translator; nothing here knows about tables, joins or SQL.
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum CompareOp {
    Eq = 0x01,
    Ne = 0x02,
    Lt = 0x03,
    Lte = 0x04,
    Gt = 0x05,
    Gte = 0x06,
    In = 0x07,
    NotIn = 0x08,
    Contains = 0x09,
    StartsWith = 0x0a,
    EndsWith = 0x0b,
}

impl CompareOp {
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn is_membership(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }
}

///
/// Coercion
///
/// Comparison policy applied on both sides of a comparison.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Coercion {
    #[default]
    Strict,
    /// Compare lower-cased text.
    TextCasefold,
}

///
/// Operand
///
/// Right-hand side of a comparison. Literals and variables always become
/// bound parameters; only `Raw` reaches the SQL text verbatim.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// Named slot filled at execution time by a prepared run.
    Variable(String),
    /// Trusted SQL fragment, emitted as-is.
    Raw(String),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

///
/// ComparePredicate
///

#[derive(Clone, Debug, PartialEq)]
pub struct ComparePredicate {
    pub field: String,
    pub op: CompareOp,
    pub operand: Operand,
    pub coercion: Coercion,
}

impl ComparePredicate {
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, operand: impl Into<Operand>) -> Self {
        Self {
            field: field.into(),
            op,
            operand: operand.into(),
            coercion: Coercion::Strict,
        }
    }

    #[must_use]
    pub const fn with_coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }
}

///
/// Predicate
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
    IsNull { field: String },
    IsNotNull { field: String },
}

impl Predicate {
    #[must_use]
    pub const fn and(preds: Vec<Self>) -> Self {
        Self::And(preds)
    }

    #[must_use]
    pub const fn or(preds: Vec<Self>) -> Self {
        Self::Or(preds)
    }

    #[must_use]
    pub fn negate(pred: Self) -> Self {
        Self::Not(Box::new(pred))
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Eq, value))
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Ne, value))
    }

    #[must_use]
    pub fn in_(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::In,
            Value::List(values),
        ))
    }

    /// Combine two optional filters with AND, flattening nested ANDs.
    #[must_use]
    pub fn conjoin(current: Option<Self>, next: Self) -> Self {
        match current {
            None => next,
            Some(Self::And(mut preds)) => {
                preds.push(next);
                Self::And(preds)
            }
            Some(pred) => Self::And(vec![pred, next]),
        }
    }

    /// Every dotted field path referenced by the predicate, in order.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::True | Self::False => {}
            Self::And(preds) | Self::Or(preds) => {
                for pred in preds {
                    pred.collect_fields(out);
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
            Self::Compare(cmp) => out.push(&cmp.field),
            Self::IsNull { field } | Self::IsNotNull { field } => out.push(field),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(vec![self, rhs])
    }
}

impl BitAnd for &Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Self) -> Self::Output {
        Predicate::And(vec![self.clone(), rhs.clone()])
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(vec![self, rhs])
    }
}

impl BitOr for &Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Self) -> Self::Output {
        Predicate::Or(vec![self.clone(), rhs.clone()])
    }
}

impl Not for Predicate {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}
