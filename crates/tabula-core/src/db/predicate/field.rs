use crate::{
    db::predicate::{Coercion, CompareOp, ComparePredicate, Operand, Predicate},
    traits::FieldValue,
    value::Value,
};

///
/// FieldRef
///
/// Typed handle on a member path used to build predicates. The path is a
/// dotted chain of field names; every segment but the last must name a
/// relation (`FieldRef::new("manager.name")`).
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FieldRef(&'static str);

impl FieldRef {
    #[must_use]
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    // ------------------------------------------------------------------
    // Comparison predicates
    // ------------------------------------------------------------------

    /// Equality; comparing against `None` becomes `IS NULL`.
    #[must_use]
    pub fn eq(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::Eq, value.to_value())
    }

    /// Case-insensitive text equality.
    #[must_use]
    pub fn eq_ci(self, value: impl FieldValue) -> Predicate {
        Predicate::Compare(
            ComparePredicate::new(self.0, CompareOp::Eq, value.to_value())
                .with_coercion(Coercion::TextCasefold),
        )
    }

    #[must_use]
    pub fn ne(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::Ne, value.to_value())
    }

    #[must_use]
    pub fn lt(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::Lt, value.to_value())
    }

    #[must_use]
    pub fn lte(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::Lte, value.to_value())
    }

    #[must_use]
    pub fn gt(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::Gt, value.to_value())
    }

    #[must_use]
    pub fn gte(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::Gte, value.to_value())
    }

    /// Membership test against a fixed list.
    #[must_use]
    pub fn in_list<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: FieldValue,
    {
        compare(self.0, CompareOp::In, list(values))
    }

    #[must_use]
    pub fn not_in<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: FieldValue,
    {
        compare(self.0, CompareOp::NotIn, list(values))
    }

    // ------------------------------------------------------------------
    // Text patterns
    // ------------------------------------------------------------------

    #[must_use]
    pub fn contains(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::Contains, value.to_value())
    }

    #[must_use]
    pub fn starts_with(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::StartsWith, value.to_value())
    }

    #[must_use]
    pub fn ends_with(self, value: impl FieldValue) -> Predicate {
        compare(self.0, CompareOp::EndsWith, value.to_value())
    }

    // ------------------------------------------------------------------
    // Null checks
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_null(self) -> Predicate {
        Predicate::IsNull {
            field: self.0.to_string(),
        }
    }

    #[must_use]
    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull {
            field: self.0.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Variables and raw fragments
    // ------------------------------------------------------------------

    /// Compare against a named variable bound by each prepared run.
    #[must_use]
    pub fn compare_var(self, op: CompareOp, name: &str) -> Predicate {
        Predicate::Compare(ComparePredicate::new(
            self.0,
            op,
            Operand::Variable(name.to_string()),
        ))
    }

    #[must_use]
    pub fn eq_var(self, name: &str) -> Predicate {
        self.compare_var(CompareOp::Eq, name)
    }

    /// Membership test against a list bound by each prepared run.
    #[must_use]
    pub fn in_var(self, name: &str) -> Predicate {
        self.compare_var(CompareOp::In, name)
    }

    /// Compare against a trusted SQL fragment emitted verbatim.
    #[must_use]
    pub fn compare_raw(self, op: CompareOp, sql: &str) -> Predicate {
        Predicate::Compare(ComparePredicate::new(
            self.0,
            op,
            Operand::Raw(sql.to_string()),
        ))
    }
}

impl AsRef<str> for FieldRef {
    fn as_ref(&self) -> &str {
        self.0
    }
}

impl std::ops::Deref for FieldRef {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

fn compare(field: &str, op: CompareOp, value: Value) -> Predicate {
    Predicate::Compare(ComparePredicate::new(field, op, value))
}

fn list<I, V>(values: I) -> Value
where
    I: IntoIterator<Item = V>,
    V: FieldValue,
{
    Value::List(values.into_iter().map(|v| v.to_value()).collect())
}
