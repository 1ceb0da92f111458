//! Structured results carrying a best-effort value and every error raised
//! while producing it.

use crate::error::InternalError;

///
/// Outcome
///
/// Canonical result shape of every engine operation. A value may be present
/// alongside errors (partial success), and an empty value with no errors is a
/// valid "nothing matched" answer rather than a failure.
///

#[derive(Debug)]
#[must_use]
pub struct Outcome<T> {
    value: Option<T>,
    errors: Vec<InternalError>,
}

impl<T> Default for Outcome<T> {
    fn default() -> Self {
        Self {
            value: None,
            errors: Vec::new(),
        }
    }
}

impl<T> Outcome<T> {
    /// Empty outcome: no value, no errors.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            errors: Vec::new(),
        }
    }

    pub fn from_error(err: impl Into<InternalError>) -> Self {
        Self {
            value: None,
            errors: vec![err.into()],
        }
    }

    pub const fn from_errors(errors: Vec<InternalError>) -> Self {
        Self {
            value: None,
            errors,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn errors(&self) -> &[InternalError] {
        &self.errors
    }

    pub fn set_value(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn push_error(&mut self, err: impl Into<InternalError>) {
        self.errors.push(err.into());
    }

    pub fn extend_errors(&mut self, errors: impl IntoIterator<Item = InternalError>) {
        self.errors.extend(errors);
    }

    /// Absorb another outcome's errors and hand back its value.
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> Option<U> {
        let (value, errors) = other.into_parts();
        self.errors.extend(errors);
        value
    }

    /// Absorb a plain `Result`, recording the error if any.
    pub fn absorb_result<U>(&mut self, result: Result<U, InternalError>) -> Option<U> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: self.value.map(f),
            errors: self.errors,
        }
    }

    /// Replace the value type, keeping errors.
    pub fn with_value<U>(self, value: Option<U>) -> Outcome<U> {
        Outcome {
            value,
            errors: self.errors,
        }
    }

    #[must_use]
    pub fn into_parts(self) -> (Option<T>, Vec<InternalError>) {
        (self.value, self.errors)
    }

    /// Collapse to the bare value, discarding error detail.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Collapse to a `Result`: any recorded error wins over the value.
    pub fn into_result(self) -> Result<Option<T>, Vec<InternalError>> {
        if self.errors.is_empty() {
            Ok(self.value)
        } else {
            Err(self.errors)
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Collapse to the bare value or its default, discarding error detail.
    #[must_use]
    pub fn unwrap_or_default(self) -> T {
        self.value.unwrap_or_default()
    }
}

impl<T> Outcome<Option<T>> {
    pub fn flatten_value(self) -> Outcome<T> {
        Outcome {
            value: self.value.flatten(),
            errors: self.errors,
        }
    }
}

impl<T> From<Result<T, InternalError>> for Outcome<T> {
    fn from(result: Result<T, InternalError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => Self::from_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, ErrorOrigin};

    fn failure(message: &str) -> InternalError {
        InternalError::new(ErrorClass::Internal, ErrorOrigin::Query, message)
    }

    #[test]
    fn absorb_moves_errors_and_returns_value() {
        let mut outer: Outcome<()> = Outcome::new();
        let mut inner = Outcome::ok(7);
        inner.push_error(failure("inner"));

        let value = outer.absorb(inner);

        assert_eq!(value, Some(7));
        assert_eq!(outer.errors().len(), 1);
        assert!(!outer.is_success());
    }

    #[test]
    fn bare_collapse_discards_errors() {
        let mut outcome: Outcome<Vec<i64>> = Outcome::from_error(failure("boom"));
        outcome.push_error(failure("again"));

        assert!(outcome.unwrap_or_default().is_empty());
    }

    #[test]
    fn into_result_prefers_errors() {
        let mut outcome = Outcome::ok(1);
        outcome.push_error(failure("late"));

        let errors = outcome.into_result().expect_err("errors must win");
        assert_eq!(errors[0].message, "late");
    }
}
