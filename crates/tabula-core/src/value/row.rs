use crate::{error::InternalError, traits::FieldValue, value::Value};

///
/// Row
///
/// Ordered `(column, value)` pairs as returned by a storage provider.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    #[must_use]
    pub const fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Decode one column into a typed field.
    pub fn get<T: FieldValue>(&self, column: &str) -> Result<T, InternalError> {
        let value = self
            .value(column)
            .ok_or_else(|| InternalError::decode(column, "column missing from row"))?;

        T::from_value(value).ok_or_else(|| {
            InternalError::decode(
                column,
                format!("unexpected {} value {value}", value.kind_name()),
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Keep only the named columns, in the requested order.
    #[must_use]
    pub fn project(&self, columns: &[&str]) -> Self {
        let columns = columns
            .iter()
            .filter_map(|name| {
                self.value(name)
                    .map(|value| ((*name).to_string(), value.clone()))
            })
            .collect();

        Self { columns }
    }
}
