use crate::{
    error::InternalError,
    model::EntityModel,
    value::{DATE_FORMAT, DATETIME_FORMAT, Row, Value},
};
use chrono::{NaiveDate, NaiveDateTime};
use std::{any::Any, fmt::Debug};

/// ============================================================================
/// ENTITY
/// ============================================================================

///
/// Entity
///
/// A persisted domain type. Implementations are hand-written or generated
/// upstream; the engine only reads the model and moves values in and out.
///

pub trait Entity: Clone + Debug + Send + Sync + 'static {
    const MODEL: &'static EntityModel;

    /// Primary key value; `0` until the row is stored.
    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// Physical column values across every inheritance level, keyed by
    /// column name. Must include the primary key.
    fn to_values(&self) -> Vec<(&'static str, Value)>;

    fn from_row(row: &Row) -> Result<Self, InternalError>;

    /// Related ids of a multi-valued relation field.
    fn links(&self, _field: &str) -> Vec<i64> {
        Vec::new()
    }

    fn set_links(&mut self, _field: &str, _ids: Vec<i64>) {}
}

///
/// AnyEntity
///
/// Object-safe view of an entity used by the dynamic facade.
///

pub trait AnyEntity: Debug + Send + Sync {
    fn model(&self) -> &'static EntityModel;

    fn entity_id(&self) -> i64;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    fn clone_boxed(&self) -> BoxedEntity;
}

pub type BoxedEntity = Box<dyn AnyEntity>;

impl<E: Entity> AnyEntity for E {
    fn model(&self) -> &'static EntityModel {
        E::MODEL
    }

    fn entity_id(&self) -> i64 {
        self.id()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn clone_boxed(&self) -> BoxedEntity {
        Box::new(self.clone())
    }
}

impl Clone for BoxedEntity {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Downcast a boxed entity back to its concrete type.
#[must_use]
pub fn downcast<E: Entity>(entity: BoxedEntity) -> Option<E> {
    entity.into_any().downcast::<E>().ok().map(|boxed| *boxed)
}

/// ============================================================================
/// FIELD VALUES
/// ============================================================================

///
/// FieldValue
///
/// Conversion between Rust field types and `Value`. Decoding accepts the
/// representations backends without native types hand back (integers for
/// booleans, text for dates).
///

pub trait FieldValue {
    fn to_value(&self) -> Value;

    #[must_use]
    fn from_value(value: &Value) -> Option<Self>
    where
        Self: Sized;
}

impl FieldValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FieldValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }

    fn from_value(_value: &Value) -> Option<Self> {
        None
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as Self),
            _ => None,
        }
    }
}

impl FieldValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(v) => Some(*v),
            Value::DateTime(v) => Some(v.date()),
            Value::Text(v) => Self::parse_from_str(v, DATE_FORMAT).ok(),
            _ => None,
        }
    }
}

impl FieldValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(v) => Some(*v),
            Value::Date(v) => v.and_hms_opt(0, 0, 0),
            Value::Text(v) => Self::parse_from_str(v, DATETIME_FORMAT)
                .or_else(|_| Self::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f"))
                .ok(),
            _ => None,
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }

        T::from_value(value).map(Some)
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

// impl_int_field_value
macro_rules! impl_int_field_value {
    ( $( $type:ty ),* $(,)? ) => {
        $(
            impl FieldValue for $type {
                fn to_value(&self) -> Value {
                    Value::Int((*self).into())
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Int(v) => (*v).try_into().ok(),
                        Value::Bool(v) => Some(Self::from(*v)),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_int_field_value!(i16, i32, i64, u8, u16, u32);
