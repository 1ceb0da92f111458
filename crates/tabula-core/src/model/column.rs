use crate::{model::EntityModel, value::Value};
use chrono::NaiveDate;
use std::fmt;

///
/// SqlType
///
/// Abstract column type. Dialects map each one to a concrete type name.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SqlType {
    SmallInt,
    Int,
    BigInt,
    Float,
    Bool,
    Date,
    DateTime,
    Text,
}

impl SqlType {
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::SmallInt | Self::Int | Self::BigInt | Self::Float)
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text)
    }

    /// Value substituted for NULL when a nullable column of this type is
    /// compared against a literal. Text has no substitute.
    #[must_use]
    pub fn coalesce_default(self) -> Option<Value> {
        match self {
            Self::SmallInt | Self::Int | Self::BigInt => Some(Value::Int(0)),
            Self::Float => Some(Value::Float(0.0)),
            Self::Bool => Some(Value::Bool(false)),
            Self::Date => NaiveDate::from_ymd_opt(1, 1, 1).map(Value::Date),
            Self::DateTime => NaiveDate::from_ymd_opt(1, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(Value::DateTime),
            Self::Text => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Text => "text",
        };
        write!(f, "{label}")
    }
}

///
/// SizeClass
///
/// Storage size hint for text columns; ignored for other types.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SizeClass {
    Bounded(u32),
    #[default]
    MaxVarChar,
    Text,
    MediumText,
    LongText,
}

/// Length used when a text column declares no explicit bound.
pub const DEFAULT_VARCHAR_LEN: u32 = 255;

///
/// OnDelete
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
    #[default]
    NoAction,
}

impl OnDelete {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

///
/// RelationTarget
///
/// Deferred reference to a related model. A function pointer lets two models
/// (or one model and itself) refer to each other from `const` items.
///

#[derive(Clone, Copy)]
pub struct RelationTarget(pub fn() -> &'static EntityModel);

impl RelationTarget {
    #[must_use]
    pub fn model(self) -> &'static EntityModel {
        (self.0)()
    }
}

impl fmt::Debug for RelationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RelationTarget")
            .field(&self.model().path)
            .finish()
    }
}

///
/// ColumnKind
///

#[derive(Clone, Copy, Debug)]
pub enum ColumnKind {
    Scalar {
        ty: SqlType,
        size: SizeClass,
    },

    /// Single-valued foreign key. The column itself holds the related id;
    /// `field` is the name predicates use to walk into the related type.
    Relation {
        field: &'static str,
        target: RelationTarget,
        on_delete: OnDelete,
    },

    /// Multi-valued relation backed by an intermediate table. Not a
    /// physical column of the owning table.
    Many {
        target: RelationTarget,
        table: &'static str,
    },
}

///
/// ColumnModel
///

#[derive(Clone, Copy, Debug)]
pub struct ColumnModel {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub auto_increment: bool,
    pub indexed: bool,
}

impl ColumnModel {
    const fn with_kind(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            unique: false,
            primary: false,
            auto_increment: false,
            indexed: false,
        }
    }

    /// Auto-incrementing integer primary key.
    #[must_use]
    pub const fn primary(name: &'static str) -> Self {
        let mut column = Self::with_kind(
            name,
            ColumnKind::Scalar {
                ty: SqlType::BigInt,
                size: SizeClass::MaxVarChar,
            },
        );
        column.primary = true;
        column.auto_increment = true;
        column
    }

    /// Primary key of a child level: same id as the parent row, no sequence.
    #[must_use]
    pub const fn inherited_primary(name: &'static str) -> Self {
        let mut column = Self::primary(name);
        column.auto_increment = false;
        column
    }

    #[must_use]
    pub const fn scalar(name: &'static str, ty: SqlType) -> Self {
        Self::with_kind(
            name,
            ColumnKind::Scalar {
                ty,
                size: SizeClass::MaxVarChar,
            },
        )
    }

    #[must_use]
    pub const fn text(name: &'static str, size: SizeClass) -> Self {
        Self::with_kind(
            name,
            ColumnKind::Scalar {
                ty: SqlType::Text,
                size,
            },
        )
    }

    #[must_use]
    pub const fn relation(
        name: &'static str,
        field: &'static str,
        target: RelationTarget,
        on_delete: OnDelete,
    ) -> Self {
        Self::with_kind(
            name,
            ColumnKind::Relation {
                field,
                target,
                on_delete,
            },
        )
    }

    #[must_use]
    pub const fn many(name: &'static str, target: RelationTarget, table: &'static str) -> Self {
        Self::with_kind(name, ColumnKind::Many { target, table })
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Whether the column exists in the owning table.
    #[must_use]
    pub const fn is_physical(&self) -> bool {
        !matches!(self.kind, ColumnKind::Many { .. })
    }

    /// Abstract type of the stored value. Foreign keys store a `BigInt`.
    #[must_use]
    pub const fn sql_type(&self) -> Option<SqlType> {
        match self.kind {
            ColumnKind::Scalar { ty, .. } => Some(ty),
            ColumnKind::Relation { .. } => Some(SqlType::BigInt),
            ColumnKind::Many { .. } => None,
        }
    }

    #[must_use]
    pub const fn size(&self) -> SizeClass {
        match self.kind {
            ColumnKind::Scalar { size, .. } => size,
            _ => SizeClass::MaxVarChar,
        }
    }

    /// Name by which predicates reach this column.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self.kind {
            ColumnKind::Relation { field, .. } => field,
            _ => self.name,
        }
    }

    #[must_use]
    pub fn relation_target(&self) -> Option<&'static EntityModel> {
        match self.kind {
            ColumnKind::Relation { target, .. } | ColumnKind::Many { target, .. } => {
                Some(target.model())
            }
            ColumnKind::Scalar { .. } => None,
        }
    }
}
