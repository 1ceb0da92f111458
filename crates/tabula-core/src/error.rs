use crate::{
    config::ConfigError,
    db::{
        dispatch::DispatchError, query::QueryError, registry::RegistryError,
        storage::StorageError, transaction::TransactionError, translate::TranslateError,
    },
    migration::MigrationError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Subsystem errors convert into this type and are kept as `detail` so
/// callers inspecting an `Outcome` can still match on the original cause.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Construct a hook-origin error (user callback failure or panic).
    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Hook, message)
    }

    /// Construct an invariant violation for an arbitrary origin.
    pub fn invariant(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, origin, message)
    }

    /// Construct a row-decoding failure.
    pub fn decode(column: &str, message: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::Corruption,
            ErrorOrigin::Storage,
            format!("cannot decode column '{column}': {message}"),
        )
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Original subsystem error, retained for callers that need to match.
///

#[derive(Debug)]
pub enum ErrorDetail {
    Translate(TranslateError),
    Query(QueryError),
    Dispatch(DispatchError),
    Transaction(TransactionError),
    Migration(MigrationError),
    Storage(StorageError),
    Registry(RegistryError),
    Config(ConfigError),
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Conflict,
    Corruption,
    Internal,
    InvariantViolation,
    NotFound,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Conflict => "conflict",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Dispatch,
    Hook,
    Migration,
    Query,
    Registry,
    Storage,
    Transaction,
    Translate,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Dispatch => "dispatch",
            Self::Hook => "hook",
            Self::Migration => "migration",
            Self::Query => "query",
            Self::Registry => "registry",
            Self::Storage => "storage",
            Self::Transaction => "transaction",
            Self::Translate => "translate",
        };
        write!(f, "{label}")
    }
}

// Each subsystem error keeps its own classification; the conversion only
// attaches origin and detail.
macro_rules! impl_from_subsystem {
    ($err:ty, $origin:ident, $detail:ident) => {
        impl From<$err> for InternalError {
            fn from(err: $err) -> Self {
                Self::new(err.class(), ErrorOrigin::$origin, err.to_string())
                    .with_detail(ErrorDetail::$detail(err))
            }
        }
    };
}

impl_from_subsystem!(TranslateError, Translate, Translate);
impl_from_subsystem!(QueryError, Query, Query);
impl_from_subsystem!(DispatchError, Dispatch, Dispatch);
impl_from_subsystem!(TransactionError, Transaction, Transaction);
impl_from_subsystem!(MigrationError, Migration, Migration);
impl_from_subsystem!(StorageError, Storage, Storage);
impl_from_subsystem!(RegistryError, Registry, Registry);
impl_from_subsystem!(ConfigError, Config, Config);
