use derive_more::Display;
use serde::{Deserialize, Serialize};
use tabula_core::error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    /// First error of a failed operation. Later errors are counted in the
    /// message.
    #[must_use]
    pub fn from_errors(errors: Vec<InternalError>) -> Self {
        let extra = errors.len().saturating_sub(1);
        let Some(first) = errors.into_iter().next() else {
            return Self::new(ErrorKind::Internal, ErrorOrigin::Query, "operation failed");
        };

        let mut err = Self::from(first);
        if extra > 0 {
            err.message = format!("{} (+{extra} more)", err.message);
        }

        err
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self::new(err.class.into(), err.origin.into(), err.message)
    }
}

///
/// ErrorKind
/// Whether and how the caller can remediate.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Duplicate key, refused migration or similar state conflict.
    Conflict,

    /// Stored data could not be decoded.
    Corruption,

    /// Requested type or row does not exist.
    NotFound,

    /// Valid request using a feature this engine does not offer.
    Unsupported,

    /// The caller cannot remediate this.
    Internal,
}

impl From<ErrorClass> for ErrorKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Conflict => Self::Conflict,
            ErrorClass::Corruption => Self::Corruption,
            ErrorClass::NotFound => Self::NotFound,
            ErrorClass::Unsupported => Self::Unsupported,
            ErrorClass::Internal | ErrorClass::InvariantViolation => Self::Internal,
        }
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
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

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Config => Self::Config,
            CoreErrorOrigin::Dispatch => Self::Dispatch,
            CoreErrorOrigin::Hook => Self::Hook,
            CoreErrorOrigin::Migration => Self::Migration,
            CoreErrorOrigin::Query => Self::Query,
            CoreErrorOrigin::Registry => Self::Registry,
            CoreErrorOrigin::Storage => Self::Storage,
            CoreErrorOrigin::Transaction => Self::Transaction,
            CoreErrorOrigin::Translate => Self::Translate,
        }
    }
}
