use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

/// Errors returned by every query entry point.
///
/// The caller layer maps these onto transport codes; see [`ErrorKind`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecommendError {
    #[error("No model loaded yet: {0}")]
    NotReady(String),

    #[error("No such user: {0}")]
    NoSuchUser(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Fieldless discriminant of [`RecommendError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Retry later (service unavailable)
    NotReady,
    /// Unknown entity (not found)
    NoSuchUser,
    /// Caller error (bad request)
    InvalidArgument,
}

impl RecommendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecommendError::NotReady(_) => ErrorKind::NotReady,
            RecommendError::NoSuchUser(_) => ErrorKind::NoSuchUser,
            RecommendError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        RecommendError::InvalidArgument(msg.into())
    }
}

/// Errors raised while assembling a [`crate::FactorModel`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Feature dimension must be greater than 0")]
    ZeroDimension,

    #[error("Vector for {id} has {actual} features, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Vector for {id} contains a non-finite value")]
    NonFiniteValue { id: String },

    #[error("Empty {0} ID")]
    EmptyId(&'static str),

    #[error("Invalid LSH configuration: {0}")]
    InvalidLshConfig(String),
}
