//! Typed errors for the per-record pipeline and the query engine.
//!
//! Normalization errors are recovered per record: the offending record is
//! skipped and reported, the batch continues. Store failures are carried as
//! [`anyhow::Error`] and always propagate.

use thiserror::Error;

/// Why a single raw record could not be turned into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// The record could not be decomposed into scalar/sequence/set/mapping shapes.
    #[error("structural parse error: {0}")]
    StructuralParse(String),

    /// A field failed type coercion, or a required attribute is missing.
    #[error("field '{field}': expected {expected}, got {received}")]
    Validation {
        field: String,
        expected: String,
        received: String,
    },

    /// No identifier field and no name to derive one from.
    #[error("cannot resolve identifier: {0}")]
    IdentifierResolution(String),
}

impl NormalizationError {
    pub(crate) fn validation(field: &str, expected: &str, received: impl Into<String>) -> Self {
        NormalizationError::Validation {
            field: field.to_string(),
            expected: expected.to_string(),
            received: received.into(),
        }
    }
}

/// Failure of [`normalize_and_store`](crate::pipeline::normalize_and_store).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

/// A search request that cannot be translated into a store query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown filter field '{field}' for kind '{kind}'")]
    UnknownField { kind: String, field: String },

    #[error("filter '{field}': expected {expected}, got {received}")]
    InvalidValue {
        field: String,
        expected: String,
        received: String,
    },

    #[error("operator {operator} is not supported on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("unknown operator '{0}' (expected eq, ilike, like, in, or range)")]
    UnknownOperator(String),
}

/// An unrecognized kind or origin tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what}: '{value}'")]
pub struct ParseTagError {
    pub what: &'static str,
    pub value: String,
}
