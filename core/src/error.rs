//! Error types for index building and query evaluation.

use std::io;

use thiserror::Error;

use crate::numeric::NumericType;
use crate::EntityId;

#[derive(Error, Debug)]
pub enum Error {
    /// Failure surfaced by the postings collaborator. Fatal to the evaluation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{combinator} requires at least {required} clauses, got {found}")]
    NotEnoughClauses {
        combinator: &'static str,
        required: usize,
        found: usize,
    },

    #[error("numeric type mismatch on field '{field}': expected {expected:?}, found {found:?}")]
    NumericTypeMismatch {
        field: String,
        expected: NumericType,
        found: NumericType,
    },

    #[error("precision step must be within 1..=64, got {0}")]
    InvalidPrecisionStep(u32),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{field}' is not a {expected} field")]
    FieldKind {
        field: String,
        expected: &'static str,
    },

    #[error("node path has {found} layers, field expects {expected}")]
    NodeDepthMismatch { expected: usize, found: usize },

    #[error("postings out of order at entity {entity}")]
    UnorderedPostings { entity: EntityId },

    #[error("reserved value used as {0}")]
    ReservedValue(&'static str),

    #[error("malformed numeric term")]
    MalformedTerm,

    /// A scorer method was called outside of its documented sequence.
    #[error("scorer contract violation: {0}")]
    ContractViolation(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
