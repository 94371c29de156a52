//! Errors raised while compiling a request.
//!
//! Input-shape problems (unknown fields, operators that don't apply, malformed
//! arguments) are reported to the caller. Schema and builder errors are wrapped
//! so an orchestrator has a single error type to return.

use thiserror::Error;

use crate::cypher::CypherBuildError;
use crate::schema::SchemaError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslateError {
    #[error("Unknown field `{field}` on `{entity}`")]
    UnknownField { entity: String, field: String },

    #[error("Operator `{operator}` is not supported on `{entity}.{field}`")]
    UnsupportedOperator {
        entity: String,
        field: String,
        operator: String,
    },

    #[error("Quantifier `{quantifier}` used on non-relationship field `{entity}.{field}`")]
    QuantifierOnNonRelationship {
        entity: String,
        field: String,
        quantifier: String,
    },

    #[error("Invalid argument `{argument}`: {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error("Invalid cursor `{cursor}`")]
    InvalidCursor { cursor: String },

    #[error("Selection nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: u32 },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Build(#[from] CypherBuildError),
}

impl TranslateError {
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        TranslateError::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        TranslateError::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}
