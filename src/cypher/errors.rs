//! Error types for building Cypher text from a clause tree.
//!
//! These are programmer errors: a compiler stage produced a tree that can't be
//! serialized into a valid query. They are never caused by request input.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CypherBuildError {
    #[error("Query does not end with a RETURN clause ({context})")]
    MissingReturn { context: String },

    #[error("UNION needs at least one branch")]
    EmptyUnion,

    #[error("Cannot build an empty clause sequence")]
    EmptySequence,

    #[error("{clause} clause has nothing to project")]
    EmptyProjection { clause: &'static str },
}

impl CypherBuildError {
    /// Create a MissingReturn error describing where the RETURN was expected
    pub fn missing_return(context: impl Into<String>) -> Self {
        CypherBuildError::MissingReturn {
            context: context.into(),
        }
    }
}
