//! # Schema Error Types
//!
//! Errors raised while loading a schema definition or resolving a type name
//! against the loaded [`Schema`](super::Schema).
//!
//! ## Error Categories
//!
//! - **Resolution Errors**: a name does not refer to a known entity, union or interface
//! - **Definition Errors**: malformed directions, field types, custom arguments or rules
//! - **Configuration Errors**: file I/O and YAML parsing issues
//!
//! ## Usage Patterns
//!
//! ```ignore
//! SchemaError::config_error_with_context(
//!     "Duplicate field name: title",
//!     "In entity Movie"
//! )
//! ```

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("No entity, union or interface found for `{name}`")]
    UnknownEntity { name: String },
    #[error("Field `{entity}.{field}` references unknown type `{target}`")]
    UnknownTarget {
        entity: String,
        field: String,
        target: String,
    },
    #[error("Invalid relationship direction `{value}` on `{entity}.{field}`: expected IN or OUT")]
    InvalidDirection {
        entity: String,
        field: String,
        value: String,
    },
    #[error("Invalid query direction `{value}` on `{entity}.{field}`")]
    InvalidQueryDirection {
        entity: String,
        field: String,
        value: String,
    },
    #[error("Unknown field type `{value}` on `{entity}.{field}`")]
    InvalidFieldType {
        entity: String,
        field: String,
        value: String,
    },
    #[error("Invalid argument `{argument}` on custom field `{entity}.{field}`: {reason}")]
    InvalidCustomArgument {
        entity: String,
        field: String,
        argument: String,
        reason: String,
    },
    #[error("Invalid authorization rule on `{owner}`: {reason}")]
    InvalidAuthRule { owner: String, reason: String },
    #[error("Failed to read schema file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse schema: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid schema: {message}")]
    InvalidConfig { message: String },
}

/// Helper methods for creating errors with context information
impl SchemaError {
    /// Create an InvalidConfig error with context information
    pub fn config_error_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        SchemaError::InvalidConfig {
            message: format!("{}\n  Context: {}", message.into(), context.into()),
        }
    }
}
