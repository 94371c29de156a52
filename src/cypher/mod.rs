//! Typed Cypher AST and its serializer.
//!
//! Every compiler stage emits into these types; nothing in the crate builds
//! query text by string concatenation. [`build`] is the only way out of the AST.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod clause;
mod environment;
mod errors;
mod expr;
mod pattern;
mod render;
mod value;

pub use clause::{
    Call, CallImport, Clause, Match, OrderItem, Projection, ProjectionItem, SortDirection, Unwind,
    Validate, With,
};
pub use environment::{Environment, Param, Variable, VariableKind};
pub use errors::CypherBuildError;
pub use expr::{and_all, or_all, BinaryOperator, Expr, Literal, MapEntry, Quantifier};
pub use pattern::{NodePattern, Pattern, PatternDirection, RelationshipPattern};
pub use render::{escape_name, escape_string, RenderEnv, ToCypher};
pub use value::ParamValue;

/// Query text plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub text: String,
    pub parameters: BTreeMap<String, ParamValue>,
}

/// Serialize a complete clause tree.
///
/// The tree must end with `RETURN` (or a `UNION` whose branches all do), and so
/// must every `CALL` body inside it.
pub fn build(clause: &Clause) -> Result<CompiledQuery, CypherBuildError> {
    if !clause.ends_with_return() {
        return Err(CypherBuildError::missing_return("top-level query"));
    }
    let mut env = RenderEnv::new();
    let text = clause.to_cypher(&mut env)?;
    log::trace!("Compiled Cypher:\n{}", text);
    Ok(CompiledQuery {
        text,
        parameters: env.into_parameters(),
    })
}
