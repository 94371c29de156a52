//! Selection tree to Cypher compilation.
//!
//! The entry points live on [`Translator`]. Each call creates its own
//! [`CompileContext`], runs one orchestrator (`read`, `aggregate` or
//! `reference`) and serializes the resulting clause tree. The orchestrators
//! drive the filter, authorization, projection and pagination compilers, which
//! all emit into the `cypher` AST and call each other recursively for nested
//! selections.

use serde_json::{Map, Value};

use crate::config::CompilerConfig;
use crate::cypher::{build, CompiledQuery, NodePattern, Pattern, PatternDirection, RelationshipPattern, Variable};
use crate::schema::{QueryDirection, RelationshipDirection, RelationshipField, Schema, Target};
use crate::selection::SelectionNode;

mod aggregate;
mod aggregate_where;
mod auth;
mod connection;
mod context;
mod cursor;
mod errors;
mod operators;
mod projection;
mod read;
mod reference;
mod sort;
mod where_clause;

pub use auth::{create_auth_guard, create_auth_predicate, AuthKind, AUTH_FORBIDDEN_ERROR};
pub use context::{AuthContext, CompileContext};
pub use cursor::{cursor_to_offset, offset_to_cursor};
pub use errors::TranslateError;
pub use operators::{AggregateFunction, FilterOperator, RelationshipQuantifier};
pub use projection::{ProjectionMeta, ProjectionResult};
pub use sort::{ReadOptions, SortField};
pub use where_clause::{create_where_predicate, FilterTarget, WherePredicate};

/// Compiles requests against one schema. Cheap to create; holds only borrows,
/// so one instance can serve concurrent requests.
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    schema: &'a Schema,
    config: &'a CompilerConfig,
}

impl<'a> Translator<'a> {
    pub fn new(schema: &'a Schema, config: &'a CompilerConfig) -> Self {
        Translator { schema, config }
    }

    /// Read `entity` nodes with the filter, options and fields of `selection`
    pub fn compile_read(
        &self,
        entity: &str,
        selection: &SelectionNode,
        auth: &AuthContext,
    ) -> Result<CompiledQuery, TranslateError> {
        let entity = self.schema.entity(entity)?;
        let mut ctx = CompileContext::new(self.schema, self.config, auth);
        let this = ctx.named("this");
        let clause = read::translate_read(&mut ctx, entity, &this, selection, None)?;
        let query = build(&clause)?;
        log::debug!(
            "Compiled read of {} ({} parameters)",
            entity.name,
            query.parameters.len()
        );
        Ok(query)
    }

    /// Aggregate over `entity` nodes: `count` plus per-field aggregations
    pub fn compile_aggregate(
        &self,
        entity: &str,
        selection: &SelectionNode,
        auth: &AuthContext,
    ) -> Result<CompiledQuery, TranslateError> {
        let entity = self.schema.entity(entity)?;
        let mut ctx = CompileContext::new(self.schema, self.config, auth);
        let clause = aggregate::translate_aggregate(&mut ctx, entity, selection)?;
        let query = build(&clause)?;
        log::debug!("Compiled aggregate of {}", entity.name);
        Ok(query)
    }

    /// Read the `entity` node identified by the key fields in `identity`
    pub fn compile_reference(
        &self,
        entity: &str,
        identity: &Map<String, Value>,
        selection: &SelectionNode,
        auth: &AuthContext,
    ) -> Result<CompiledQuery, TranslateError> {
        let entity = self.schema.entity(entity)?;
        let mut ctx = CompileContext::new(self.schema, self.config, auth);
        let clause = reference::translate_reference(&mut ctx, entity, identity, selection)?;
        let query = build(&clause)?;
        log::debug!("Compiled reference resolution of {}", entity.name);
        Ok(query)
    }
}

pub(crate) fn expect_object<'v>(
    argument: &str,
    value: &'v Value,
) -> Result<&'v Map<String, Value>, TranslateError> {
    value
        .as_object()
        .ok_or_else(|| TranslateError::invalid_argument(argument, format!("expected an object, got {}", value)))
}

pub(crate) fn expect_array<'v>(argument: &str, value: &'v Value) -> Result<&'v Vec<Value>, TranslateError> {
    value
        .as_array()
        .ok_or_else(|| TranslateError::invalid_argument(argument, format!("expected a list, got {}", value)))
}

/// The `directed` argument of a relationship selection
pub(crate) fn directed_argument(selection: &SelectionNode) -> Result<Option<bool>, TranslateError> {
    match selection.get_argument("directed") {
        None => Ok(None),
        Some(Value::Bool(directed)) => Ok(Some(*directed)),
        Some(other) => Err(TranslateError::invalid_argument(
            "directed",
            format!("expected a boolean, got {}", other),
        )),
    }
}

/// Arrow for traversing `field` from its owner. `directed: false` from the
/// caller always makes the match undirected.
pub(crate) fn relationship_direction(field: &RelationshipField, directed: Option<bool>) -> PatternDirection {
    let undirected = match (field.query_direction, directed) {
        (_, Some(false)) => true,
        (QueryDirection::UndirectedOnly, _) => true,
        (QueryDirection::DefaultUndirected, None) => true,
        _ => false,
    };
    if undirected {
        return PatternDirection::Undirected;
    }
    match field.direction {
        RelationshipDirection::In => PatternDirection::Left,
        RelationshipDirection::Out => PatternDirection::Right,
    }
}

/// `(source)-[rel_var:TYPE]->(node)` with the arrow of `field`
pub(crate) fn relationship_pattern(
    source: &Variable,
    rel_var: Option<&Variable>,
    field: &RelationshipField,
    directed: Option<bool>,
    node: NodePattern,
) -> Pattern {
    let mut relationship = RelationshipPattern::new(field.rel_type.clone(), relationship_direction(field, directed));
    if let Some(rel_var) = rel_var {
        relationship = relationship.variable(rel_var);
    }
    Pattern::node(NodePattern::new(source)).related(relationship, node)
}

/// Node pattern for a relationship target. Abstract targets match unlabeled.
pub(crate) fn neighbor_node(target: &Target<'_>, variable: Option<&Variable>) -> NodePattern {
    let node = match variable {
        Some(variable) => NodePattern::new(variable),
        None => NodePattern::anonymous(),
    };
    match target {
        Target::Entity(entity) => node.labels(entity.labels.iter().cloned()),
        Target::Union(_) | Target::Interface(_) => node,
    }
}
