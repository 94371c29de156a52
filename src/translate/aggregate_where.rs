//! `<rel>Aggregate` filters.
//!
//! Aggregations can't be evaluated inline in a row predicate, so each filter
//! becomes a `CALL` subquery that aggregates over the neighbors and returns a
//! single boolean. The filter predicate then only checks that boolean.
//!
//! ```text
//! CALL {
//!     WITH this
//!     MATCH (this)<-[this0:ACTED_IN]-(this1:Person)
//!     RETURN count(this1) > $param0 AS var2
//! }
//! WITH *
//! WHERE var2 = true
//! ```

use serde_json::{Map, Value};

use super::context::CompileContext;
use super::errors::TranslateError;
use super::operators::{split_aggregate_key, split_comparison, AggregateFunction};
use super::where_clause::WherePredicate;
use super::{expect_array, expect_object, relationship_pattern};
use crate::cypher::{and_all, or_all, BinaryOperator, Clause, Expr, NodePattern, Variable};
use crate::schema::{RelationshipDescriptor, RelationshipField, ScalarField, Target};

/// Aggregate expression over a property, e.g. `avg(size(this1.name))`
pub fn aggregation_expr(function: AggregateFunction, property: Expr) -> Expr {
    match function {
        AggregateFunction::Min => Expr::function("min", vec![property]),
        AggregateFunction::Max => Expr::function("max", vec![property]),
        AggregateFunction::Average => Expr::function("avg", vec![property]),
        AggregateFunction::Sum => Expr::function("sum", vec![property]),
        AggregateFunction::ShortestLength => {
            Expr::function("min", vec![Expr::function("size", vec![property])])
        }
        AggregateFunction::LongestLength => {
            Expr::function("max", vec![Expr::function("size", vec![property])])
        }
        AggregateFunction::AverageLength => {
            Expr::function("avg", vec![Expr::function("size", vec![property])])
        }
    }
}

pub fn aggregate_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    rel: &'a RelationshipField,
    variable: &Variable,
    value: &Value,
) -> Result<WherePredicate, TranslateError> {
    let filter = expect_object(&format!("{}Aggregate", rel.name), value)?;
    let entity = match ctx.schema().target(&rel.target)? {
        Target::Entity(entity) => entity,
        other => {
            return Err(TranslateError::invalid_argument(
                format!("{}Aggregate", rel.name),
                format!("aggregate filters need an entity target, `{}` is abstract", other.name()),
            ))
        }
    };
    let edge_type = match &rel.properties {
        Some(name) => Some(ctx.schema().relationship_properties(name)?),
        None => None,
    };

    let edge = ctx.graph_variable();
    let node = ctx.graph_variable();
    let scope = AggregateScope {
        node_fields: &entity.fields,
        edge_type,
        node: &node,
        edge: &edge,
    };
    let condition = match aggregate_condition(ctx, &scope, filter)? {
        Some(condition) => condition,
        None => return Ok(WherePredicate::default()),
    };

    let result = ctx.value_variable();
    let pattern = relationship_pattern(
        variable,
        Some(&edge),
        rel,
        None,
        NodePattern::new(&node).labels(entity.labels.iter().cloned()),
    );
    let subquery = Clause::call(
        &[variable],
        Clause::concat([
            Clause::match_pattern(pattern, None),
            Clause::return_as(condition, &result),
        ]),
    );
    log::debug!("Aggregate filter on {} compiled to a subquery", rel.name);

    Ok(WherePredicate {
        predicate: Some(Expr::eq(Expr::variable(&result), Expr::boolean(true))),
        subqueries: vec![subquery],
    })
}

struct AggregateScope<'s> {
    node_fields: &'s [ScalarField],
    edge_type: Option<&'s RelationshipDescriptor>,
    node: &'s Variable,
    edge: &'s Variable,
}

fn aggregate_condition(
    ctx: &mut CompileContext<'_>,
    scope: &AggregateScope<'_>,
    filter: &Map<String, Value>,
) -> Result<Option<Expr>, TranslateError> {
    let mut parts = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        let part = match key.as_str() {
            "AND" | "OR" => {
                let mut nested = Vec::new();
                for item in expect_array(key, value)? {
                    nested.push(aggregate_condition(ctx, scope, expect_object(key, item)?)?);
                }
                if key == "AND" {
                    and_all(nested)
                } else {
                    or_all(nested)
                }
            }
            "NOT" => aggregate_condition(ctx, scope, expect_object(key, value)?)?.map(Expr::not),
            "node" => field_aggregations(ctx, scope.node_fields, scope.node, expect_object(key, value)?)?,
            "edge" => {
                let edge_type = scope.edge_type.ok_or_else(|| {
                    TranslateError::invalid_argument("edge", "relationship has no properties")
                })?;
                field_aggregations(ctx, &edge_type.fields, scope.edge, expect_object(key, value)?)?
            }
            other => match split_comparison(other) {
                ("count", comparison) => {
                    if !value.is_i64() {
                        return Err(TranslateError::invalid_argument(other, "count must be an integer"));
                    }
                    let op = comparison.map(|c| c.binary_operator()).unwrap_or(BinaryOperator::Equal);
                    Some(Expr::binary(
                        op,
                        Expr::function("count", vec![Expr::variable(scope.node)]),
                        ctx.param(value),
                    ))
                }
                _ => return Err(TranslateError::unknown_field("Aggregate", other)),
            },
        };
        parts.push(part);
    }
    Ok(and_all(parts))
}

fn field_aggregations(
    ctx: &mut CompileContext<'_>,
    fields: &[ScalarField],
    variable: &Variable,
    filter: &Map<String, Value>,
) -> Result<Option<Expr>, TranslateError> {
    let mut parts = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        let part = match key.as_str() {
            "AND" | "OR" => {
                let mut nested = Vec::new();
                for item in expect_array(key, value)? {
                    nested.push(field_aggregations(ctx, fields, variable, expect_object(key, item)?)?);
                }
                if key == "AND" {
                    and_all(nested)
                } else {
                    or_all(nested)
                }
            }
            "NOT" => field_aggregations(ctx, fields, variable, expect_object(key, value)?)?.map(Expr::not),
            other => {
                let lookup = |name: &str| fields.iter().any(|f| f.name == name);
                let (name, function, comparison) = split_aggregate_key(other, lookup)
                    .ok_or_else(|| TranslateError::unknown_field("Aggregate", other))?;
                let field = fields
                    .iter()
                    .find(|f| f.name == name)
                    .ok_or_else(|| TranslateError::unknown_field("Aggregate", name))?;
                if !function.applies_to(field) {
                    return Err(TranslateError::UnsupportedOperator {
                        entity: "Aggregate".to_string(),
                        field: field.name.clone(),
                        operator: other[name.len() + 1..].to_string(),
                    });
                }
                let property = Expr::property(variable, field.db_name());
                let mut rhs = ctx.param(value);
                if let (Some(constructor), AggregateFunction::Min | AggregateFunction::Max) =
                    (field.kind.temporal_constructor(), function)
                {
                    rhs = Expr::function(constructor, vec![rhs]);
                }
                Some(Expr::binary(
                    comparison.binary_operator(),
                    aggregation_expr(function, property),
                    rhs,
                ))
            }
        };
        parts.push(part);
    }
    Ok(and_all(parts))
}
