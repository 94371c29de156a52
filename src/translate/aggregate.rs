//! Aggregations: top-level `<entity>Aggregate` reads and `<rel>Aggregate`
//! selections on relationship fields.
//!
//! ```text
//! MATCH (this:Movie)
//! WHERE <filter> AND <where rules>
//! CALL apoc.util.validate(NOT (<allow rules>), "Forbidden", [0])
//! CALL apoc.util.validate(NOT (<field rules>), "Forbidden", [0])
//! RETURN { count: count(this), runtime: { max: max(this.runtime) } } AS this
//! ```
//!
//! Field rules are validated row by row before the `RETURN` aggregates, so a
//! forbidden field aborts the query before any partial result is computed.

use super::aggregate_where::aggregation_expr;
use super::auth::{create_auth_guard, create_auth_predicate, AuthKind};
use super::context::CompileContext;
use super::errors::TranslateError;
use super::operators::AggregateFunction;
use super::projection::field_allow_predicate;
use super::where_clause::{create_where_predicate, filtered_match, FilterTarget, WherePredicate};
use super::{directed_argument, expect_object, relationship_pattern};
use crate::cypher::{BinaryOperator, Clause, Expr, NodePattern, Pattern, Variable};
use crate::schema::{EntityDescriptor, Operation, RelationshipField, ScalarField, Target};
use crate::selection::SelectionNode;

pub fn translate_aggregate<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    selection: &SelectionNode,
) -> Result<Clause, TranslateError> {
    let this = ctx.named("this");
    let rules = entity.rules_for(Operation::Read);
    let filter = entity_filter(ctx, entity, &this, selection)?
        .with_predicate(create_auth_predicate(ctx, &rules, entity, &this, AuthKind::Where)?);
    let pattern = Pattern::node(NodePattern::new(&this).labels(entity.labels.iter().cloned()));

    let mut clauses = vec![filtered_match(pattern, filter.predicate, filter.subqueries)];
    let allow = create_auth_predicate(ctx, &rules, entity, &this, AuthKind::Allow)?;
    clauses.extend(create_auth_guard(allow.into_iter().collect()));

    let aggregated = aggregate_fields(ctx, FilterTarget::Entity(entity), &this, Some(&this), &selection.children())?;
    for check in aggregated.field_checks {
        clauses.extend(create_auth_guard(vec![check]));
    }
    clauses.push(Clause::return_as(Expr::Map(aggregated.entries), &this));

    log::debug!("Compiled aggregate selection of {}", entity.name);
    Ok(Clause::concat(clauses))
}

/// `CALL` subquery aggregating over the neighbors of `source` and the
/// relationships reaching them, returning one map as `result`
pub fn create_relationship_aggregate<'a>(
    ctx: &mut CompileContext<'a>,
    source: &Variable,
    rel: &'a RelationshipField,
    selection: &SelectionNode,
    result: &Variable,
) -> Result<Clause, TranslateError> {
    let schema = ctx.schema();
    let entity = match schema.target(&rel.target)? {
        Target::Entity(entity) => entity,
        other => {
            return Err(TranslateError::invalid_argument(
                format!("{}Aggregate", rel.name),
                format!("aggregations need an entity target, `{}` is abstract", other.name()),
            ))
        }
    };
    let edge_type = rel
        .properties
        .as_deref()
        .map(|name| schema.relationship_properties(name))
        .transpose()?;

    let directed = directed_argument(selection)?;
    let relationship = ctx.graph_variable();
    let node = ctx.graph_variable();
    let pattern = relationship_pattern(
        source,
        Some(&relationship),
        rel,
        directed,
        NodePattern::new(&node).labels(entity.labels.iter().cloned()),
    );
    let rules = entity.rules_for(Operation::Read);
    let filter = entity_filter(ctx, entity, &node, selection)?
        .with_predicate(create_auth_predicate(ctx, &rules, entity, &node, AuthKind::Where)?);

    let mut entries = Vec::new();
    let mut checks: Vec<Expr> = create_auth_predicate(ctx, &rules, entity, &node, AuthKind::Allow)?
        .into_iter()
        .collect();
    for child in selection.children() {
        let key = child.response_key().to_string();
        match child.name.as_str() {
            "count" => entries.push((key, Expr::function("count", vec![Expr::variable(&node)]))),
            "__typename" => {}
            "node" => {
                let aggregated = aggregate_fields(ctx, FilterTarget::Entity(entity), &node, None, &child.children())?;
                checks.extend(aggregated.field_checks);
                entries.push((key, Expr::Map(aggregated.entries)));
            }
            "edge" => {
                let edge_type = edge_type.ok_or_else(|| {
                    TranslateError::invalid_argument(format!("{}Aggregate", rel.name), "relationship has no properties")
                })?;
                let aggregated =
                    aggregate_fields(ctx, FilterTarget::Edge(edge_type), &relationship, None, &child.children())?;
                entries.push((key, Expr::Map(aggregated.entries)));
            }
            other => return Err(TranslateError::unknown_field(format!("{}Aggregate", rel.name), other)),
        }
    }

    let mut body = vec![filtered_match(pattern, filter.predicate, filter.subqueries)];
    body.extend(create_auth_guard(checks));
    body.push(Clause::return_as(Expr::Map(entries), result));

    log::debug!("Compiled relationship aggregate {}Aggregate", rel.name);
    Ok(Clause::call(&[source], Clause::concat(body)))
}

fn entity_filter<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    variable: &Variable,
    selection: &SelectionNode,
) -> Result<WherePredicate, TranslateError> {
    match selection.get_argument("where") {
        Some(value) => create_where_predicate(ctx, FilterTarget::Entity(entity), variable, expect_object("where", value)?),
        None => Ok(WherePredicate::default()),
    }
}

struct AggregatedFields {
    entries: Vec<(String, Expr)>,
    /// Field `allow` predicates, one per aggregated field that has rules
    field_checks: Vec<Expr>,
}

/// `{ title: { shortest: ..., longest: ... }, runtime: { max: ... } }` over
/// the fields of `target` bound to `variable`. `count` is accepted only when
/// `count_of` is given.
fn aggregate_fields<'a>(
    ctx: &mut CompileContext<'a>,
    target: FilterTarget<'a>,
    variable: &Variable,
    count_of: Option<&Variable>,
    selections: &[&SelectionNode],
) -> Result<AggregatedFields, TranslateError> {
    let mut aggregated = AggregatedFields {
        entries: Vec::with_capacity(selections.len()),
        field_checks: Vec::new(),
    };
    for selection in selections {
        let key = selection.response_key().to_string();
        match (selection.name.as_str(), count_of) {
            ("__typename", _) => continue,
            ("count", Some(counted)) => {
                aggregated
                    .entries
                    .push((key, Expr::function("count", vec![Expr::variable(counted)])));
                continue;
            }
            _ => {}
        }
        let field = target
            .scalar(&selection.name)
            .ok_or_else(|| TranslateError::unknown_field(target.name(), selection.name.clone()))?;
        if let FilterTarget::Entity(entity) = target {
            aggregated
                .field_checks
                .extend(field_allow_predicate(ctx, entity, field, variable)?);
        }
        aggregated
            .entries
            .push((key, field_aggregation(ctx, target.name(), field, variable, selection)?));
    }
    Ok(aggregated)
}

fn field_aggregation(
    ctx: &mut CompileContext<'_>,
    owner: &str,
    field: &ScalarField,
    variable: &Variable,
    selection: &SelectionNode,
) -> Result<Expr, TranslateError> {
    let property = Expr::property(variable, field.db_name());
    let mut entries = Vec::new();
    for child in selection.children() {
        let function = match child.name.as_str() {
            "__typename" => continue,
            "min" => AggregateFunction::Min,
            "max" => AggregateFunction::Max,
            "average" => AggregateFunction::Average,
            "sum" => AggregateFunction::Sum,
            "shortest" => AggregateFunction::ShortestLength,
            "longest" => AggregateFunction::LongestLength,
            other => return Err(TranslateError::unknown_field(format!("{}.{}", owner, field.name), other)),
        };
        if !function.applies_to(field) {
            return Err(TranslateError::UnsupportedOperator {
                entity: owner.to_string(),
                field: field.name.clone(),
                operator: child.name.clone(),
            });
        }
        let expr = match function {
            AggregateFunction::ShortestLength => extreme_by_length(ctx, property.clone(), BinaryOperator::LessThan),
            AggregateFunction::LongestLength => extreme_by_length(ctx, property.clone(), BinaryOperator::GreaterThan),
            other => aggregation_expr(other, property.clone()),
        };
        entries.push((child.response_key().to_string(), expr));
    }
    Ok(Expr::Map(entries))
}

/// The collected string whose length wins under `comparison`:
/// `reduce(acc = head(collect(p)), cur IN collect(p) | CASE WHEN size(cur) < size(acc) THEN cur ELSE acc END)`
fn extreme_by_length(ctx: &mut CompileContext<'_>, property: Expr, comparison: BinaryOperator) -> Expr {
    let values = Expr::function("collect", vec![property]);
    let accumulator = ctx.value_variable();
    let current = ctx.value_variable();
    let wins = Expr::binary(
        comparison,
        Expr::function("size", vec![Expr::variable(&current)]),
        Expr::function("size", vec![Expr::variable(&accumulator)]),
    );
    Expr::Reduce {
        accumulator: accumulator.clone(),
        init: Box::new(Expr::function("head", vec![values.clone()])),
        variable: current.clone(),
        list: Box::new(values),
        expr: Box::new(Expr::case_when(
            wins,
            Expr::variable(&current),
            Expr::variable(&accumulator),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::cypher::{build, CompiledQuery};
    use crate::schema::Schema;
    use crate::translate::context::AuthContext;

    const SCHEMA: &str = r#"
entities:
  - name: Movie
    fields:
      - { name: title, type: String }
      - { name: runtime, type: Int }
      - { name: budget, type: Int, auth: [ { roles: [admin] } ] }
    relationships:
      - { name: actors, type: ACTED_IN, target: Person, direction: IN, list: true, properties: ActedIn }
  - name: Person
    fields:
      - { name: name, type: String }
relationship_properties:
  - name: ActedIn
    fields:
      - { name: year, type: Int }
"#;

    fn aggregate(fields: Vec<SelectionNode>) -> Result<CompiledQuery, TranslateError> {
        let schema = Schema::from_yaml_str(SCHEMA).unwrap();
        let config = CompilerConfig::default();
        let auth = AuthContext::anonymous();
        let mut ctx = CompileContext::new(&schema, &config, &auth);
        let movie = schema.entity("Movie").unwrap();
        let selection = SelectionNode::new("moviesAggregate").fields("MovieAggregateSelection", fields);
        let clause = translate_aggregate(&mut ctx, movie, &selection)?;
        Ok(build(&clause)?)
    }

    #[test]
    fn test_count_and_numeric_aggregations() {
        let query = aggregate(vec![
            SelectionNode::new("count"),
            SelectionNode::new("runtime").fields(
                "IntAggregateSelection",
                vec![
                    SelectionNode::new("min"),
                    SelectionNode::new("max"),
                    SelectionNode::new("average"),
                    SelectionNode::new("sum"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            query.text,
            "MATCH (this:Movie)\n\
             RETURN { count: count(this), runtime: { min: min(this.runtime), max: max(this.runtime), \
             average: avg(this.runtime), sum: sum(this.runtime) } } AS this"
        );
    }

    #[test]
    fn test_shortest_and_longest_strings() {
        let query = aggregate(vec![SelectionNode::new("title").fields(
            "StringAggregateSelection",
            vec![SelectionNode::new("shortest"), SelectionNode::new("longest")],
        )])
        .unwrap();
        assert!(query.text.contains(
            "shortest: reduce(var0 = head(collect(this.title)), var1 IN collect(this.title) | \
             CASE WHEN size(var1) < size(var0) THEN var1 ELSE var0 END)"
        ));
        assert!(query.text.contains("CASE WHEN size(var3) > size(var2) THEN var3 ELSE var2 END"));
    }

    #[test]
    fn test_field_guard_precedes_aggregation() {
        let query = aggregate(vec![
            SelectionNode::new("budget").fields("IntAggregateSelection", vec![SelectionNode::new("max")]),
        ])
        .unwrap();
        let guard = query.text.find("CALL apoc.util.validate(").unwrap();
        let ret = query.text.find("RETURN").unwrap();
        assert!(guard < ret);
        assert!(query.text.contains("$auth.roles"));
    }

    #[test]
    fn test_inapplicable_aggregation() {
        let err = aggregate(vec![
            SelectionNode::new("title").fields("StringAggregateSelection", vec![SelectionNode::new("sum")]),
        ])
        .unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_relationship_aggregate() {
        let schema = Schema::from_yaml_str(SCHEMA).unwrap();
        let config = CompilerConfig::default();
        let auth = AuthContext::anonymous();
        let mut ctx = CompileContext::new(&schema, &config, &auth);
        let this = ctx.named("this");
        let result = ctx.value_variable();
        let rel = schema.entity("Movie").unwrap().relationship("actors").unwrap();
        let selection = SelectionNode::new("actorsAggregate").fields(
            "MoviePersonActorsAggregationSelection",
            vec![
                SelectionNode::new("count"),
                SelectionNode::new("edge").fields(
                    "MoviePersonActorsEdgeAggregateSelection",
                    vec![SelectionNode::new("year").fields("IntAggregateSelection", vec![SelectionNode::new("max")])],
                ),
            ],
        );
        let subquery = create_relationship_aggregate(&mut ctx, &this, rel, &selection, &result).unwrap();
        let query = build(&Clause::concat([
            subquery,
            Clause::return_as(Expr::variable(&result), &result),
        ]))
        .unwrap();
        assert_eq!(
            query.text,
            "CALL {\n    \
                 WITH this\n    \
                 MATCH (this)<-[this0:ACTED_IN]-(this1:Person)\n    \
                 RETURN { count: count(this1), edge: { year: { max: max(this0.year) } } } AS var2\n\
             }\n\
             RETURN var2"
        );
    }
}
