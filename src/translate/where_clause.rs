//! Filter input (`where` arguments) to Cypher predicates.
//!
//! Every key of a filter object compiles to exactly one predicate and the
//! predicates of one object are ANDed. Filters that cannot be evaluated as a
//! single row-level expression (aggregate filters) also produce `CALL`
//! subqueries, which the caller must place after its `MATCH` and before the
//! predicate is evaluated.

use serde_json::{Map, Value};

use super::aggregate_where::aggregate_predicate;
use super::context::CompileContext;
use super::errors::TranslateError;
use super::operators::{split_operator, split_quantifier, FilterOperator, RelationshipQuantifier};
use super::{expect_array, expect_object, neighbor_node, relationship_pattern};
use crate::cypher::{
    and_all, or_all, BinaryOperator, Clause, Expr, NodePattern, ParamValue, Pattern, Variable,
};
use crate::schema::{
    EntityDescriptor, FieldKind, InterfaceDescriptor, RelationshipDescriptor, RelationshipField,
    ScalarField, Target,
};

/// Predicate plus the subqueries it depends on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WherePredicate {
    pub predicate: Option<Expr>,
    pub subqueries: Vec<Clause>,
}

impl WherePredicate {
    pub fn new(predicate: Expr) -> Self {
        WherePredicate {
            predicate: Some(predicate),
            subqueries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none() && self.subqueries.is_empty()
    }

    pub fn and(parts: Vec<WherePredicate>) -> Self {
        Self::combine(parts, and_all)
    }

    pub fn or(parts: Vec<WherePredicate>) -> Self {
        Self::combine(parts, or_all)
    }

    fn combine(parts: Vec<WherePredicate>, join: fn(Vec<Option<Expr>>) -> Option<Expr>) -> Self {
        let mut predicates = Vec::with_capacity(parts.len());
        let mut subqueries = Vec::new();
        for part in parts {
            predicates.push(part.predicate);
            subqueries.extend(part.subqueries);
        }
        WherePredicate {
            predicate: join(predicates),
            subqueries,
        }
    }

    /// AND another optional predicate onto this one
    pub fn with_predicate(mut self, other: Option<Expr>) -> Self {
        self.predicate = and_all([self.predicate.take(), other]);
        self
    }
}

/// What the filtered variable is bound to
#[derive(Debug, Clone, Copy)]
pub enum FilterTarget<'a> {
    Entity(&'a EntityDescriptor),
    Interface(&'a InterfaceDescriptor),
    Edge(&'a RelationshipDescriptor),
}

impl<'a> FilterTarget<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            FilterTarget::Entity(e) => &e.name,
            FilterTarget::Interface(i) => &i.name,
            FilterTarget::Edge(r) => &r.name,
        }
    }

    pub fn scalar(&self, name: &str) -> Option<&'a ScalarField> {
        match self {
            FilterTarget::Entity(e) => e.scalar(name),
            FilterTarget::Interface(i) => i.scalar(name),
            FilterTarget::Edge(r) => r.field(name),
        }
    }

    pub fn relationship(&self, name: &str) -> Option<&'a RelationshipField> {
        match self {
            FilterTarget::Entity(e) => e.relationship(name),
            _ => None,
        }
    }

    fn has_field(&self, name: &str) -> bool {
        self.scalar(name).is_some() || self.relationship(name).is_some()
    }
}

/// Compile a filter object against `variable`
pub fn create_where_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    target: FilterTarget<'a>,
    variable: &Variable,
    filter: &Map<String, Value>,
) -> Result<WherePredicate, TranslateError> {
    let mut parts = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        parts.push(compile_key(ctx, target, variable, key, value)?);
    }
    Ok(WherePredicate::and(parts))
}

fn compile_key<'a>(
    ctx: &mut CompileContext<'a>,
    target: FilterTarget<'a>,
    variable: &Variable,
    key: &str,
    value: &Value,
) -> Result<WherePredicate, TranslateError> {
    match key {
        "AND" | "OR" => {
            let mut parts = Vec::new();
            for item in expect_array(key, value)? {
                parts.push(create_where_predicate(ctx, target, variable, expect_object(key, item)?)?);
            }
            return Ok(if key == "AND" {
                WherePredicate::and(parts)
            } else {
                WherePredicate::or(parts)
            });
        }
        "NOT" => {
            if value.is_null() {
                return Ok(WherePredicate::default());
            }
            let inner = create_where_predicate(ctx, target, variable, expect_object(key, value)?)?;
            return Ok(WherePredicate {
                predicate: inner.predicate.map(Expr::not),
                subqueries: inner.subqueries,
            });
        }
        _ => {}
    }

    if let Some(field) = target.scalar(key) {
        return scalar_predicate(ctx, field, variable, FilterOperator::Equal, value);
    }
    if let Some(rel) = target.relationship(key) {
        return relationship_predicate(ctx, rel, variable, RelationshipQuantifier::Some, value);
    }
    if let Some(rel) = key
        .strip_suffix("Aggregate")
        .and_then(|name| target.relationship(name))
    {
        return aggregate_predicate(ctx, rel, variable, value);
    }
    if let Some((rel, quantifier)) = split_connection_key(key, |n| target.relationship(n)) {
        return connection_predicate(ctx, rel, variable, quantifier, value);
    }
    if let Some((name, quantifier)) = split_quantifier(key, |n| target.has_field(n)) {
        return match target.relationship(name) {
            Some(rel) => relationship_predicate(ctx, rel, variable, quantifier, value),
            None => Err(TranslateError::QuantifierOnNonRelationship {
                entity: target.name().to_string(),
                field: name.to_string(),
                quantifier: quantifier.suffix().trim_start_matches('_').to_string(),
            }),
        };
    }
    if let Some((name, operator)) = split_operator(key, |n| target.has_field(n)) {
        let unsupported = || TranslateError::UnsupportedOperator {
            entity: target.name().to_string(),
            field: name.to_string(),
            operator: key[name.len() + 1..].to_string(),
        };
        if let Some(field) = target.scalar(name) {
            if !operator.applies_to(field) {
                return Err(unsupported());
            }
            return scalar_predicate(ctx, field, variable, operator, value);
        }
        if let Some(rel) = target.relationship(name) {
            if operator == FilterOperator::Not {
                return relationship_predicate(ctx, rel, variable, RelationshipQuantifier::None, value);
            }
        }
        return Err(unsupported());
    }

    Err(TranslateError::unknown_field(target.name(), key))
}

/// `<rel>Connection` with an optional quantifier suffix
fn split_connection_key<'a>(
    key: &str,
    relationship: impl Fn(&str) -> Option<&'a RelationshipField>,
) -> Option<(&'a RelationshipField, RelationshipQuantifier)> {
    let (rest, quantifier) = split_quantifier(key, |prefix| prefix.ends_with("Connection"))
        .unwrap_or((key, RelationshipQuantifier::Some));
    let name = rest.strip_suffix("Connection")?;
    relationship(name).map(|rel| (rel, quantifier))
}

fn scalar_predicate(
    ctx: &mut CompileContext<'_>,
    field: &ScalarField,
    variable: &Variable,
    operator: FilterOperator,
    value: &Value,
) -> Result<WherePredicate, TranslateError> {
    let property = Expr::property(variable, field.db_name());

    if value.is_null() {
        return match operator {
            FilterOperator::Equal => Ok(WherePredicate::new(Expr::is_null(property))),
            FilterOperator::Not => Ok(WherePredicate::new(Expr::is_not_null(property))),
            _ => Err(TranslateError::invalid_argument(
                field.name.clone(),
                "null can only be compared for equality",
            )),
        };
    }

    let base = operator.negated_base().unwrap_or(operator);
    let predicate = match base {
        FilterOperator::Equal => {
            let rhs = if field.list {
                list_value(ctx, field, value)?
            } else {
                element_value(ctx, field, value)?
            };
            Expr::eq(property, rhs)
        }
        FilterOperator::In => Expr::binary(BinaryOperator::In, property, list_value(ctx, field, value)?),
        FilterOperator::Includes => {
            Expr::binary(BinaryOperator::In, element_value(ctx, field, value)?, property)
        }
        FilterOperator::Distance
        | FilterOperator::LessThan
        | FilterOperator::LessThanEqual
        | FilterOperator::GreaterThan
        | FilterOperator::GreaterThanEqual
            if field.kind.is_spatial() =>
        {
            distance_predicate(ctx, field, property, base, value)?
        }
        other => {
            let op = other.binary_operator().ok_or_else(|| {
                TranslateError::invalid_argument(field.name.clone(), "unsupported comparison")
            })?;
            Expr::binary(op, property, element_value(ctx, field, value)?)
        }
    };

    Ok(WherePredicate::new(if operator.negated_base().is_some() {
        Expr::not(predicate)
    } else {
        predicate
    }))
}

/// `point.distance(prop, point($p.point)) <op> $p.distance`
fn distance_predicate(
    ctx: &mut CompileContext<'_>,
    field: &ScalarField,
    property: Expr,
    operator: FilterOperator,
    value: &Value,
) -> Result<Expr, TranslateError> {
    let object = expect_object(&field.name, value)?;
    if !object.contains_key("point") || !object.contains_key("distance") {
        return Err(TranslateError::invalid_argument(
            field.name.clone(),
            "distance filters need `point` and `distance`",
        ));
    }
    let param = ctx.param(value);
    let op = operator
        .binary_operator()
        .unwrap_or(BinaryOperator::Equal);
    Ok(Expr::binary(
        op,
        Expr::function(
            "point.distance",
            vec![property, Expr::function("point", vec![param.clone().dot("point")])],
        ),
        param.dot("distance"),
    ))
}

/// Convert a JSON value for `field`, turning BigInt strings into integers.
/// Integer fields never fall back to floats.
pub(crate) fn to_param_value(field: &ScalarField, value: &Value) -> Result<ParamValue, TranslateError> {
    match (field.kind, value) {
        (FieldKind::Int | FieldKind::BigInt, Value::Number(n)) => n.as_i64().map(ParamValue::Integer).ok_or_else(|| {
            TranslateError::invalid_argument(field.name.clone(), format!("`{}` is not a 64-bit integer", n))
        }),
        (FieldKind::BigInt, Value::String(s)) => s.parse::<i64>().map(ParamValue::Integer).map_err(|_| {
            TranslateError::invalid_argument(field.name.clone(), format!("`{}` is not a valid BigInt", s))
        }),
        (_, Value::Array(items)) => items
            .iter()
            .map(|item| to_param_value(field, item))
            .collect::<Result<Vec<_>, _>>()
            .map(ParamValue::List),
        _ => Ok(ParamValue::from(value)),
    }
}

/// Wrap a single value in the constructor its field kind needs
fn wrap_element(field: &ScalarField, expr: Expr) -> Expr {
    if let Some(constructor) = field.kind.temporal_constructor() {
        Expr::function(constructor, vec![expr])
    } else if field.kind.is_spatial() {
        Expr::function("point", vec![expr])
    } else {
        expr
    }
}

fn element_value(
    ctx: &mut CompileContext<'_>,
    field: &ScalarField,
    value: &Value,
) -> Result<Expr, TranslateError> {
    let param = ctx.param(to_param_value(field, value)?);
    Ok(wrap_element(field, param))
}

/// A list parameter; temporal and spatial elements are converted with `[v IN $p | f(v)]`
fn list_value(
    ctx: &mut CompileContext<'_>,
    field: &ScalarField,
    value: &Value,
) -> Result<Expr, TranslateError> {
    expect_array(&field.name, value)?;
    let param = ctx.param(to_param_value(field, value)?);
    if field.kind.is_temporal() || field.kind.is_spatial() {
        let item = ctx.value_variable();
        let mapped = wrap_element(field, Expr::variable(&item));
        Ok(Expr::list_map(&item, param, mapped))
    } else {
        Ok(param)
    }
}

/// `MATCH pattern WHERE predicate`, or with subqueries
/// `MATCH pattern CALL {...} WITH * WHERE predicate`
pub fn filtered_match(pattern: Pattern, predicate: Option<Expr>, subqueries: Vec<Clause>) -> Clause {
    if subqueries.is_empty() {
        return Clause::match_pattern(pattern, predicate);
    }
    let mut clauses = vec![Clause::match_pattern(pattern, None)];
    clauses.extend(subqueries);
    if let Some(predicate) = predicate {
        clauses.push(Clause::with_star_where(predicate));
    }
    Clause::concat(clauses)
}

/// One quantified sub-pattern check
struct QuantifiedMatch {
    pattern: Pattern,
    /// Conditions on the matched path that are not part of the user filter
    guard: Option<Expr>,
    filter: WherePredicate,
}

impl QuantifiedMatch {
    fn matching(self, negate_filter: bool) -> Clause {
        let filter = if negate_filter {
            self.filter.predicate.map(Expr::not)
        } else {
            self.filter.predicate
        };
        filtered_match(self.pattern, and_all([self.guard, filter]), self.filter.subqueries)
    }

    fn count(self) -> Expr {
        Expr::count(self.matching(false))
    }

    fn predicate(self, quantifier: RelationshipQuantifier) -> Option<Expr> {
        match quantifier {
            RelationshipQuantifier::Some => Some(Expr::exists(self.matching(false))),
            RelationshipQuantifier::None => Some(Expr::not(Expr::exists(self.matching(false)))),
            // Vacuously true when there is nothing to check
            RelationshipQuantifier::All => {
                self.filter.predicate.as_ref()?;
                Some(Expr::not(Expr::exists(self.matching(true))))
            }
            RelationshipQuantifier::Single => Some(Expr::eq(self.count(), Expr::integer(1))),
        }
    }
}

fn combine_quantified(quantifier: RelationshipQuantifier, branches: Vec<QuantifiedMatch>) -> Option<Expr> {
    match quantifier {
        RelationshipQuantifier::Some => or_all(branches.into_iter().map(|b| b.predicate(quantifier))),
        RelationshipQuantifier::None | RelationshipQuantifier::All => {
            and_all(branches.into_iter().map(|b| b.predicate(quantifier)))
        }
        RelationshipQuantifier::Single => {
            let sum = branches
                .into_iter()
                .map(QuantifiedMatch::count)
                .reduce(|acc, next| Expr::binary(BinaryOperator::Addition, acc, next))?;
            Some(Expr::eq(sum, Expr::integer(1)))
        }
    }
}

fn relationship_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    rel: &'a RelationshipField,
    variable: &Variable,
    quantifier: RelationshipQuantifier,
    value: &Value,
) -> Result<WherePredicate, TranslateError> {
    let target = ctx.schema().target(&rel.target)?;

    if value.is_null() {
        // `rel: null` means no neighbor, `rel_NOT: null` means at least one
        let pattern = relationship_pattern(variable, None, rel, None, neighbor_node(&target, None));
        let exists = Expr::exists(Clause::match_pattern(pattern, None));
        return match quantifier {
            RelationshipQuantifier::Some => Ok(WherePredicate::new(Expr::not(exists))),
            RelationshipQuantifier::None => Ok(WherePredicate::new(exists)),
            _ => Err(TranslateError::invalid_argument(
                rel.name.clone(),
                "null is only allowed without a quantifier",
            )),
        };
    }

    let filter = expect_object(&rel.name, value)?;
    let branches = ctx.nested(|ctx| {
        let mut branches = Vec::new();
        for (node_target, filter) in concrete_filters(ctx, &target, filter)? {
            let neighbor = ctx.graph_variable();
            let (node, guard) = target_node(ctx, node_target, &neighbor);
            let pattern = relationship_pattern(variable, None, rel, None, node);
            let filter = create_where_predicate(ctx, node_target, &neighbor, filter)?;
            branches.push(QuantifiedMatch {
                pattern,
                guard,
                filter,
            });
        }
        Ok(branches)
    })?;
    log::debug!("Compiled relationship filter {} with {:?}", rel.name, quantifier);
    Ok(WherePredicate {
        predicate: combine_quantified(quantifier, branches),
        subqueries: Vec::new(),
    })
}

/// Split a relationship filter into one filter per concrete target. Union
/// filters are keyed by member type, and an empty one stands for every member
/// unfiltered. Entity and interface filters apply as-is.
fn concrete_filters<'a, 'f>(
    ctx: &CompileContext<'a>,
    target: &Target<'a>,
    filter: &'f Map<String, Value>,
) -> Result<Vec<(FilterTarget<'a>, &'f Map<String, Value>)>, TranslateError> {
    match target {
        Target::Entity(entity) => Ok(vec![(FilterTarget::Entity(entity), filter)]),
        Target::Interface(interface) => Ok(vec![(FilterTarget::Interface(interface), filter)]),
        Target::Union(union) if filter.is_empty() => union
            .members
            .iter()
            .map(|member| -> Result<_, TranslateError> {
                Ok((FilterTarget::Entity(ctx.schema().entity(member)?), filter))
            })
            .collect(),
        Target::Union(union) => {
            let mut members = Vec::with_capacity(filter.len());
            for (member, member_filter) in filter {
                if !union.members.iter().any(|m| m == member) {
                    return Err(TranslateError::unknown_field(union.name.clone(), member.clone()));
                }
                members.push((
                    FilterTarget::Entity(ctx.schema().entity(member)?),
                    expect_object(member, member_filter)?,
                ));
            }
            Ok(members)
        }
    }
}

/// Node pattern for a filtered neighbor. Interface neighbors are matched
/// unlabeled and constrained to the implementing labels.
fn target_node(
    ctx: &CompileContext<'_>,
    target: FilterTarget<'_>,
    neighbor: &Variable,
) -> (NodePattern, Option<Expr>) {
    match target {
        FilterTarget::Entity(entity) => (
            NodePattern::new(neighbor).labels(entity.labels.iter().cloned()),
            None,
        ),
        FilterTarget::Interface(interface) => (
            NodePattern::new(neighbor),
            or_all(
                ctx.schema()
                    .implementations(&interface.name)
                    .into_iter()
                    .map(|e| Some(Expr::has_label(neighbor, e.main_label()))),
            ),
        ),
        FilterTarget::Edge(_) => (NodePattern::new(neighbor), None),
    }
}

fn connection_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    rel: &'a RelationshipField,
    variable: &Variable,
    quantifier: RelationshipQuantifier,
    value: &Value,
) -> Result<WherePredicate, TranslateError> {
    let target = ctx.schema().target(&rel.target)?;
    let filter = expect_object(&rel.name, value)?;
    let edge_type = match &rel.properties {
        Some(name) => Some(ctx.schema().relationship_properties(name)?),
        None => None,
    };

    let branches = ctx.nested(|ctx| {
        let mut branches = Vec::new();
        for (node_target, filter) in concrete_filters(ctx, &target, filter)? {
            let neighbor = ctx.graph_variable();
            let edge = ctx.graph_variable();
            let (node, guard) = target_node(ctx, node_target, &neighbor);
            let pattern = relationship_pattern(variable, Some(&edge), rel, None, node);
            let filter = connection_where(ctx, node_target, &neighbor, edge_type, &edge, filter)?;
            branches.push(QuantifiedMatch {
                pattern,
                guard,
                filter,
            });
        }
        Ok(branches)
    })?;

    Ok(WherePredicate {
        predicate: combine_quantified(quantifier, branches),
        subqueries: Vec::new(),
    })
}

/// Filter over a neighbor and the relationship reaching it:
/// `{ node: {...}, edge: {...}, AND: [...], OR: [...], NOT: {...} }`
pub fn connection_where<'a>(
    ctx: &mut CompileContext<'a>,
    node_target: FilterTarget<'a>,
    node: &Variable,
    edge_type: Option<&'a RelationshipDescriptor>,
    edge: &Variable,
    filter: &Map<String, Value>,
) -> Result<WherePredicate, TranslateError> {
    let mut parts = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        let part = match key.as_str() {
            "node" => create_where_predicate(ctx, node_target, node, expect_object(key, value)?)?,
            "edge" => {
                let edge_type = edge_type.ok_or_else(|| {
                    TranslateError::invalid_argument("edge", "relationship has no properties")
                })?;
                create_where_predicate(ctx, FilterTarget::Edge(edge_type), edge, expect_object(key, value)?)?
            }
            "AND" | "OR" => {
                let mut nested = Vec::new();
                for item in expect_array(key, value)? {
                    nested.push(connection_where(
                        ctx,
                        node_target,
                        node,
                        edge_type,
                        edge,
                        expect_object(key, item)?,
                    )?);
                }
                if key == "AND" {
                    WherePredicate::and(nested)
                } else {
                    WherePredicate::or(nested)
                }
            }
            "NOT" => {
                let inner = connection_where(ctx, node_target, node, edge_type, edge, expect_object(key, value)?)?;
                WherePredicate {
                    predicate: inner.predicate.map(Expr::not),
                    subqueries: inner.subqueries,
                }
            }
            other => return Err(TranslateError::unknown_field(format!("{}Connection", node_target.name()), other)),
        };
        parts.push(part);
    }
    Ok(WherePredicate::and(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::cypher::{build, Clause, Environment, Expr, NodePattern, Pattern};
    use crate::schema::Schema;
    use crate::translate::context::AuthContext;
    use serde_json::json;

    const SCHEMA: &str = r#"
entities:
  - name: Movie
    fields:
      - { name: title, type: String }
      - { name: released, type: DateTime }
      - { name: tags, type: String, list: true }
      - { name: views, type: BigInt }
    relationships:
      - { name: director, type: DIRECTED, target: Person, direction: IN }
      - { name: actors, type: ACTED_IN, target: Person, direction: IN, list: true, properties: ActedIn }
      - { name: credits, type: CREDITED, target: Credit, direction: OUT, list: true }
  - name: Person
    fields:
      - { name: name, type: String }
      - { name: location, type: Point }
  - name: Company
    fields:
      - { name: name, type: String }
unions:
  - { name: Credit, members: [Person, Company] }
relationship_properties:
  - name: ActedIn
    fields:
      - { name: year, type: Int }
"#;

    fn compile(filter: serde_json::Value) -> Result<crate::cypher::CompiledQuery, TranslateError> {
        let schema = Schema::from_yaml_str(SCHEMA).unwrap();
        let config = CompilerConfig::default();
        let auth = AuthContext::anonymous();
        let mut ctx = CompileContext::new(&schema, &config, &auth);
        let this = ctx.named("this");
        let movie = schema.entity("Movie").unwrap();
        let filter = filter.as_object().unwrap().clone();
        let predicate = create_where_predicate(&mut ctx, FilterTarget::Entity(movie), &this, &filter)?;
        let clause = Clause::concat([
            filtered_match(
                Pattern::node(NodePattern::new(&this).labels(["Movie"])),
                predicate.predicate,
                predicate.subqueries,
            ),
            Clause::return_as(Expr::variable(&this), &this),
        ]);
        Ok(build(&clause)?)
    }

    #[test]
    fn test_equality_and_some() {
        let query = compile(json!({ "title": "Up", "director_SOME": { "name": "X" } })).unwrap();
        assert_eq!(
            query.text,
            "MATCH (this:Movie)\n\
             WHERE this.title = $param0 AND EXISTS {\n    \
                 MATCH (this)<-[:DIRECTED]-(this0:Person)\n    \
                 WHERE this0.name = $param1\n\
             }\n\
             RETURN this"
        );
        assert_eq!(query.parameters.len(), 2);
    }

    #[test]
    fn test_big_integers_are_not_coerced_to_floats() {
        let query = compile(json!({ "views_GT": 9_007_199_254_740_993_i64 })).unwrap();
        assert_eq!(query.parameters["param0"], ParamValue::Integer(9_007_199_254_740_993));

        for filter in [
            json!({ "views": 18_446_744_073_709_551_615_u64 }),
            json!({ "views_IN": [1, 18_446_744_073_709_551_615_u64] }),
            json!({ "views": 1.5 }),
        ] {
            assert!(matches!(
                compile(filter),
                Err(TranslateError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn test_empty_union_quantifier_checks_every_member() {
        let some = compile(json!({ "credits_SOME": {} })).unwrap();
        let person = some.text.find("MATCH (this)-[:CREDITED]->(this0:Person)").unwrap();
        let company = some.text.find("MATCH (this)-[:CREDITED]->(this1:Company)").unwrap();
        assert!(person < company);
        assert!(some.text.contains("} OR EXISTS {"));

        let none = compile(json!({ "credits_NONE": {} })).unwrap();
        assert!(none.text.contains("WHERE NOT (EXISTS {"));
        assert!(none.text.contains("}) AND NOT (EXISTS {"));

        let single = compile(json!({ "credits_SINGLE": {} })).unwrap();
        assert!(single.text.contains("} + COUNT {"));
        assert!(single.text.contains("}) = 1\n"));
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let query = compile(json!({})).unwrap();
        assert_eq!(query.text, "MATCH (this:Movie)\nRETURN this");
        let query = compile(json!({ "AND": [] })).unwrap();
        assert_eq!(query.text, "MATCH (this:Movie)\nRETURN this");
    }

    #[test]
    fn test_and_distributes() {
        let combined = compile(json!({ "AND": [{ "title": "Up" }, { "tags_INCLUDES": "a" }] })).unwrap();
        let flat = compile(json!({ "title": "Up", "tags_INCLUDES": "a" })).unwrap();
        assert_eq!(combined, flat);
    }

    #[test]
    fn test_null_comparisons() {
        let query = compile(json!({ "title": null, "director": null })).unwrap();
        assert!(query.text.contains("this.title IS NULL"));
        assert!(query.text.contains("NOT (EXISTS {\n    MATCH (this)<-[:DIRECTED]-(:Person)\n})"));
        let query = compile(json!({ "title_NOT": null })).unwrap();
        assert!(query.text.contains("this.title IS NOT NULL"));
    }

    #[test]
    fn test_temporal_constructor() {
        let query = compile(json!({ "released_GT": "2020-01-01T00:00:00Z" })).unwrap();
        assert!(query.text.contains("this.released > datetime($param0)"));
        let query = compile(json!({ "released_IN": ["2020-01-01T00:00:00Z"] })).unwrap();
        assert!(query.text.contains("this.released IN [var0 IN $param0 | datetime(var0)]"));
    }

    #[test]
    fn test_big_int_strings_become_integers() {
        let query = compile(json!({ "views_GT": "9007199254740993" })).unwrap();
        assert_eq!(
            query.parameters.get("param0"),
            Some(&ParamValue::Integer(9007199254740993))
        );
    }

    #[test]
    fn test_all_and_single() {
        let query = compile(json!({ "actors_ALL": { "name": "X" } })).unwrap();
        assert!(query.text.contains("NOT (EXISTS {"));
        assert!(query.text.contains("WHERE NOT (this0.name = $param0)"));
        let query = compile(json!({ "actors_SINGLE": { "name": "X" } })).unwrap();
        assert!(query.text.contains("COUNT {"));
        assert!(query.text.contains("} = 1"));
        let query = compile(json!({ "actors_ALL": {} })).unwrap();
        assert_eq!(query.text, "MATCH (this:Movie)\nRETURN this");
    }

    #[test]
    fn test_connection_filter_uses_edge_properties() {
        let query = compile(json!({
            "actorsConnection_SOME": { "node": { "name": "X" }, "edge": { "year_GT": 2000 } }
        }))
        .unwrap();
        // The relationship variable is named first because it is rendered first
        assert!(query.text.contains("MATCH (this)<-[this0:ACTED_IN]-(this1:Person)"));
        assert!(query.text.contains("WHERE this1.name = $param0 AND this0.year > $param1"));
    }

    #[test]
    fn test_input_shape_errors() {
        assert!(matches!(
            compile(json!({ "title_SOME": {} })),
            Err(TranslateError::QuantifierOnNonRelationship { .. })
        ));
        assert!(matches!(
            compile(json!({ "tags_CONTAINS": "x" })),
            Err(TranslateError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            compile(json!({ "rating": 3 })),
            Err(TranslateError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_filtered_match_with_subqueries() {
        let mut env = Environment::new();
        let this = env.named("this");
        let result = env.value_variable();
        let call = Clause::call(
            &[&this],
            Clause::return_as(Expr::boolean(true), &result),
        );
        let clause = filtered_match(
            Pattern::node(NodePattern::new(&this)),
            Some(Expr::eq(Expr::variable(&result), Expr::boolean(true))),
            vec![call],
        );
        assert_eq!(clause.flattened().len(), 3);
    }
}
