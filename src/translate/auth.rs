//! Authorization rules to predicates and guards.
//!
//! Rules from one list are ORed: any matching rule grants access. The parts
//! of a single rule (`roles`, `isAuthenticated`, the `allow`/`where`/`bind`
//! shape and nested `AND`/`OR` rules) are ANDed.
//!
//! `where` rules become row filters. `allow` and `bind` rules become
//! `apoc.util.validate` guards that abort the whole query with
//! [`AUTH_FORBIDDEN_ERROR`]; they must be placed before any data of the guarded
//! node is projected.

use serde_json::{Map, Value};

use super::context::CompileContext;
use super::errors::TranslateError;
use super::{expect_array, expect_object, relationship_pattern};
use crate::cypher::{
    and_all, or_all, BinaryOperator, Clause, Expr, NodePattern, Pattern, Quantifier, Variable,
};
use crate::schema::{AuthorizationRule, EntityDescriptor, RuleShape, Target};

/// Message of every access-denied abort. Carries no detail on purpose.
pub const AUTH_FORBIDDEN_ERROR: &str = "Forbidden";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Allow,
    Where,
    Bind,
}

impl AuthKind {
    fn shape<'r>(&self, rule: &'r AuthorizationRule) -> Option<&'r RuleShape> {
        match self {
            AuthKind::Allow => rule.allow.as_ref(),
            AuthKind::Where => rule.where_.as_ref(),
            AuthKind::Bind => rule.bind.as_ref(),
        }
    }

    /// Whether `rule` says anything for this kind. A `where` rule only
    /// restricts reads through its `where` shape; `allow` also covers the
    /// role and authentication checks.
    fn participates(&self, rule: &AuthorizationRule) -> bool {
        let own = match self {
            AuthKind::Allow => {
                rule.allow.is_some() || !rule.roles.is_empty() || rule.is_authenticated.is_some()
            }
            AuthKind::Where => rule.where_.is_some(),
            AuthKind::Bind => rule.bind.is_some(),
        };
        own || rule
            .and
            .iter()
            .chain(rule.or.iter())
            .any(|nested| self.participates(nested))
    }
}

/// Predicate for `rules` bound against `variable`. `None` when no rule applies
/// to this kind, which means no restriction.
pub fn create_auth_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    rules: &[&'a AuthorizationRule],
    entity: &'a EntityDescriptor,
    variable: &Variable,
    kind: AuthKind,
) -> Result<Option<Expr>, TranslateError> {
    let mut alternatives = Vec::new();
    for rule in rules {
        if !kind.participates(rule) {
            continue;
        }
        let predicate = rule_predicate(ctx, rule, entity, variable, kind)?;
        // One unconditional rule grants access on its own
        if is_true(&predicate) {
            return Ok(Some(Expr::boolean(true)));
        }
        alternatives.push(Some(predicate));
    }
    Ok(or_all(alternatives))
}

/// `CALL apoc.util.validate(NOT (<all predicates>), "Forbidden", [0])`, or
/// nothing when every predicate is trivially true.
pub fn create_auth_guard(predicates: Vec<Expr>) -> Option<Clause> {
    let predicate = and_all(predicates.into_iter().filter(|p| !is_true(p)).map(Some))?;
    Some(Clause::validate(Expr::not(predicate), AUTH_FORBIDDEN_ERROR))
}

fn is_true(expr: &Expr) -> bool {
    *expr == Expr::boolean(true)
}

fn rule_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    rule: &'a AuthorizationRule,
    entity: &'a EntityDescriptor,
    variable: &Variable,
    kind: AuthKind,
) -> Result<Expr, TranslateError> {
    let mut parts = Vec::new();

    if !rule.roles.is_empty() {
        let role = ctx.value_variable();
        let required = ctx.param(crate::cypher::ParamValue::List(
            rule.roles.iter().map(|r| r.as_str().into()).collect(),
        ));
        let granted = ctx.auth_param().dot("roles");
        parts.push(Some(Expr::quantified(
            Quantifier::Any,
            &role,
            required,
            Expr::binary(BinaryOperator::In, Expr::variable(&role), granted),
        )));
    }

    if let Some(required) = rule.is_authenticated {
        let flag = ctx.auth_param().dot("isAuthenticated");
        parts.push(Some(Expr::eq(flag, ctx.param(required))));
    }

    if let Some(shape) = kind.shape(rule) {
        if !shape.is_wildcard() {
            let object = shape.as_object().ok_or_else(|| {
                TranslateError::invalid_argument(entity.name.clone(), "rule shape must be an object")
            })?;
            parts.push(shape_predicate(ctx, entity, variable, object, kind)?);
        }
    }

    for nested in &rule.and {
        if kind.participates(nested) {
            parts.push(Some(rule_predicate(ctx, nested, entity, variable, kind)?));
        }
    }

    let mut alternatives = Vec::new();
    for nested in &rule.or {
        if kind.participates(nested) {
            alternatives.push(Some(rule_predicate(ctx, nested, entity, variable, kind)?));
        }
    }
    parts.push(or_all(alternatives));

    Ok(and_all(parts).unwrap_or_else(|| Expr::boolean(true)))
}

/// Value a rule compares against: `$jwt.*`/`$context.*` references resolve
/// from the request, anything else is a constant from the rule.
fn rule_value(ctx: &mut CompileContext<'_>, value: &Value) -> Expr {
    let resolved = value
        .as_str()
        .and_then(|s| ctx.auth().resolve_reference(s))
        .unwrap_or_else(|| value.clone());
    ctx.param(&resolved)
}

/// Field-map shape: scalar equality, relationship traversal and `AND`/`OR`
fn shape_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    variable: &Variable,
    shape: &Map<String, Value>,
    kind: AuthKind,
) -> Result<Option<Expr>, TranslateError> {
    let mut parts = Vec::with_capacity(shape.len());
    for (key, value) in shape {
        let part = match key.as_str() {
            "AND" | "OR" => {
                let mut nested = Vec::new();
                for item in expect_array(key, value)? {
                    nested.push(shape_predicate(ctx, entity, variable, expect_object(key, item)?, kind)?);
                }
                if key == "AND" {
                    and_all(nested)
                } else {
                    or_all(nested)
                }
            }
            field_name => {
                if let Some(field) = entity.scalar(field_name) {
                    let property = Expr::property(variable, field.db_name());
                    let expected = rule_value(ctx, value);
                    Some(Expr::is_not_null(property.clone()).and(Expr::eq(property, expected)))
                } else if let Some(rel) = entity.relationship(field_name) {
                    let target = match ctx.schema().target(&rel.target)? {
                        Target::Entity(target) => target,
                        other => {
                            return Err(TranslateError::invalid_argument(
                                field_name,
                                format!("authorization rules cannot traverse to abstract type `{}`", other.name()),
                            ))
                        }
                    };
                    let nested = expect_object(field_name, value)?;
                    let neighbor = ctx.graph_variable();
                    let node = NodePattern::new(&neighbor).labels(target.labels.iter().cloned());
                    let pattern = relationship_pattern(variable, None, rel, None, node);
                    Some(match kind {
                        AuthKind::Where => {
                            let inner = shape_predicate(ctx, target, &neighbor, nested, kind)?;
                            Expr::exists(Clause::match_pattern(pattern, inner))
                        }
                        AuthKind::Allow | AuthKind::Bind => {
                            traversal_all(ctx, target, pattern, &neighbor, nested, kind)?
                        }
                    })
                } else {
                    return Err(TranslateError::unknown_field(entity.name.clone(), field_name));
                }
            }
        };
        parts.push(part);
    }
    Ok(and_all(parts))
}

/// At least one neighbor exists and every neighbor satisfies the shape:
/// `EXISTS { MATCH p } AND all(v IN [p | n] WHERE shape(v))`
fn traversal_all<'a>(
    ctx: &mut CompileContext<'a>,
    target: &'a EntityDescriptor,
    pattern: Pattern,
    neighbor: &Variable,
    shape: &Map<String, Value>,
    kind: AuthKind,
) -> Result<Expr, TranslateError> {
    let item = ctx.graph_variable();
    let inner = shape_predicate(ctx, target, &item, shape, kind)?.unwrap_or_else(|| Expr::boolean(true));
    let exists = Expr::exists(Clause::match_pattern(pattern.clone(), None));
    let neighbors = Expr::PatternComprehension {
        pattern,
        filter: None,
        map: Box::new(Expr::variable(neighbor)),
    };
    Ok(exists.and(Expr::quantified(Quantifier::All, &item, neighbors, inner)))
}
