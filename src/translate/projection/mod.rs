//! Return shape of a node selection.
//!
//! [`create_projection`] turns the selected fields of one entity into a map
//! projection over the node variable (`this { .title, actors: var1 }`). Fields
//! that need their own query (relationships, custom statements, relationship
//! aggregations) compile to `CALL` subqueries whose result variable is
//! referenced from the map.
//!
//! Connection fields and interface-typed relationship fields are not compiled
//! here. They are surfaced in [`ProjectionMeta`] with a reserved result
//! variable, and whoever owns the enclosing scope splices them in with
//! [`splice_pending_fields`] after sorting and paging.

use std::collections::{HashMap, HashSet};

use super::aggregate::create_relationship_aggregate;
use super::auth::{create_auth_predicate, AuthKind};
use super::connection::create_connection_subquery;
use super::context::CompileContext;
use super::errors::TranslateError;
use super::sort::SortField;
use crate::cypher::{Clause, Expr, MapEntry, Variable};
use crate::schema::{EntityDescriptor, FieldKind, FieldRef, Operation, RelationshipField, ScalarField, Target};
use crate::selection::SelectionNode;

pub mod custom_cypher;
pub mod relationship;
pub mod union;

/// Key every union/interface member carries so the caller can tell types apart
pub const RESOLVE_TYPE_KEY: &str = "__resolveType";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Connection,
    Interface,
}

/// A field whose subquery must be spliced in by the owner of the scope
#[derive(Debug, Clone)]
pub struct PendingField<'a> {
    pub kind: PendingKind,
    pub field: &'a RelationshipField,
    pub selection: SelectionNode,
    /// Variable the projection map already references
    pub result: Variable,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectionMeta<'a> {
    /// Field-level `allow` predicates to validate together with the entity guard
    pub auth_validate_predicates: Vec<Expr>,
    pub connection_fields: Vec<PendingField<'a>>,
    pub interface_fields: Vec<PendingField<'a>>,
    /// Result variables of custom fields that the sort refers to
    pub sort_values: HashMap<String, Variable>,
}

#[derive(Debug, Clone)]
pub struct ProjectionResult<'a> {
    pub projection: Expr,
    pub subqueries: Vec<Clause>,
    /// Subqueries producing values the sort refers to
    pub subqueries_before_sort: Vec<Clause>,
    pub meta: ProjectionMeta<'a>,
}

/// Project `fields` of `entity` bound to `variable`.
///
/// Custom fields named in `sort` are compiled even when not selected and are
/// placed in `subqueries_before_sort`. With `resolve_type` the map also carries
/// the [`RESOLVE_TYPE_KEY`] tag.
pub fn create_projection<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    variable: &Variable,
    fields: &[&SelectionNode],
    sort: &[SortField],
    resolve_type: bool,
) -> Result<ProjectionResult<'a>, TranslateError> {
    let sorted_on: HashSet<&str> = sort.iter().map(|s| s.field.as_str()).collect();
    let mut entries = Vec::with_capacity(fields.len() + 1);
    let mut subqueries = Vec::new();
    let mut subqueries_before_sort = Vec::new();
    let mut meta = ProjectionMeta::default();

    if resolve_type {
        entries.push(MapEntry::Keyed(
            RESOLVE_TYPE_KEY.to_string(),
            Expr::string(entity.name.clone()),
        ));
    }

    for selection in fields {
        let key = selection.response_key().to_string();
        if selection.name == "__typename" {
            entries.push(MapEntry::Keyed(key, Expr::string(entity.name.clone())));
            continue;
        }

        match entity.field(&selection.name) {
            Some(FieldRef::Scalar(field)) => {
                if let Some(predicate) = field_allow_predicate(ctx, entity, field, variable)? {
                    meta.auth_validate_predicates.push(predicate);
                }
                entries.push(scalar_entry(ctx, field, variable, key));
            }
            Some(FieldRef::Custom(custom)) => {
                let result = ctx.value_variable();
                let subquery = ctx.nested(|ctx| {
                    custom_cypher::create_custom_subquery(ctx, variable, custom, selection, &result)
                })?;
                if sorted_on.contains(custom.name.as_str()) {
                    meta.sort_values.insert(custom.name.clone(), result.clone());
                    subqueries_before_sort.push(subquery);
                } else {
                    subqueries.push(subquery);
                }
                entries.push(MapEntry::Keyed(key, Expr::variable(&result)));
            }
            Some(FieldRef::Relationship(rel)) => {
                let result = ctx.value_variable();
                if let Target::Interface(_) = ctx.schema().target(&rel.target)? {
                    meta.interface_fields.push(PendingField {
                        kind: PendingKind::Interface,
                        field: rel,
                        selection: (*selection).clone(),
                        result: result.clone(),
                    });
                } else {
                    let subquery = ctx.nested(|ctx| {
                        relationship::create_relationship_subquery(ctx, variable, rel, selection, &result)
                    })?;
                    subqueries.push(subquery);
                }
                entries.push(MapEntry::Keyed(key, Expr::variable(&result)));
            }
            None => {
                if let Some(rel) = suffixed_relationship(entity, &selection.name, "Connection") {
                    let result = ctx.value_variable();
                    meta.connection_fields.push(PendingField {
                        kind: PendingKind::Connection,
                        field: rel,
                        selection: (*selection).clone(),
                        result: result.clone(),
                    });
                    entries.push(MapEntry::Keyed(key, Expr::variable(&result)));
                } else if let Some(rel) = suffixed_relationship(entity, &selection.name, "Aggregate") {
                    let result = ctx.value_variable();
                    let subquery = ctx.nested(|ctx| {
                        create_relationship_aggregate(ctx, variable, rel, selection, &result)
                    })?;
                    subqueries.push(subquery);
                    entries.push(MapEntry::Keyed(key, Expr::variable(&result)));
                } else {
                    return Err(TranslateError::unknown_field(entity.name.clone(), selection.name.clone()));
                }
            }
        }
    }

    // Sorting on a custom field needs its value even when it isn't selected
    for sort_field in sort {
        if meta.sort_values.contains_key(&sort_field.field) {
            continue;
        }
        if let Some(custom) = entity.custom(&sort_field.field) {
            let result = ctx.value_variable();
            let selection = SelectionNode::new(custom.name.clone());
            let subquery = ctx.nested(|ctx| {
                custom_cypher::create_custom_subquery(ctx, variable, custom, &selection, &result)
            })?;
            meta.sort_values.insert(custom.name.clone(), result);
            subqueries_before_sort.push(subquery);
        }
    }

    log::debug!(
        "Projected {} fields of {} with {} subqueries",
        entries.len(),
        entity.name,
        subqueries.len() + subqueries_before_sort.len()
    );

    Ok(ProjectionResult {
        projection: Expr::map_projection(variable, entries),
        subqueries,
        subqueries_before_sort,
        meta,
    })
}

/// Compile the connection and interface fields surfaced in `meta`, in
/// selection order per kind, as subqueries over `variable`.
pub fn splice_pending_fields<'a>(
    ctx: &mut CompileContext<'a>,
    variable: &Variable,
    meta: &ProjectionMeta<'a>,
) -> Result<Vec<Clause>, TranslateError> {
    let mut clauses = Vec::with_capacity(meta.connection_fields.len() + meta.interface_fields.len());
    for pending in meta.connection_fields.iter().chain(meta.interface_fields.iter()) {
        let clause = ctx.nested(|ctx| match pending.kind {
            PendingKind::Connection => {
                create_connection_subquery(ctx, variable, pending.field, &pending.selection, &pending.result)
            }
            PendingKind::Interface => relationship::create_relationship_subquery(
                ctx,
                variable,
                pending.field,
                &pending.selection,
                &pending.result,
            ),
        })?;
        clauses.push(clause);
    }
    Ok(clauses)
}

/// `fooConnection` / `fooAggregate` to the relationship `foo`
fn suffixed_relationship<'a>(
    entity: &'a EntityDescriptor,
    name: &str,
    suffix: &str,
) -> Option<&'a RelationshipField> {
    name.strip_suffix(suffix).and_then(|rel| entity.relationship(rel))
}

/// Read `allow` rules attached to a single scalar field
pub(crate) fn field_allow_predicate<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    field: &'a ScalarField,
    variable: &Variable,
) -> Result<Option<Expr>, TranslateError> {
    let rules: Vec<_> = field
        .auth
        .iter()
        .filter(|rule| rule.applies_to(Operation::Read))
        .collect();
    if rules.is_empty() {
        return Ok(None);
    }
    create_auth_predicate(ctx, &rules, entity, variable, AuthKind::Allow)
}

fn scalar_entry(ctx: &mut CompileContext<'_>, field: &ScalarField, variable: &Variable, key: String) -> MapEntry {
    if key == field.db_name() && !needs_transform(ctx, field) {
        return MapEntry::Property(key);
    }
    MapEntry::Keyed(key, scalar_value(ctx, field, variable))
}

fn needs_transform(ctx: &CompileContext<'_>, field: &ScalarField) -> bool {
    field.kind.is_spatial() || (field.kind == FieldKind::DateTime && ctx.config().format_datetime)
}

/// Property read of `field`, formatted the way clients expect its kind
pub(crate) fn scalar_value(ctx: &mut CompileContext<'_>, field: &ScalarField, variable: &Variable) -> Expr {
    let property = Expr::property(variable, field.db_name());
    if !needs_transform(ctx, field) {
        return property;
    }
    let transform: fn(Expr) -> Expr = if field.kind.is_spatial() {
        point_map
    } else {
        format_datetime
    };
    if field.list {
        let item = ctx.value_variable();
        return Expr::list_map(&item, property, transform(Expr::variable(&item)));
    }
    if field.kind.is_spatial() {
        Expr::case_when(Expr::is_not_null(property.clone()), point_map(property), Expr::null())
    } else {
        format_datetime(property)
    }
}

/// ISO offset string, the form clients parse back into a date-time
fn format_datetime(value: Expr) -> Expr {
    Expr::function(
        "apoc.date.convertFormat",
        vec![
            Expr::function("toString", vec![value]),
            Expr::string("iso_zoned_date_time"),
            Expr::string("iso_offset_date_time"),
        ],
    )
}

/// `{ point: p, crs: p.crs }`
fn point_map(value: Expr) -> Expr {
    Expr::Map(vec![
        ("point".to_string(), value.clone()),
        ("crs".to_string(), value.dot("crs")),
    ])
}
