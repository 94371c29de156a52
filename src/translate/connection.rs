//! `<rel>Connection` fields: neighbors returned as an edge list with the
//! relationship's own properties and a total count.
//!
//! The total is taken over every matched edge. Sorting and the
//! `first`/`after` window then apply to the collected list, so they work the
//! same way whether the edges came from one entity or from a union of member
//! branches.
//!
//! ```text
//! CALL {
//!     WITH this
//!     MATCH (this)<-[this0:ACTED_IN]-(this1:Person)
//!     WITH { year: this0.year, node: this1 { .name } } AS var2
//!     WITH collect(var2) AS var3
//!     WITH var3, size(var3) AS var4
//!     CALL {
//!         WITH var3
//!         UNWIND var3 AS var2
//!         WITH var2
//!         ORDER BY var2.node.name ASC
//!         SKIP $param0
//!         LIMIT $param1
//!         RETURN collect(var2) AS var5
//!     }
//!     RETURN { edges: var5, totalCount: var4 } AS var6
//! }
//! ```

use serde_json::{Map, Value};

use super::auth::{create_auth_guard, create_auth_predicate, AuthKind};
use super::context::CompileContext;
use super::cursor::cursor_to_offset;
use super::errors::TranslateError;
use super::projection::{create_projection, scalar_value, splice_pending_fields};
use super::sort::{effective_limit, parse_count, parse_direction, SortField};
use super::where_clause::{connection_where, filtered_match, FilterTarget, WherePredicate};
use super::{directed_argument, expect_array, expect_object, relationship_pattern};
use crate::cypher::{Clause, Expr, NodePattern, OrderItem, Projection, ProjectionItem, Variable};
use crate::schema::{
    EntityDescriptor, InterfaceDescriptor, Operation, QueryOptions, RelationshipDescriptor, RelationshipField,
    ScalarField, Target,
};
use crate::selection::SelectionNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortSide {
    Node,
    Edge,
}

#[derive(Debug, Clone, PartialEq)]
struct ConnectionSort {
    side: SortSide,
    field: SortField,
}

#[derive(Debug, Default)]
struct ConnectionArguments<'s> {
    filter: Option<&'s Map<String, Value>>,
    first: Option<u32>,
    /// Rows before the page: one past the row the `after` cursor names
    skip: Option<i64>,
    sort: Vec<ConnectionSort>,
    directed: Option<bool>,
}

impl<'s> ConnectionArguments<'s> {
    fn parse(selection: &'s SelectionNode) -> Result<Self, TranslateError> {
        let mut args = ConnectionArguments {
            directed: directed_argument(selection)?,
            ..Default::default()
        };
        for (key, value) in &selection.arguments {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "where" => args.filter = Some(expect_object("where", value)?),
                "first" => args.first = Some(parse_count("first", value)?),
                "after" => {
                    let cursor = value.as_str().ok_or_else(|| {
                        TranslateError::invalid_argument("after", format!("expected a cursor, got {}", value))
                    })?;
                    args.skip = Some(skip_after(cursor_to_offset(cursor)?)?);
                }
                "sort" => args.sort = parse_connection_sort(value)?,
                "directed" => {}
                other => {
                    return Err(TranslateError::invalid_argument(
                        other,
                        format!("`{}` takes no such argument", selection.name),
                    ))
                }
            }
        }
        Ok(args)
    }
}

/// The cursor names the last row seen, so the page starts one past it
fn skip_after(offset: u64) -> Result<i64, TranslateError> {
    i64::try_from(offset)
        .ok()
        .and_then(|offset| offset.checked_add(1))
        .ok_or_else(|| TranslateError::invalid_argument("after", format!("cursor offset {} is out of range", offset)))
}

/// `[{ node: { name: ASC } }, { edge: { year: DESC } }]`
fn parse_connection_sort(value: &Value) -> Result<Vec<ConnectionSort>, TranslateError> {
    let mut sort = Vec::new();
    for item in expect_array("sort", value)? {
        for (key, fields) in expect_object("sort", item)? {
            let side = match key.as_str() {
                "node" => SortSide::Node,
                "edge" => SortSide::Edge,
                other => return Err(TranslateError::unknown_field("sort", other)),
            };
            for (field, direction) in expect_object(key, fields)? {
                sort.push(ConnectionSort {
                    side,
                    field: SortField {
                        field: field.clone(),
                        direction: parse_direction(field, direction)?,
                    },
                });
            }
        }
    }
    Ok(sort)
}

/// What the caller selected under `edges`
struct EdgeShape<'s, 'a> {
    node: Option<&'s SelectionNode>,
    properties: Vec<(String, &'a ScalarField)>,
}

impl<'s, 'a> EdgeShape<'s, 'a> {
    fn from_selection(
        selection: &'s SelectionNode,
        rel: &RelationshipField,
        edge_type: Option<&'a RelationshipDescriptor>,
    ) -> Result<Self, TranslateError> {
        let mut shape = EdgeShape {
            node: None,
            properties: Vec::new(),
        };
        for child in selection.children() {
            match child.name.as_str() {
                "edges" => {}
                "totalCount" | "pageInfo" | "__typename" => continue,
                other => return Err(TranslateError::unknown_field(format!("{}Connection", rel.name), other)),
            }
            for item in child.children() {
                match item.name.as_str() {
                    "node" => shape.node = Some(item),
                    "cursor" | "__typename" => {}
                    other => match edge_type.and_then(|t| t.field(other)) {
                        Some(field) => shape.properties.push((item.response_key().to_string(), field)),
                        None => {
                            return Err(TranslateError::unknown_field(format!("{}Relationship", rel.name), other))
                        }
                    },
                }
            }
        }
        Ok(shape)
    }
}

pub fn create_connection_subquery<'a>(
    ctx: &mut CompileContext<'a>,
    source: &Variable,
    rel: &'a RelationshipField,
    selection: &SelectionNode,
    result: &Variable,
) -> Result<Clause, TranslateError> {
    let schema = ctx.schema();
    let target = schema.target(&rel.target)?;
    let edge_type = rel
        .properties
        .as_deref()
        .map(|name| schema.relationship_properties(name))
        .transpose()?;
    let args = ConnectionArguments::parse(selection)?;
    let shape = EdgeShape::from_selection(selection, rel, edge_type)?;
    validate_sort(rel, target, edge_type, &args.sort)?;

    let interface = match target {
        Target::Interface(interface) => Some(interface),
        _ => None,
    };
    let is_union = matches!(target, Target::Union(_));
    let members = schema.concrete_entities(&target)?;
    if let (Some(filter), true) = (args.filter, is_union) {
        for key in filter.keys() {
            if !members.iter().any(|m| &m.name == key) {
                return Err(TranslateError::unknown_field(target.name(), key.clone()));
            }
        }
    }

    let edge = ctx.value_variable();
    let mut branches = Vec::with_capacity(members.len());
    for member in members {
        let filter = match (args.filter, is_union) {
            (None, _) => None,
            (Some(filter), false) => Some(filter),
            (Some(filter), true) if filter.is_empty() => None,
            (Some(filter), true) => match filter.get(&member.name) {
                Some(value) => Some(expect_object(&member.name, value)?),
                None => continue,
            },
        };
        let branch = ConnectionBranch {
            source,
            rel,
            member,
            interface,
            edge_type,
            directed: args.directed,
            resolve_type: !matches!(target, Target::Entity(_)),
        };
        branches.push(branch.compile(ctx, filter, &shape, &args.sort)?);
    }

    if branches.is_empty() {
        let empty = Expr::Map(vec![
            ("edges".to_string(), Expr::List(Vec::new())),
            ("totalCount".to_string(), Expr::integer(0)),
        ]);
        return Ok(Clause::call(&[source], Clause::return_as(empty, result)));
    }

    let edge_rows = match target {
        Target::Entity(_) => {
            let (mut body, map) = branches.remove(0);
            body.push(Clause::with(
                Projection::items(vec![ProjectionItem::aliased(map, &edge)]),
                None,
            ));
            Clause::concat(body)
        }
        Target::Union(_) | Target::Interface(_) => {
            let branches = branches
                .into_iter()
                .map(|(mut body, map)| {
                    body.push(Clause::return_as(map, &edge));
                    Clause::concat(body)
                })
                .collect();
            Clause::call(&[source], Clause::Union(branches))
        }
    };

    let edges = ctx.value_variable();
    let total = ctx.value_variable();
    let mut body = vec![
        edge_rows,
        Clause::with(
            Projection::items(vec![ProjectionItem::aliased(
                Expr::function("collect", vec![Expr::variable(&edge)]),
                &edges,
            )]),
            None,
        ),
        Clause::with(
            Projection::items(vec![
                ProjectionItem::bare(&edges),
                ProjectionItem::aliased(Expr::function("size", vec![Expr::variable(&edges)]), &total),
            ]),
            None,
        ),
    ];

    let query_options = match target {
        Target::Entity(entity) => entity.query_options,
        _ => QueryOptions::default(),
    };
    let limit = effective_limit(args.first, &query_options, ctx.config());
    let page = match window(ctx, &edge, &edges, &args.sort, args.skip, limit) {
        Some((clause, paged)) => {
            body.push(clause);
            paged
        }
        None => edges,
    };
    body.push(Clause::return_as(
        Expr::Map(vec![
            ("edges".to_string(), Expr::variable(&page)),
            ("totalCount".to_string(), Expr::variable(&total)),
        ]),
        result,
    ));

    log::debug!("Compiled connection field {}Connection", rel.name);
    Ok(Clause::call(&[source], Clause::concat(body)))
}

fn validate_sort(
    rel: &RelationshipField,
    target: Target<'_>,
    edge_type: Option<&RelationshipDescriptor>,
    sort: &[ConnectionSort],
) -> Result<(), TranslateError> {
    for item in sort {
        let field = item.field.field.as_str();
        let known = match (item.side, target) {
            (SortSide::Node, Target::Union(union)) => {
                return Err(TranslateError::invalid_argument(
                    "sort",
                    format!("`{}` is a union; its members share no fields to sort on", union.name),
                ))
            }
            (SortSide::Node, Target::Entity(entity)) => entity.scalar(field).is_some(),
            (SortSide::Node, Target::Interface(interface)) => interface.scalar(field).is_some(),
            (SortSide::Edge, _) => edge_type.and_then(|t| t.field(field)).is_some(),
        };
        if !known {
            let owner = match item.side {
                SortSide::Node => target.name().to_string(),
                SortSide::Edge => format!("{}Relationship", rel.name),
            };
            return Err(TranslateError::unknown_field(owner, field));
        }
    }
    Ok(())
}

/// `CALL { UNWIND edges ... ORDER BY ... SKIP ... LIMIT ... }` over the
/// collected edges, or `None` when the whole list is returned as is
fn window(
    ctx: &mut CompileContext<'_>,
    edge: &Variable,
    edges: &Variable,
    sort: &[ConnectionSort],
    skip: Option<i64>,
    limit: Option<u32>,
) -> Option<(Clause, Variable)> {
    if sort.is_empty() && skip.is_none() && limit.is_none() {
        return None;
    }
    let order_by = sort
        .iter()
        .map(|item| {
            let row = Expr::variable(edge);
            let expr = match item.side {
                SortSide::Node => row.dot("node").dot(item.field.field.clone()),
                SortSide::Edge => row.dot(item.field.field.clone()),
            };
            OrderItem {
                expr,
                direction: item.field.direction,
            }
        })
        .collect();
    let skip = skip.map(|skip| ctx.param(skip));
    let limit = limit.map(|limit| ctx.param(i64::from(limit)));
    let paged = ctx.value_variable();
    let clause = Clause::call(
        &[edges],
        Clause::concat([
            Clause::unwind(Expr::variable(edges), edge),
            Clause::with(
                Projection::items(vec![ProjectionItem::bare(edge)])
                    .order_by(order_by)
                    .skip(skip)
                    .limit(limit),
                None,
            ),
            Clause::return_as(Expr::function("collect", vec![Expr::variable(edge)]), &paged),
        ]),
    );
    Some((clause, paged))
}

struct ConnectionBranch<'a, 'v> {
    source: &'v Variable,
    rel: &'a RelationshipField,
    member: &'a EntityDescriptor,
    interface: Option<&'a InterfaceDescriptor>,
    edge_type: Option<&'a RelationshipDescriptor>,
    directed: Option<bool>,
    resolve_type: bool,
}

impl<'a, 'v> ConnectionBranch<'a, 'v> {
    /// Clauses matching one member's edges, and the edge map they produce
    fn compile(
        &self,
        ctx: &mut CompileContext<'a>,
        filter: Option<&Map<String, Value>>,
        shape: &EdgeShape<'_, 'a>,
        sort: &[ConnectionSort],
    ) -> Result<(Vec<Clause>, Expr), TranslateError> {
        let member = self.member;
        let relationship = ctx.graph_variable();
        let node = ctx.graph_variable();
        let pattern = relationship_pattern(
            self.source,
            Some(&relationship),
            self.rel,
            self.directed,
            NodePattern::new(&node).labels(member.labels.iter().cloned()),
        );

        let node_target = match self.interface {
            Some(interface) => FilterTarget::Interface(interface),
            None => FilterTarget::Entity(member),
        };
        let predicate = match filter {
            Some(filter) => connection_where(ctx, node_target, &node, self.edge_type, &relationship, filter)?,
            None => WherePredicate::default(),
        };
        let rules = member.rules_for(Operation::Read);
        let predicate = predicate.with_predicate(create_auth_predicate(ctx, &rules, member, &node, AuthKind::Where)?);

        let node_sort: Vec<&SortField> = sort
            .iter()
            .filter(|s| s.side == SortSide::Node)
            .map(|s| &s.field)
            .collect();
        let projection = if shape.node.is_some() || !node_sort.is_empty() {
            let mut type_names = vec![member.name.as_str()];
            type_names.extend(self.interface.map(|i| i.name.as_str()));
            let selected = shape.node.map(|n| n.merged_fields(&type_names)).unwrap_or_default();
            // Rows are sorted after collection, so node sort keys must be in the map
            let sort_only: Vec<SelectionNode> = node_sort
                .iter()
                .filter(|s| !selected.iter().any(|f| f.response_key() == s.field))
                .map(|s| SelectionNode::new(s.field.clone()))
                .collect();
            let fields: Vec<&SelectionNode> = selected.into_iter().chain(sort_only.iter()).collect();
            Some(create_projection(ctx, member, &node, &fields, &[], self.resolve_type)?)
        } else {
            None
        };

        let allow = create_auth_predicate(ctx, &rules, member, &node, AuthKind::Allow)?;
        let field_checks = projection
            .as_ref()
            .map(|p| p.meta.auth_validate_predicates.clone())
            .unwrap_or_default();
        let guard = create_auth_guard(allow.into_iter().chain(field_checks).collect());

        let mut body = vec![filtered_match(pattern, predicate.predicate, predicate.subqueries)];
        body.extend(guard);

        let mut entries = Vec::with_capacity(shape.properties.len() + 1);
        for (key, field) in &shape.properties {
            entries.push((key.clone(), scalar_value(ctx, field, &relationship)));
        }
        for item in sort.iter().filter(|s| s.side == SortSide::Edge) {
            if entries.iter().any(|(key, _)| key == &item.field.field) {
                continue;
            }
            if let Some(field) = self.edge_type.and_then(|t| t.field(&item.field.field)) {
                entries.push((item.field.field.clone(), scalar_value(ctx, field, &relationship)));
            }
        }
        if let Some(projection) = projection {
            body.extend(projection.subqueries_before_sort);
            body.extend(projection.subqueries);
            body.extend(splice_pending_fields(ctx, &node, &projection.meta)?);
            entries.push(("node".to_string(), projection.projection));
        }
        Ok((body, Expr::Map(entries)))
    }
}
