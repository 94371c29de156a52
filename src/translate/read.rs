//! Top-level reads.
//!
//! ```text
//! MATCH (this:Movie)
//! WHERE <filter> AND <identity> AND <where rules>
//! CALL apoc.util.validate(NOT (<allow rules> AND <field rules>), "Forbidden", [0])
//! <subqueries the sort depends on>
//! WITH *
//! ORDER BY this.title ASC
//! SKIP $param0
//! LIMIT $param1
//! <field subqueries>
//! <connection and interface subqueries>
//! RETURN this { .title } AS this
//! ```

use super::auth::{create_auth_guard, create_auth_predicate, AuthKind};
use super::context::CompileContext;
use super::errors::TranslateError;
use super::expect_object;
use super::projection::{create_projection, splice_pending_fields};
use super::sort::{effective_limit, entity_order_items, paging_clause, ReadOptions};
use super::where_clause::{create_where_predicate, filtered_match, FilterTarget, WherePredicate};
use crate::cypher::{Clause, Expr, NodePattern, Pattern, Variable};
use crate::schema::{EntityDescriptor, Operation};
use crate::selection::SelectionNode;

/// Read `entity` nodes bound to `this`. `identity` is an extra predicate on
/// the matched node, used when resolving a reference.
pub fn translate_read<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    this: &Variable,
    selection: &SelectionNode,
    identity: Option<Expr>,
) -> Result<Clause, TranslateError> {
    let filter = match selection.get_argument("where") {
        Some(value) => create_where_predicate(ctx, FilterTarget::Entity(entity), this, expect_object("where", value)?)?,
        None => WherePredicate::default(),
    };
    let rules = entity.rules_for(Operation::Read);
    let auth_where = create_auth_predicate(ctx, &rules, entity, this, AuthKind::Where)?;
    let filter = filter.with_predicate(identity).with_predicate(auth_where);
    let pattern = Pattern::node(NodePattern::new(this).labels(entity.labels.iter().cloned()));

    let options = ReadOptions::from_selection(selection)?;
    let fields = selection.merged_fields(&[entity.name.as_str()]);
    let projection = ctx.nested(|ctx| create_projection(ctx, entity, this, &fields, &options.sort, false))?;

    let allow = create_auth_predicate(ctx, &rules, entity, this, AuthKind::Allow)?;
    let guard = create_auth_guard(
        allow
            .into_iter()
            .chain(projection.meta.auth_validate_predicates.iter().cloned())
            .collect(),
    );

    let mut clauses = vec![filtered_match(pattern, filter.predicate, filter.subqueries)];
    clauses.extend(guard);
    clauses.extend(projection.subqueries_before_sort);
    let order_by = entity_order_items(entity, this, &options.sort, &projection.meta.sort_values)?;
    let limit = effective_limit(options.limit, &entity.query_options, ctx.config());
    clauses.extend(paging_clause(ctx, order_by, options.offset.map(u64::from), limit));
    clauses.extend(projection.subqueries);
    clauses.extend(ctx.nested(|ctx| splice_pending_fields(ctx, this, &projection.meta))?);
    clauses.push(Clause::return_as(projection.projection, this));

    log::debug!("Compiled read of {} with {} clauses", entity.name, clauses.len());
    Ok(Clause::concat(clauses))
}
