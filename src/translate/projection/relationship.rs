//! Relationship fields.
//!
//! ```text
//! CALL {
//!     WITH this
//!     MATCH (this)<-[:ACTED_IN]-(this0:Person)
//!     WHERE <filter> AND <where rules>
//!     CALL apoc.util.validate(NOT (<allow rules>), "Forbidden", [0])
//!     WITH *
//!     ORDER BY this0.name ASC
//!     LIMIT $param0
//!     RETURN collect(this0 { .name }) AS var1
//! }
//! ```

use super::{create_projection, splice_pending_fields, union};
use crate::cypher::{Clause, Expr, NodePattern, Variable};
use crate::schema::{Operation, RelationshipField, Target};
use crate::selection::SelectionNode;
use crate::translate::auth::{create_auth_guard, create_auth_predicate, AuthKind};
use crate::translate::context::CompileContext;
use crate::translate::errors::TranslateError;
use crate::translate::sort::{effective_limit, entity_order_items, paging_clause, ReadOptions};
use crate::translate::where_clause::{create_where_predicate, filtered_match, FilterTarget, WherePredicate};
use crate::translate::{directed_argument, expect_object, relationship_pattern};

/// `CALL` subquery over the neighbors of `source` through `rel`, returning
/// the projected neighbors (or the single neighbor) as `result`
pub fn create_relationship_subquery<'a>(
    ctx: &mut CompileContext<'a>,
    source: &Variable,
    rel: &'a RelationshipField,
    selection: &SelectionNode,
    result: &Variable,
) -> Result<Clause, TranslateError> {
    let target = ctx.schema().target(&rel.target)?;
    let entity = match target {
        Target::Entity(entity) => entity,
        Target::Union(_) | Target::Interface(_) => {
            return union::create_abstract_subquery(ctx, source, rel, target, selection, result)
        }
    };

    let directed = directed_argument(selection)?;
    let node = ctx.graph_variable();
    let pattern = relationship_pattern(
        source,
        None,
        rel,
        directed,
        NodePattern::new(&node).labels(entity.labels.iter().cloned()),
    );

    let filter = match selection.get_argument("where") {
        Some(value) => {
            create_where_predicate(ctx, FilterTarget::Entity(entity), &node, expect_object("where", value)?)?
        }
        None => WherePredicate::default(),
    };
    let rules = entity.rules_for(Operation::Read);
    let auth_where = create_auth_predicate(ctx, &rules, entity, &node, AuthKind::Where)?;
    let filter = filter.with_predicate(auth_where);

    let options = if rel.list {
        ReadOptions::from_selection(selection)?
    } else {
        ReadOptions::default()
    };
    let fields = selection.merged_fields(&[entity.name.as_str()]);
    let projection = create_projection(ctx, entity, &node, &fields, &options.sort, false)?;

    let allow = create_auth_predicate(ctx, &rules, entity, &node, AuthKind::Allow)?;
    let guard = create_auth_guard(
        allow
            .into_iter()
            .chain(projection.meta.auth_validate_predicates.iter().cloned())
            .collect(),
    );

    let mut body = vec![filtered_match(pattern, filter.predicate, filter.subqueries)];
    body.extend(guard);
    body.extend(projection.subqueries_before_sort);
    if rel.list {
        let order_by = entity_order_items(entity, &node, &options.sort, &projection.meta.sort_values)?;
        let limit = effective_limit(options.limit, &entity.query_options, ctx.config());
        body.extend(paging_clause(ctx, order_by, options.offset.map(u64::from), limit));
    }
    body.extend(projection.subqueries);
    body.extend(splice_pending_fields(ctx, &node, &projection.meta)?);
    body.push(Clause::return_as(collect_result(projection.projection, rel.list), result));

    log::debug!("Compiled relationship field {} to {}", rel.name, entity.name);
    Ok(Clause::call(&[source], Clause::concat(body)))
}

/// `collect(value)` for list fields, `head(collect(value))` otherwise
pub fn collect_result(value: Expr, list: bool) -> Expr {
    let collected = Expr::function("collect", vec![value]);
    if list {
        collected
    } else {
        Expr::function("head", vec![collected])
    }
}
