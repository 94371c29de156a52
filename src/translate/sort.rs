//! `options` arguments: sort, limit and offset.

use std::collections::HashMap;

use serde_json::Value;

use super::context::CompileContext;
use super::errors::TranslateError;
use super::{expect_array, expect_object};
use crate::config::CompilerConfig;
use crate::cypher::{Clause, Expr, OrderItem, Projection, SortDirection, Variable};
use crate::schema::{EntityDescriptor, QueryOptions};
use crate::selection::SelectionNode;

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

/// Parse `[{ title: ASC }, { released: DESC }]`. Keys inside one map keep their
/// declared order.
pub fn parse_sort(argument: &str, value: &Value) -> Result<Vec<SortField>, TranslateError> {
    let mut fields = Vec::new();
    for item in expect_array(argument, value)? {
        for (field, direction) in expect_object(argument, item)? {
            fields.push(SortField {
                field: field.clone(),
                direction: parse_direction(field, direction)?,
            });
        }
    }
    Ok(fields)
}

pub(crate) fn parse_direction(field: &str, value: &Value) -> Result<SortDirection, TranslateError> {
    match value.as_str() {
        Some("ASC") => Ok(SortDirection::Asc),
        Some("DESC") => Ok(SortDirection::Desc),
        _ => Err(TranslateError::invalid_argument(
            field,
            format!("sort direction must be ASC or DESC, got {}", value),
        )),
    }
}

pub(crate) fn parse_count(argument: &str, value: &Value) -> Result<u32, TranslateError> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            TranslateError::invalid_argument(argument, format!("expected a non-negative integer, got {}", value))
        })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    pub sort: Vec<SortField>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ReadOptions {
    /// Options from the `options` argument of `selection`, empty when absent
    pub fn from_selection(selection: &SelectionNode) -> Result<Self, TranslateError> {
        let Some(value) = selection.get_argument("options") else {
            return Ok(ReadOptions::default());
        };
        let options = expect_object("options", value)?;
        let mut parsed = ReadOptions::default();
        for (key, value) in options {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "sort" => parsed.sort = parse_sort("options.sort", value)?,
                "limit" => parsed.limit = Some(parse_count("options.limit", value)?),
                "offset" => parsed.offset = Some(parse_count("options.offset", value)?),
                other => return Err(TranslateError::unknown_field("options", other)),
            }
        }
        Ok(parsed)
    }
}

/// Page size after applying the entity default and the entity and global caps
pub fn effective_limit(requested: Option<u32>, options: &QueryOptions, config: &CompilerConfig) -> Option<u32> {
    let limit = requested.or(options.default_limit);
    let cap = match (options.max_limit, config.default_max_limit) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    match (limit, cap) {
        (Some(limit), Some(cap)) if limit > cap => {
            log::warn!("Requested page size {} capped to {}", limit, cap);
            Some(cap)
        }
        (None, Some(cap)) => Some(cap),
        (limit, _) => limit,
    }
}

/// `ORDER BY` items for sorting entity rows bound to `variable`. Custom fields
/// sort on the value their subquery produced.
pub fn entity_order_items(
    entity: &EntityDescriptor,
    variable: &Variable,
    sort: &[SortField],
    sort_values: &HashMap<String, Variable>,
) -> Result<Vec<OrderItem>, TranslateError> {
    sort.iter()
        .map(|item| {
            let expr = if let Some(field) = entity.scalar(&item.field) {
                Expr::property(variable, field.db_name())
            } else if let Some(value) = sort_values.get(&item.field) {
                Expr::variable(value)
            } else {
                return Err(TranslateError::unknown_field(entity.name.clone(), item.field.clone()));
            };
            Ok(OrderItem {
                expr,
                direction: item.direction,
            })
        })
        .collect()
}

/// `WITH * ORDER BY .. SKIP .. LIMIT ..`, or nothing when there is no sort and no window
pub fn paging_clause(
    ctx: &mut CompileContext<'_>,
    order_by: Vec<OrderItem>,
    offset: Option<u64>,
    limit: Option<u32>,
) -> Option<Clause> {
    if order_by.is_empty() && offset.is_none() && limit.is_none() {
        return None;
    }
    let skip = offset.map(|offset| ctx.param(offset as i64));
    let limit = limit.map(|limit| ctx.param(i64::from(limit)));
    Some(Clause::with(
        Projection::star().order_by(order_by).skip(skip).limit(limit),
        None,
    ))
}
