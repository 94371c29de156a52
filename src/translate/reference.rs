//! Reference resolution: read one entity by the key fields a caller already
//! holds, e.g. `{ __typename: "Movie", id: "m1" }`.

use serde_json::{Map, Value};

use super::context::CompileContext;
use super::errors::TranslateError;
use super::read::translate_read;
use super::where_clause::to_param_value;
use crate::cypher::{and_all, Clause, Expr};
use crate::schema::EntityDescriptor;
use crate::selection::SelectionNode;

pub fn translate_reference<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    identity: &Map<String, Value>,
    selection: &SelectionNode,
) -> Result<Clause, TranslateError> {
    let this = ctx.named("this");
    let mut keys = Vec::with_capacity(identity.len());
    for (key, value) in identity {
        if key == "__typename" {
            if value.as_str() != Some(entity.name.as_str()) {
                return Err(TranslateError::invalid_argument(
                    "__typename",
                    format!("reference is for `{}`, not `{}`", value, entity.name),
                ));
            }
            continue;
        }
        let field = entity
            .scalar(key)
            .ok_or_else(|| TranslateError::unknown_field(entity.name.clone(), key.clone()))?;
        let value = ctx.param(to_param_value(field, value)?);
        keys.push(Expr::eq(Expr::property(&this, field.db_name()), value));
    }
    let Some(identity) = and_all(keys.into_iter().map(Some)) else {
        return Err(TranslateError::invalid_argument(
            "representation",
            format!("no key fields given for `{}`", entity.name),
        ));
    };
    log::debug!("Resolving reference to {}", entity.name);
    translate_read(ctx, entity, &this, selection, Some(identity))
}
