//! Fields computed by a schema-supplied Cypher statement.
//!
//! The statement runs through `apoc.cypher.runFirstColumnMany` with `this`,
//! `$auth` and the field arguments bound. Statement text and argument values
//! are parameters, so nothing from the request or schema is spliced into the
//! query text.

use super::relationship::collect_result;
use super::{create_projection, splice_pending_fields};
use crate::cypher::{and_all, or_all, Clause, Expr, Variable};
use crate::schema::{CustomField, CustomReturn, EntityDescriptor, Operation, Target};
use crate::selection::SelectionNode;
use crate::translate::auth::{create_auth_guard, create_auth_predicate, AuthKind};
use crate::translate::context::CompileContext;
use crate::translate::errors::TranslateError;

pub fn create_custom_subquery<'a>(
    ctx: &mut CompileContext<'a>,
    source: &Variable,
    custom: &'a CustomField,
    selection: &SelectionNode,
    result: &Variable,
) -> Result<Clause, TranslateError> {
    let bindings = statement_bindings(ctx, source, custom, selection)?;
    let statement = ctx.param(custom.statement.as_str());

    let target = match &custom.returns {
        CustomReturn::Scalar(_) => None,
        CustomReturn::Target(name) => Some(ctx.schema().target(name)?),
    };
    let value = match target {
        Some(_) => ctx.graph_variable(),
        None => ctx.value_variable(),
    };

    let mut body = vec![Clause::unwind(
        Expr::function("apoc.cypher.runFirstColumnMany", vec![statement, bindings]),
        &value,
    )];
    let returned = match target {
        None => Expr::variable(&value),
        Some(Target::Entity(entity)) => {
            let (clauses, projection) = entity_result(ctx, entity, &value, selection, &[entity.name.as_str()], false)?;
            body.extend(clauses);
            projection
        }
        Some(target) => {
            let interface = match target {
                Target::Interface(interface) => Some(interface.name.as_str()),
                _ => None,
            };
            let mut branches = Vec::new();
            for member in ctx.schema().concrete_entities(&target)? {
                let mut type_names = vec![member.name.as_str()];
                type_names.extend(interface);
                let (clauses, projection) = entity_result(ctx, member, &value, selection, &type_names, true)?;
                body.extend(clauses);
                branches.push((Expr::has_label(&value, member.main_label()), projection));
            }
            Expr::Case {
                branches,
                otherwise: None,
            }
        }
    };
    body.push(Clause::return_as(collect_result(returned, custom.list), result));

    log::debug!("Compiled custom field {}", custom.name);
    Ok(Clause::call(&[source], Clause::concat(body)))
}

/// `{ this: this, auth: $auth, <arguments> }`. Arguments the caller leaves out
/// take their schema default, or null.
fn statement_bindings(
    ctx: &mut CompileContext<'_>,
    source: &Variable,
    custom: &CustomField,
    selection: &SelectionNode,
) -> Result<Expr, TranslateError> {
    for name in selection.arguments.keys() {
        if !custom.arguments.iter().any(|a| &a.name == name) {
            return Err(TranslateError::invalid_argument(
                name.clone(),
                format!("`{}` takes no such argument", custom.name),
            ));
        }
    }
    let mut entries = vec![
        ("this".to_string(), Expr::variable(source)),
        ("auth".to_string(), ctx.auth_param()),
    ];
    for argument in &custom.arguments {
        let value = selection
            .get_argument(&argument.name)
            .or(argument.default.as_ref())
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        entries.push((argument.name.clone(), ctx.param(&value)));
    }
    Ok(Expr::Map(entries))
}

/// Clauses and projection for statement results of one entity type. With
/// `discriminate`, every clause only applies to rows carrying the entity label.
fn entity_result<'a>(
    ctx: &mut CompileContext<'a>,
    entity: &'a EntityDescriptor,
    value: &Variable,
    selection: &SelectionNode,
    type_names: &[&str],
    discriminate: bool,
) -> Result<(Vec<Clause>, Expr), TranslateError> {
    let rules = entity.rules_for(Operation::Read);
    let label = discriminate.then(|| Expr::has_label(value, entity.main_label()));
    let mut clauses = Vec::new();

    // Rows hidden by `where` rules are dropped before anything is projected
    if let Some(auth_where) = create_auth_predicate(ctx, &rules, entity, value, AuthKind::Where)? {
        let visible = match &label {
            Some(label) => or_all([Some(Expr::not(label.clone())), Some(auth_where)]),
            None => Some(auth_where),
        };
        clauses.extend(visible.map(Clause::with_star_where));
    }

    let fields = selection.merged_fields(type_names);
    let projection = create_projection(ctx, entity, value, &fields, &[], discriminate)?;

    let allow = create_auth_predicate(ctx, &rules, entity, value, AuthKind::Allow)?;
    let checks = and_all(
        allow
            .into_iter()
            .chain(projection.meta.auth_validate_predicates.iter().cloned())
            .map(Some),
    );
    let checks = match (&label, checks) {
        (Some(label), Some(checks)) => or_all([Some(Expr::not(label.clone())), Some(checks)]),
        (_, checks) => checks,
    };
    clauses.extend(create_auth_guard(checks.into_iter().collect()));

    clauses.extend(projection.subqueries_before_sort);
    clauses.extend(projection.subqueries);
    clauses.extend(splice_pending_fields(ctx, value, &projection.meta)?);
    Ok((clauses, projection.projection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::cypher::{build, ParamValue};
    use crate::schema::Schema;
    use crate::translate::context::AuthContext;
    use serde_json::json;

    const SCHEMA: &str = r#"
entities:
  - name: Movie
    fields:
      - { name: title, type: String }
    custom_fields:
      - name: similar
        statement: "MATCH (this)-[:SIMILAR]->(m:Movie) RETURN m LIMIT $first"
        returns: Movie
        list: true
        arguments:
          - { name: first, default: 3 }
      - name: rating
        statement: "RETURN 4.5"
        returns: Float
      - name: related
        statement: "MATCH (this)--(n) RETURN n"
        returns: Related
        list: true
  - name: Person
    fields:
      - { name: name, type: String }
unions:
  - { name: Related, members: [Movie, Person] }
"#;

    fn compile(selection: SelectionNode) -> Result<crate::cypher::CompiledQuery, TranslateError> {
        let schema = Schema::from_yaml_str(SCHEMA).unwrap();
        let config = CompilerConfig::default();
        let auth = AuthContext::anonymous();
        let mut ctx = CompileContext::new(&schema, &config, &auth);
        let this = ctx.named("this");
        let result = ctx.value_variable();
        let custom = schema.entity("Movie").unwrap().custom(&selection.name).unwrap();
        let subquery = create_custom_subquery(&mut ctx, &this, custom, &selection, &result)?;
        Ok(build(&Clause::concat([
            subquery,
            Clause::return_as(Expr::variable(&result), &result),
        ]))?)
    }

    #[test]
    fn test_scalar_statement() {
        let query = compile(SelectionNode::new("rating")).unwrap();
        assert_eq!(
            query.text,
            "CALL {\n    \
                 WITH this\n    \
                 UNWIND apoc.cypher.runFirstColumnMany($param0, { this: this, auth: $auth }) AS var0\n    \
                 RETURN head(collect(var0)) AS var1\n\
             }\n\
             RETURN var1"
        );
        assert_eq!(query.parameters["param0"], ParamValue::String("RETURN 4.5".to_string()));
    }

    #[test]
    fn test_entity_statement_uses_argument_defaults() {
        let query = compile(
            SelectionNode::new("similar").fields("Movie", vec![SelectionNode::new("title")]),
        )
        .unwrap();
        assert!(query.text.contains(
            "UNWIND apoc.cypher.runFirstColumnMany($param0, { this: this, auth: $auth, first: $param1 }) AS this0"
        ));
        assert!(query.text.contains("RETURN collect(this0 { .title }) AS var1"));
        assert_eq!(query.parameters["param1"], ParamValue::Integer(3));

        let overridden = compile(SelectionNode::new("similar").argument("first", json!(10))).unwrap();
        assert_eq!(overridden.parameters["param1"], ParamValue::Integer(10));
    }

    #[test]
    fn test_union_statement_discriminates_by_label() {
        let query = compile(
            SelectionNode::new("related")
                .fields("Person", vec![SelectionNode::new("name")]),
        )
        .unwrap();
        assert!(query.text.contains(
            "RETURN collect(CASE WHEN this0:Movie THEN this0 { __resolveType: \"Movie\" } \
             WHEN this0:Person THEN this0 { __resolveType: \"Person\", .name } END) AS var1"
        ));
    }

    #[test]
    fn test_undeclared_argument_rejected() {
        assert!(matches!(
            compile(SelectionNode::new("rating").argument("scale", json!(10))),
            Err(TranslateError::InvalidArgument { .. })
        ));
    }
}
