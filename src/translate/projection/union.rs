//! Union and interface relationship fields.
//!
//! Every concrete member gets its own `UNION` branch with its own filter,
//! authorization and projection, tagged with `__resolveType`. Sorting and
//! paging run on the combined rows, never per branch.
//!
//! ```text
//! CALL {
//!     WITH this
//!     CALL {
//!         WITH this
//!         MATCH (this)-[:WROTE]->(this0:Book)
//!         RETURN this0 { __resolveType: "Book", .title } AS var1
//!         UNION
//!         WITH this
//!         MATCH (this)-[:WROTE]->(this2:Article)
//!         RETURN this2 { __resolveType: "Article", .title } AS var1
//!     }
//!     WITH *
//!     LIMIT $param0
//!     RETURN collect(var1) AS var3
//! }
//! ```

use serde_json::{Map, Value};

use super::relationship::collect_result;
use super::{create_projection, splice_pending_fields};
use crate::cypher::{Clause, Expr, NodePattern, OrderItem, Projection, ProjectionItem, Variable};
use crate::schema::{EntityDescriptor, InterfaceDescriptor, Operation, QueryOptions, RelationshipField, Target};
use crate::selection::SelectionNode;
use crate::translate::auth::{create_auth_guard, create_auth_predicate, AuthKind};
use crate::translate::context::CompileContext;
use crate::translate::errors::TranslateError;
use crate::translate::sort::{effective_limit, paging_clause, ReadOptions, SortField};
use crate::translate::where_clause::{create_where_predicate, filtered_match, FilterTarget, WherePredicate};
use crate::translate::{directed_argument, expect_object, relationship_pattern};

pub fn create_abstract_subquery<'a>(
    ctx: &mut CompileContext<'a>,
    source: &Variable,
    rel: &'a RelationshipField,
    target: Target<'a>,
    selection: &SelectionNode,
    result: &Variable,
) -> Result<Clause, TranslateError> {
    let interface = match target {
        Target::Interface(interface) => Some(interface),
        _ => None,
    };
    let directed = directed_argument(selection)?;
    let options = if rel.list {
        ReadOptions::from_selection(selection)?
    } else {
        ReadOptions::default()
    };
    if interface.is_none() && !options.sort.is_empty() {
        return Err(TranslateError::invalid_argument(
            "options.sort",
            format!("`{}` is a union; its members share no fields to sort on", target.name()),
        ));
    }
    let filter = selection
        .get_argument("where")
        .map(|value| expect_object("where", value))
        .transpose()?;

    let members = ctx.schema().concrete_entities(&target)?;
    if let (Some(filter), None) = (filter, interface) {
        for key in filter.keys() {
            if !members.iter().any(|m| &m.name == key) {
                return Err(TranslateError::unknown_field(target.name(), key.clone()));
            }
        }
    }

    let item = ctx.value_variable();
    let sort_keys = match interface {
        Some(interface) => interface_sort_keys(ctx, interface, &options.sort)?,
        None => Vec::new(),
    };
    let mut branches = Vec::with_capacity(members.len());
    for member in members {
        let member_filter = match (filter, interface) {
            (None, _) => None,
            (Some(filter), Some(_)) => Some(filter),
            (Some(filter), None) if filter.is_empty() => None,
            // A union filter only selects the members it names
            (Some(filter), None) => match filter.get(&member.name) {
                Some(value) => Some(expect_object(&member.name, value)?),
                None => continue,
            },
        };
        let branch = MemberBranch {
            source,
            rel,
            member,
            interface,
            directed,
        };
        branches.push(branch.compile(ctx, member_filter, selection, &sort_keys, &item)?);
    }

    if branches.is_empty() {
        let empty = if rel.list { Expr::List(Vec::new()) } else { Expr::null() };
        return Ok(Clause::call(&[source], Clause::return_as(empty, result)));
    }

    let mut body = vec![Clause::call(&[source], Clause::Union(branches))];
    if rel.list {
        let order_by = sort_keys
            .iter()
            .map(|(sort, key)| OrderItem {
                expr: Expr::variable(key),
                direction: sort.direction,
            })
            .collect();
        let limit = effective_limit(options.limit, &QueryOptions::default(), ctx.config());
        body.extend(paging_clause(ctx, order_by, options.offset.map(u64::from), limit));
    }
    body.push(Clause::return_as(collect_result(Expr::variable(&item), rel.list), result));

    log::debug!("Compiled {} branches for abstract field {}", target.name(), rel.name);
    Ok(Clause::call(&[source], Clause::concat(body)))
}

struct MemberBranch<'a, 'v> {
    source: &'v Variable,
    rel: &'a RelationshipField,
    member: &'a EntityDescriptor,
    interface: Option<&'a InterfaceDescriptor>,
    directed: Option<bool>,
}

impl<'a, 'v> MemberBranch<'a, 'v> {
    fn compile(
        &self,
        ctx: &mut CompileContext<'a>,
        filter: Option<&Map<String, Value>>,
        selection: &SelectionNode,
        sort_keys: &[(&SortField, Variable)],
        item: &Variable,
    ) -> Result<Clause, TranslateError> {
        let member = self.member;
        let node = ctx.graph_variable();
        let pattern = relationship_pattern(
            self.source,
            None,
            self.rel,
            self.directed,
            NodePattern::new(&node).labels(member.labels.iter().cloned()),
        );

        let filter_target = match self.interface {
            Some(interface) => FilterTarget::Interface(interface),
            None => FilterTarget::Entity(member),
        };
        let predicate = match filter {
            Some(filter) => create_where_predicate(ctx, filter_target, &node, filter)?,
            None => WherePredicate::default(),
        };
        let rules = member.rules_for(Operation::Read);
        let predicate = predicate.with_predicate(create_auth_predicate(ctx, &rules, member, &node, AuthKind::Where)?);

        let mut type_names = vec![member.name.as_str()];
        if let Some(interface) = self.interface {
            type_names.push(interface.name.as_str());
        }
        let fields = selection.merged_fields(&type_names);
        let projection = create_projection(ctx, member, &node, &fields, &[], true)?;

        let allow = create_auth_predicate(ctx, &rules, member, &node, AuthKind::Allow)?;
        let guard = create_auth_guard(
            allow
                .into_iter()
                .chain(projection.meta.auth_validate_predicates.iter().cloned())
                .collect(),
        );

        let mut body = vec![filtered_match(pattern, predicate.predicate, predicate.subqueries)];
        body.extend(guard);
        body.extend(projection.subqueries_before_sort);
        body.extend(projection.subqueries);
        body.extend(splice_pending_fields(ctx, &node, &projection.meta)?);

        // Rows are sorted after the union, on the stored property rather than its projection
        let mut returned = vec![ProjectionItem::aliased(projection.projection, item)];
        for (sort, key) in sort_keys {
            let field = member
                .scalar(&sort.field)
                .ok_or_else(|| TranslateError::unknown_field(member.name.clone(), sort.field.clone()))?;
            returned.push(ProjectionItem::aliased(Expr::property(&node, field.db_name()), key));
        }
        body.push(Clause::returning(Projection::items(returned)));
        Ok(Clause::concat(body))
    }
}

/// One returned column per sort field, shared by every branch
fn interface_sort_keys<'s>(
    ctx: &mut CompileContext<'_>,
    interface: &InterfaceDescriptor,
    sort: &'s [SortField],
) -> Result<Vec<(&'s SortField, Variable)>, TranslateError> {
    sort.iter()
        .map(|s| {
            if interface.scalar(&s.field).is_none() {
                return Err(TranslateError::unknown_field(interface.name.clone(), s.field.clone()));
            }
            Ok((s, ctx.value_variable()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::cypher::build;
    use crate::schema::Schema;
    use crate::translate::context::AuthContext;
    use serde_json::json;

    const SCHEMA: &str = r#"
entities:
  - name: Author
    relationships:
      - { name: works, type: WROTE, target: Publication, direction: OUT, list: true }
      - { name: productions, type: MADE, target: Production, direction: OUT, list: true }
  - name: Book
    fields:
      - { name: title, type: String }
  - name: Article
    fields:
      - { name: title, type: String }
      - { name: url, type: String }
  - name: Film
    implements: [Production]
    fields:
      - { name: title, type: String }
      - { name: runtime, type: Int }
      - { name: released, type: DateTime }
  - name: Show
    implements: [Production]
    fields:
      - { name: title, type: String }
      - { name: released, type: DateTime, alias: firstAired }
unions:
  - { name: Publication, members: [Book, Article] }
interfaces:
  - name: Production
    fields:
      - { name: title, type: String }
      - { name: released, type: DateTime }
"#;

    fn compile(selection: SelectionNode) -> Result<crate::cypher::CompiledQuery, TranslateError> {
        let schema = Schema::from_yaml_str(SCHEMA).unwrap();
        let config = CompilerConfig::default();
        let auth = AuthContext::anonymous();
        let mut ctx = CompileContext::new(&schema, &config, &auth);
        let this = ctx.named("this");
        let result = ctx.value_variable();
        let author = schema.entity("Author").unwrap();
        let rel = author.relationship(&selection.name).unwrap();
        let target = schema.target(&rel.target).unwrap();
        let subquery = create_abstract_subquery(&mut ctx, &this, rel, target, &selection, &result)?;
        Ok(build(&Clause::concat([
            subquery,
            Clause::return_as(Expr::variable(&result), &result),
        ]))?)
    }

    #[test]
    fn test_union_branches_tag_members_without_selection() {
        let selection = SelectionNode::new("works").fields("Book", vec![SelectionNode::new("title")]);
        let query = compile(selection).unwrap();
        assert_eq!(
            query.text,
            "CALL {\n    \
                 WITH this\n    \
                 CALL {\n        \
                     WITH this\n        \
                     MATCH (this)-[:WROTE]->(this0:Book)\n        \
                     RETURN this0 { __resolveType: \"Book\", .title } AS var1\n        \
                     UNION\n        \
                     WITH this\n        \
                     MATCH (this)-[:WROTE]->(this2:Article)\n        \
                     RETURN this2 { __resolveType: \"Article\" } AS var1\n    \
                 }\n    \
                 RETURN collect(var1) AS var3\n\
             }\n\
             RETURN var3"
        );
    }

    #[test]
    fn test_union_filter_selects_members() {
        let selection = SelectionNode::new("works")
            .argument("where", json!({ "Article": { "url_CONTAINS": "news" } }))
            .fields("Article", vec![SelectionNode::new("url")]);
        let query = compile(selection).unwrap();
        assert!(!query.text.contains(":Book"));
        assert!(query.text.contains("WHERE this0.url CONTAINS $param0"));
    }

    #[test]
    fn test_empty_union_filter_keeps_every_member() {
        let unfiltered = SelectionNode::new("works").fields("Book", vec![SelectionNode::new("title")]);
        let filtered = unfiltered.clone().argument("where", json!({}));
        let query = compile(filtered).unwrap();
        assert!(query.text.contains("(this0:Book)"));
        assert!(query.text.contains("(this2:Article)"));
        assert_eq!(query, compile(unfiltered).unwrap());
    }

    #[test]
    fn test_union_sort_rejected() {
        let selection = SelectionNode::new("works").argument("options", json!({ "sort": [{ "title": "ASC" }] }));
        assert!(matches!(
            compile(selection),
            Err(TranslateError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_interface_sort_after_union() {
        let selection = SelectionNode::new("productions")
            .argument("options", json!({ "sort": [{ "title": "DESC" }], "limit": 3 }))
            .fields("Production", vec![SelectionNode::new("__typename")])
            .fields("Film", vec![SelectionNode::new("runtime")]);
        let query = compile(selection).unwrap();
        // Implementations are ordered by name
        let film = query.text.find(":Film").unwrap();
        let show = query.text.find(":Show").unwrap();
        assert!(film < show);
        assert!(query.text.contains(
            "RETURN this0 { __resolveType: \"Film\", .runtime, __typename: \"Film\" } AS var1, this0.title AS var2\n"
        ));
        assert!(query.text.contains("RETURN this3 { __resolveType: \"Show\", __typename: \"Show\" } AS var1, this3.title AS var2\n"));
        assert!(query.text.contains("    WITH *\n    ORDER BY var2 DESC\n    LIMIT $param0\n"));
    }

    #[test]
    fn test_interface_sort_uses_stored_property() {
        let selection = SelectionNode::new("productions")
            .argument("options", json!({ "sort": [{ "released": "ASC" }] }))
            .fields("Production", vec![SelectionNode::new("title").alias("released")]);
        let query = compile(selection).unwrap();
        // An alias named like the sort field does not become the sort key
        assert!(query.text.contains("{ __resolveType: \"Film\", released: this0.title } AS var1, this0.released AS var2\n"));
        assert!(query.text.contains(" AS var1, this3.firstAired AS var2\n"));
        assert!(query.text.contains("ORDER BY var2 ASC\n"));
    }
}
