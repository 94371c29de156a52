//! Top-level reads: filters, projections, nested relationships and references

use serde_json::json;

use cyphergate::config::CompilerConfig;
use cyphergate::cypher::ParamValue;
use cyphergate::selection::SelectionNode;
use cyphergate::translate::{AuthContext, TranslateError, Translator};

use crate::common::{position, read, schema};

fn movies(fields: Vec<SelectionNode>) -> SelectionNode {
    SelectionNode::new("movies").fields("Movie", fields)
}

#[test]
fn test_plain_read_has_no_parameters() {
    let query = read("Movie", &movies(vec![SelectionNode::new("title")]), &AuthContext::anonymous()).unwrap();
    assert_eq!(query.text, "MATCH (this:Movie)\nRETURN this { .title } AS this");
    assert!(query.parameters.is_empty());
}

#[test]
fn test_filter_with_relationship_quantifier() {
    let selection = movies(vec![SelectionNode::new("title")])
        .argument("where", json!({ "title": "Up", "director_SOME": { "name": "X" } }));
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert_eq!(
        query.text,
        "MATCH (this:Movie)\n\
         WHERE this.title = $param0 AND EXISTS {\n    \
             MATCH (this)<-[:DIRECTED]-(this0:Person)\n    \
             WHERE this0.name = $param1\n\
         }\n\
         RETURN this { .title } AS this"
    );
    assert_eq!(query.parameters.len(), 2);
    assert_eq!(query.parameters["param0"], ParamValue::String("Up".to_string()));
    assert_eq!(query.parameters["param1"], ParamValue::String("X".to_string()));
}

#[test]
fn test_compilation_is_deterministic() {
    let selection = movies(vec![
        SelectionNode::new("title"),
        SelectionNode::new("director").fields("Person", vec![SelectionNode::new("name")]),
        SelectionNode::new("actors")
            .argument("where", json!({ "born_GT": 1960 }))
            .fields("Person", vec![SelectionNode::new("name")]),
    ])
    .argument("where", json!({ "title_CONTAINS": "Matrix" }));
    let first = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    let second = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert_eq!(first, second);
    // Every compilation numbers its names from scratch
    assert!(first.text.contains("(this0:Person)"));
}

#[test]
fn test_sibling_subqueries_do_not_share_names() {
    let selection = movies(vec![
        SelectionNode::new("director").fields("Person", vec![SelectionNode::new("name")]),
        SelectionNode::new("actors").fields("Person", vec![SelectionNode::new("name")]),
    ]);
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert!(query.text.contains("MATCH (this)<-[:DIRECTED]-(this0:Person)"));
    assert!(query.text.contains("RETURN head(collect(this0 { .name })) AS var1"));
    assert!(query.text.contains("MATCH (this)<-[:ACTED_IN]-(this2:Person)"));
    assert!(query.text.contains("RETURN collect(this2 { .name }) AS var3"));
    assert!(query.text.ends_with("RETURN this { director: var1, actors: var3 } AS this"));
}

#[test]
fn test_scalar_transforms_and_custom_fields() {
    let selection = movies(vec![SelectionNode::new("released"), SelectionNode::new("rating")]);
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert!(query.text.contains(
        "released: apoc.date.convertFormat(toString(this.released), \"iso_zoned_date_time\", \"iso_offset_date_time\")"
    ));
    assert!(query.text.contains("UNWIND apoc.cypher.runFirstColumnMany($param0, { this: this, auth: $auth })"));
    // The statement is bound, never inlined
    assert!(!query.text.contains("REVIEWED"));
}

#[test]
fn test_unknown_field_is_rejected() {
    let err = read("Movie", &movies(vec![SelectionNode::new("budget")]), &AuthContext::anonymous()).unwrap_err();
    assert_eq!(err, TranslateError::unknown_field("Movie", "budget"));
}

#[test]
fn test_unknown_entity_is_rejected() {
    let err = read("Planet", &movies(vec![]), &AuthContext::anonymous()).unwrap_err();
    assert!(matches!(err, TranslateError::Schema(_)));
}

#[test]
fn test_selection_depth_is_limited() {
    let schema = schema();
    let config = CompilerConfig {
        max_selection_depth: 2,
        ..Default::default()
    };
    let translator = Translator::new(&schema, &config);
    let shallow = SelectionNode::new("reviews").fields(
        "Review",
        vec![SelectionNode::new("movie").fields("Movie", vec![SelectionNode::new("title")])],
    );
    assert!(translator
        .compile_read("Review", &shallow, &AuthContext::anonymous())
        .is_ok());

    let deep = SelectionNode::new("reviews").fields(
        "Review",
        vec![SelectionNode::new("movie").fields(
            "Movie",
            vec![SelectionNode::new("director").fields("Person", vec![SelectionNode::new("name")])],
        )],
    );
    assert_eq!(
        translator
            .compile_read("Review", &deep, &AuthContext::anonymous())
            .unwrap_err(),
        TranslateError::DepthExceeded { max: 2 }
    );
}

#[test]
fn test_reference_resolution() {
    let schema = schema();
    let config = CompilerConfig::default();
    let identity = json!({ "__typename": "Movie", "id": "tt0133093" });
    let query = Translator::new(&schema, &config)
        .compile_reference(
            "Movie",
            identity.as_object().unwrap(),
            &movies(vec![SelectionNode::new("title")]),
            &AuthContext::anonymous(),
        )
        .unwrap();
    assert_eq!(
        query.text,
        "MATCH (this:Movie)\nWHERE this.id = $param0\nRETURN this { .title } AS this"
    );
    assert!(position(&query.text, "WHERE") < position(&query.text, "RETURN"));
}

fn credits() -> SelectionNode {
    SelectionNode::new("credits")
        .fields("Movie", vec![SelectionNode::new("title")])
        .fields("Series", vec![SelectionNode::new("title"), SelectionNode::new("seasons")])
}

fn people(fields: Vec<SelectionNode>) -> SelectionNode {
    SelectionNode::new("people").fields("Person", fields)
}

#[test]
fn test_union_field_projects_every_member() {
    let selection = people(vec![SelectionNode::new("name"), credits()]);
    let query = read("Person", &selection, &AuthContext::anonymous()).unwrap();
    assert!(query.text.starts_with("MATCH (this:Person)\n"));
    assert!(query.text.contains("MATCH (this)-[:CREDITED]->(this0:Movie)"));
    assert!(query.text.contains("RETURN this0 { __resolveType: \"Movie\", .title } AS var1"));
    assert!(query.text.contains("MATCH (this)-[:CREDITED]->(this2:Series)"));
    assert!(query.text.contains("RETURN this2 { __resolveType: \"Series\", .title, .seasons } AS var1"));
    assert!(position(&query.text, ":Movie)") < position(&query.text, "UNION"));
    assert!(position(&query.text, "UNION") < position(&query.text, ":Series)"));
    assert!(query.text.contains("RETURN collect(var1) AS var3"));
    assert!(query.text.ends_with("RETURN this { .name, credits: var3 } AS this"));
    // Only the page cap of Person is bound
    assert_eq!(query.parameters.len(), 1);
    assert_eq!(query.parameters["param0"], ParamValue::Integer(100));
}

#[test]
fn test_union_member_filters() {
    let filtered = credits().argument("where", json!({ "Series": { "seasons_GTE": 3 } }));
    let query = read("Person", &people(vec![filtered]), &AuthContext::anonymous()).unwrap();
    // Members the filter does not name are left out
    assert!(!query.text.contains(":Movie)"));
    assert!(query.text.contains("MATCH (this)-[:CREDITED]->(this0:Series)\n"));
    assert!(query.text.contains("WHERE this0.seasons >= $param1\n"));
    assert_eq!(query.parameters["param1"], ParamValue::Integer(3));

    let everything = credits().argument("where", json!({}));
    let query = read("Person", &people(vec![everything]), &AuthContext::anonymous()).unwrap();
    assert!(query.text.contains(":Movie)"));
    assert!(query.text.contains(":Series)"));
    assert_eq!(
        query,
        read("Person", &people(vec![credits()]), &AuthContext::anonymous()).unwrap()
    );
}

#[test]
fn test_union_connection() {
    let connection = SelectionNode::new("creditsConnection").fields(
        "PersonCreditsConnection",
        vec![
            SelectionNode::new("totalCount"),
            SelectionNode::new("edges").fields(
                "PersonCreditsRelationship",
                vec![SelectionNode::new("node")
                    .fields("Movie", vec![SelectionNode::new("title")])
                    .fields("Series", vec![SelectionNode::new("seasons")])],
            ),
        ],
    );
    let query = read("Person", &people(vec![connection.clone()]), &AuthContext::anonymous()).unwrap();
    assert!(query.text.contains("MATCH (this)-[this0:CREDITED]->(this1:Movie)"));
    assert!(query.text.contains("node: this1 { __resolveType: \"Movie\", .title }"));
    assert!(query.text.contains(":Series)"));
    assert!(query.text.contains("__resolveType: \"Series\", .seasons"));
    assert!(position(&query.text, "size(") < position(&query.text, "RETURN this {"));
    assert!(query.text.contains("creditsConnection: var"));

    let filtered = connection.argument("where", json!({ "Movie": { "node": { "title": "Heat" } } }));
    let query = read("Person", &people(vec![filtered]), &AuthContext::anonymous()).unwrap();
    assert!(!query.text.contains(":Series)"));
    assert!(query.text.contains("WHERE this1.title = $param1\n"));
    assert_eq!(query.parameters["param1"], ParamValue::String("Heat".to_string()));
}
