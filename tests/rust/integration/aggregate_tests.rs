//! Aggregate selections at the top level and across relationships

use serde_json::json;

use cyphergate::cypher::ParamValue;
use cyphergate::selection::SelectionNode;
use cyphergate::translate::{AuthContext, TranslateError};

use crate::common::{aggregate, position, read};

fn aggregation(field: &str, type_name: &str, functions: &[&str]) -> SelectionNode {
    SelectionNode::new(field).fields(type_name, functions.iter().map(|f| SelectionNode::new(*f)).collect())
}

#[test]
fn test_filtered_movie_aggregate() {
    let selection = SelectionNode::new("moviesAggregate")
        .argument("where", json!({ "title_CONTAINS": "Matrix" }))
        .fields(
            "MovieAggregateSelection",
            vec![
                SelectionNode::new("count"),
                aggregation("runtime", "IntAggregateSelection", &["max"]),
                aggregation("title", "StringAggregateSelection", &["shortest"]),
            ],
        );
    let query = aggregate("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert!(query
        .text
        .starts_with("MATCH (this:Movie)\nWHERE this.title CONTAINS $param0\nRETURN { count: count(this), "));
    assert!(query.text.contains("runtime: { max: max(this.runtime) }"));
    assert!(query.text.contains("title: { shortest: reduce(var0 = head(collect(this.title))"));
    assert!(query.text.ends_with(" } } AS this"));
    assert_eq!(query.parameters["param0"], ParamValue::String("Matrix".to_string()));
}

#[test]
fn test_guarded_review_aggregate() {
    let selection = SelectionNode::new("reviewsAggregate").fields(
        "ReviewAggregateSelection",
        vec![
            SelectionNode::new("count"),
            aggregation("grade", "IntAggregateSelection", &["average"]),
        ],
    );
    let query = aggregate("Review", &selection, &AuthContext::anonymous()).unwrap();
    assert!(query
        .text
        .contains("WHERE this.author IS NOT NULL AND this.author = $param0\n"));
    assert_eq!(query.text.matches("CALL apoc.util.validate(").count(), 2);
    let last_guard = query.text.rfind("CALL apoc.util.validate(").unwrap();
    assert!(last_guard < position(&query.text, "RETURN {"));
    assert!(query.text.contains("grade: { average: avg(this.grade) }"));
}

#[test]
fn test_numeric_function_on_string_field() {
    let selection = SelectionNode::new("moviesAggregate").fields(
        "MovieAggregateSelection",
        vec![aggregation("title", "StringAggregateSelection", &["average"])],
    );
    assert!(matches!(
        aggregate("Movie", &selection, &AuthContext::anonymous()),
        Err(TranslateError::UnsupportedOperator { .. })
    ));
}

#[test]
fn test_relationship_aggregate_in_read() {
    let selection = SelectionNode::new("movies").fields(
        "Movie",
        vec![
            SelectionNode::new("title"),
            SelectionNode::new("actorsAggregate").fields(
                "MoviePersonActorsAggregationSelection",
                vec![
                    SelectionNode::new("count"),
                    SelectionNode::new("node").fields(
                        "MoviePersonActorsNodeAggregateSelection",
                        vec![aggregation("born", "IntAggregateSelection", &["min"])],
                    ),
                ],
            ),
        ],
    );
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    let subquery = position(&query.text, "CALL {\n    WITH this\n    MATCH (this)<-[");
    assert!(subquery < position(&query.text, "RETURN this {"));
    assert!(query.text.contains(":ACTED_IN]-("));
    assert!(query.text.contains("node: { born: { min: min("));
    assert!(query.text.ends_with(" } AS this"));
    assert!(query.text.contains("RETURN this { .title, actorsAggregate: var"));
}
