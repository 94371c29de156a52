//! Sorting, paging and cursor-based connections

use serde_json::json;
use test_case::test_case;

use cyphergate::cypher::ParamValue;
use cyphergate::selection::SelectionNode;
use cyphergate::translate::{cursor_to_offset, offset_to_cursor, AuthContext};

use crate::common::{position, read};

fn actors_connection() -> SelectionNode {
    SelectionNode::new("actorsConnection").fields(
        "MovieActorsConnection",
        vec![
            SelectionNode::new("totalCount"),
            SelectionNode::new("edges").fields(
                "MovieActorsRelationship",
                vec![
                    SelectionNode::new("cursor"),
                    SelectionNode::new("roles"),
                    SelectionNode::new("node").fields("Person", vec![SelectionNode::new("name")]),
                ],
            ),
        ],
    )
}

#[test]
fn test_after_cursor_skips_past_the_cursor_row() {
    let connection = actors_connection()
        .argument("first", json!(2))
        .argument("after", json!(offset_to_cursor(3)));
    let selection = SelectionNode::new("movies").fields("Movie", vec![connection]);
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();

    assert!(query.text.contains("SKIP $param0\n"));
    assert!(query.text.contains("LIMIT $param1\n"));
    assert_eq!(query.parameters["param0"], ParamValue::Integer(4));
    assert_eq!(query.parameters["param1"], ParamValue::Integer(2));
}

#[test]
fn test_total_count_precedes_the_window() {
    let connection = actors_connection()
        .argument("first", json!(10))
        .argument("sort", json!([{ "edge": { "year": "DESC" } }, { "node": { "name": "ASC" } }]));
    let selection = SelectionNode::new("movies").fields("Movie", vec![connection]);
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();

    let count = position(&query.text, "size(");
    let window = position(&query.text, "ORDER BY");
    assert!(count < window);
    assert!(query.text.contains("roles: this0.roles, year: this0.year, node: this1 { .name }"));
    assert!(query.text.contains("DESC, var2.node.name ASC"));
    // The connection is spliced in after the node's own clauses
    assert!(query.text.ends_with("RETURN this { actorsConnection: var6 } AS this"));
}

#[test]
fn test_top_level_options() {
    let selection = SelectionNode::new("movies")
        .argument("options", json!({ "sort": [{ "title": "DESC" }], "limit": 5, "offset": 10 }))
        .fields("Movie", vec![SelectionNode::new("title")]);
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert_eq!(
        query.text,
        "MATCH (this:Movie)\n\
         WITH *\n\
         ORDER BY this.title DESC\n\
         SKIP $param0\n\
         LIMIT $param1\n\
         RETURN this { .title } AS this"
    );
    assert_eq!(query.parameters["param0"], ParamValue::Integer(10));
    assert_eq!(query.parameters["param1"], ParamValue::Integer(5));
}

#[test_case(None, 100 ; "cap applies without a request")]
#[test_case(Some(500), 100 ; "request above the cap")]
#[test_case(Some(7), 7 ; "request below the cap")]
fn test_relationship_page_size_cap(requested: Option<u32>, expected: i64) {
    let mut actors = SelectionNode::new("actors").fields("Person", vec![SelectionNode::new("name")]);
    if let Some(limit) = requested {
        actors = actors.argument("options", json!({ "limit": limit }));
    }
    let selection = SelectionNode::new("movies").fields("Movie", vec![actors]);
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert_eq!(query.parameters["param0"], ParamValue::Integer(expected));
}

#[test]
fn test_cursor_resumes_after_row() {
    for row in [0u64, 1, 41, 9_999] {
        let cursor = offset_to_cursor(row);
        assert_eq!(cursor_to_offset(&cursor).unwrap(), row);
    }
    assert!(cursor_to_offset("bm90LWEtY3Vyc29y").is_err());
}
