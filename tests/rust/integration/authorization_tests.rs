//! Authorization rules compiled into reads

use serde_json::json;

use cyphergate::cypher::ParamValue;
use cyphergate::selection::SelectionNode;
use cyphergate::translate::{AuthContext, AUTH_FORBIDDEN_ERROR};

use crate::common::{position, read};

fn reviews(fields: &[&str]) -> SelectionNode {
    SelectionNode::new("reviews").fields("Review", fields.iter().map(|f| SelectionNode::new(*f)).collect())
}

#[test]
fn test_anonymous_caller_is_filtered_and_guarded() {
    let query = read("Review", &reviews(&["body"]), &AuthContext::anonymous()).unwrap();
    assert_eq!(
        query.text,
        "MATCH (this:Review)\n\
         WHERE this.author IS NOT NULL AND this.author = $param0\n\
         CALL apoc.util.validate(NOT (any(var0 IN $param1 WHERE var0 IN $auth.roles) AND $auth.isAuthenticated = $param2), \"Forbidden\", [0])\n\
         RETURN this { .body } AS this"
    );
    // The missing claim is passed as null, so no row matches
    assert_eq!(query.parameters["param0"], ParamValue::Null);
    assert_eq!(
        query.parameters["param1"],
        ParamValue::List(vec![ParamValue::String("admin".to_string())])
    );
    assert_eq!(query.parameters["param2"], ParamValue::Boolean(true));
    assert_eq!(
        query.parameters["auth"],
        ParamValue::map([
            ("isAuthenticated", ParamValue::Boolean(false)),
            ("roles", ParamValue::List(vec![])),
            ("jwt", ParamValue::Map(Default::default())),
        ])
    );
}

#[test]
fn test_guard_runs_before_projection() {
    let query = read("Review", &reviews(&["body", "author"]), &AuthContext::anonymous()).unwrap();
    let matched = position(&query.text, "MATCH (this:Review)");
    let guard = position(&query.text, AUTH_FORBIDDEN_ERROR);
    let projected = position(&query.text, "RETURN this {");
    assert!(matched < guard && guard < projected);
}

#[test]
fn test_field_rule_joins_the_entity_guard() {
    let query = read("Review", &reviews(&["body", "grade"]), &AuthContext::anonymous()).unwrap();
    assert_eq!(query.text.matches("$auth.roles").count(), 2);
    assert_eq!(query.text.matches("apoc.util.validate").count(), 1);
    assert!(query.text.ends_with("RETURN this { .body, .grade } AS this"));
}

#[test]
fn test_claims_resolve_into_parameters() {
    let auth = AuthContext::authenticated(["admin"]).with_claim("sub", json!("u1"));
    let query = read("Review", &reviews(&["body"]), &auth).unwrap();
    assert_eq!(query.parameters["param0"], ParamValue::String("u1".to_string()));
    assert!(!query.text.contains("u1"));
    assert_eq!(
        query.parameters["auth"],
        ParamValue::map([
            ("isAuthenticated", ParamValue::Boolean(true)),
            ("roles", ParamValue::List(vec![ParamValue::String("admin".to_string())])),
            ("jwt", ParamValue::map([("sub", ParamValue::String("u1".to_string()))])),
        ])
    );
}

#[test]
fn test_unrestricted_entity_has_no_guard() {
    let selection = SelectionNode::new("movies").fields("Movie", vec![SelectionNode::new("title")]);
    let query = read("Movie", &selection, &AuthContext::anonymous()).unwrap();
    assert!(!query.text.contains("apoc.util.validate"));
    assert!(!query.parameters.contains_key("auth"));
}
