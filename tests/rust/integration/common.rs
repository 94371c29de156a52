use cyphergate::config::CompilerConfig;
use cyphergate::cypher::CompiledQuery;
use cyphergate::schema::Schema;
use cyphergate::selection::SelectionNode;
use cyphergate::translate::{AuthContext, TranslateError, Translator};

pub const MOVIES_SCHEMA: &str = r#"
entities:
  - name: Movie
    fields:
      - { name: id, type: ID }
      - { name: title, type: String }
      - { name: runtime, type: Int }
      - { name: released, type: DateTime }
    relationships:
      - { name: director, type: DIRECTED, target: Person, direction: IN }
      - { name: actors, type: ACTED_IN, target: Person, direction: IN, list: true, properties: ActedIn }
    custom_fields:
      - name: rating
        statement: "MATCH (this)<-[r:REVIEWED]-() RETURN avg(r.score)"
        returns: Float
  - name: Person
    fields:
      - { name: name, type: String }
      - { name: born, type: Int }
    relationships:
      - { name: credits, type: CREDITED, target: Production, direction: OUT, list: true }
    query_options: { max_limit: 100 }
  - name: Series
    fields:
      - { name: title, type: String }
      - { name: seasons, type: Int }
  - name: Review
    fields:
      - { name: body, type: String }
      - { name: author, type: String }
      - { name: grade, type: Int, auth: [ { roles: [editor] } ] }
    auth:
      - operations: [READ]
        roles: [admin]
        isAuthenticated: true
      - where: { author: "$jwt.sub" }
        operations: [READ]
    relationships:
      - { name: movie, type: REVIEWS, target: Movie, direction: OUT }
unions:
  - { name: Production, members: [Movie, Series] }
relationship_properties:
  - name: ActedIn
    fields:
      - { name: roles, type: String, list: true }
      - { name: year, type: Int }
"#;

pub fn schema() -> Schema {
    Schema::from_yaml_str(MOVIES_SCHEMA).expect("movie schema loads")
}

pub fn read(entity: &str, selection: &SelectionNode, auth: &AuthContext) -> Result<CompiledQuery, TranslateError> {
    let schema = schema();
    let config = CompilerConfig::default();
    Translator::new(&schema, &config).compile_read(entity, selection, auth)
}

pub fn aggregate(entity: &str, selection: &SelectionNode, auth: &AuthContext) -> Result<CompiledQuery, TranslateError> {
    let schema = schema();
    let config = CompilerConfig::default();
    Translator::new(&schema, &config).compile_aggregate(entity, selection, auth)
}

/// Position of `needle` in `text`, failing the test when absent
pub fn position(text: &str, needle: &str) -> usize {
    text.find(needle)
        .unwrap_or_else(|| panic!("`{}` not found in:\n{}", needle, text))
}
