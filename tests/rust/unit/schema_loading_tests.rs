//! Schema definitions loaded from YAML files

use std::io::Write;

use tempfile::NamedTempFile;

use cyphergate::schema::{QueryDirection, RelationshipDirection, Schema, SchemaError, Target};

fn write_schema(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_schema_file() {
    let file = write_schema(
        r#"
entities:
  - name: Movie
    labels: [Movie, Content]
    fields:
      - { name: title, type: String }
    relationships:
      - { name: actors, type: ACTED_IN, target: Person, direction: IN, list: true, properties: ActedIn }
      - { name: related, type: RELATED, target: Production, direction: OUT, list: true, query_direction: UNDIRECTED_ONLY }
    implements: [Production]
  - name: Person
    fields:
      - { name: name, type: String }
interfaces:
  - name: Production
    fields:
      - { name: title, type: String }
relationship_properties:
  - name: ActedIn
    fields:
      - { name: roles, type: String, list: true }
"#,
    );
    let schema = Schema::from_yaml_file(file.path()).unwrap();

    let movie = schema.entity("Movie").unwrap();
    assert_eq!(movie.main_label(), "Movie");
    assert_eq!(movie.labels, vec!["Movie".to_string(), "Content".to_string()]);

    let actors = movie.relationship("actors").unwrap();
    assert_eq!(actors.direction, RelationshipDirection::In);
    assert!(actors.list);
    let edge = schema.relationship_properties("ActedIn").unwrap();
    assert!(edge.field("roles").unwrap().list);

    let related = movie.relationship("related").unwrap();
    assert_eq!(related.query_direction, QueryDirection::UndirectedOnly);
    assert!(matches!(schema.target("Production").unwrap(), Target::Interface(_)));
    assert_eq!(schema.implementations("Production").len(), 1);
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        Schema::from_yaml_file("/nonexistent/schema.yaml"),
        Err(SchemaError::ConfigReadError { .. })
    ));
}

#[test]
fn test_malformed_direction() {
    let file = write_schema(
        r#"
entities:
  - name: Movie
    relationships:
      - { name: actors, type: ACTED_IN, target: Movie, direction: SIDEWAYS }
"#,
    );
    assert!(matches!(
        Schema::from_yaml_file(file.path()),
        Err(SchemaError::InvalidDirection { .. })
    ));
}

#[test]
fn test_custom_argument_shadowing_binding() {
    let file = write_schema(
        r#"
entities:
  - name: Movie
    custom_fields:
      - name: similar
        statement: "MATCH (m:Movie) RETURN m"
        returns: Movie
        arguments:
          - { name: auth }
"#,
    );
    assert!(matches!(
        Schema::from_yaml_file(file.path()),
        Err(SchemaError::InvalidCustomArgument { .. })
    ));
}
