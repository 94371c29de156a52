//! Cyphergate - compiles graph API selections into parameterized Cypher
//!
//! A request arrives as a field-selection tree with filter, sort and paging
//! arguments. The compiler turns it into one Cypher query for Neo4j (with
//! APOC), enforcing the schema's authorization rules inside the query:
//! - `schema`: entity, relationship and authorization metadata
//! - `selection`: the request tree
//! - `translate`: filter, authorization, projection and pagination compilers
//! - `cypher`: the typed query AST and its serializer
//!
//! ```no_run
//! use cyphergate::config::CompilerConfig;
//! use cyphergate::schema::Schema;
//! use cyphergate::selection::SelectionNode;
//! use cyphergate::translate::{AuthContext, Translator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::from_yaml_file("schema.yaml")?;
//! let config = CompilerConfig::default();
//! let selection = SelectionNode::new("movies").fields("Movie", vec![SelectionNode::new("title")]);
//! let query = Translator::new(&schema, &config).compile_read("Movie", &selection, &AuthContext::anonymous())?;
//! println!("{}", query.text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cypher;
pub mod schema;
pub mod selection;
pub mod translate;
