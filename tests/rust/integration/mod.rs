//! Integration tests - full compilations through `Translator`
//!
//! Every test loads the movie schema in `common`, compiles a request and
//! checks the generated Cypher and its parameters. No database is needed.

mod common;

mod aggregate_tests;
mod authorization_tests;
mod pagination_tests;
mod read_tests;
