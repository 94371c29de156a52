//! Unit tests - configuration and schema loading through the public API
//!
//! These run without a database and touch only the file system and the
//! process environment.

mod config_tests;
mod schema_loading_tests;
