//! Compiler configuration from environment variables and YAML files

use std::env;
use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use cyphergate::config::{CompilerConfig, ConfigError};

const VARS: [&str; 3] = [
    "CYPHERGATE_MAX_SELECTION_DEPTH",
    "CYPHERGATE_DEFAULT_MAX_LIMIT",
    "CYPHERGATE_FORMAT_DATETIME",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = CompilerConfig::from_env().unwrap();
    assert_eq!(config, CompilerConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    env::set_var("CYPHERGATE_MAX_SELECTION_DEPTH", "8");
    env::set_var("CYPHERGATE_DEFAULT_MAX_LIMIT", "50");
    env::set_var("CYPHERGATE_FORMAT_DATETIME", "false");
    let config = CompilerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.max_selection_depth, 8);
    assert_eq!(config.default_max_limit, Some(50));
    assert!(!config.format_datetime);
}

#[test]
#[serial]
fn test_from_env_rejects_bad_values() {
    clear_env();
    env::set_var("CYPHERGATE_MAX_SELECTION_DEPTH", "deep");
    let parse = CompilerConfig::from_env();
    env::set_var("CYPHERGATE_MAX_SELECTION_DEPTH", "0");
    let range = CompilerConfig::from_env();
    clear_env();

    assert!(matches!(parse, Err(ConfigError::Parse { .. })));
    assert!(matches!(range, Err(ConfigError::Validation(_))));
}

#[test]
fn test_from_yaml_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "max_selection_depth: 4\ndefault_max_limit: 25").unwrap();

    let config = CompilerConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.max_selection_depth, 4);
    assert_eq!(config.default_max_limit, Some(25));
    // Omitted keys keep their defaults
    assert!(config.format_datetime);
}

#[test]
fn test_from_yaml_file_validates() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "default_max_limit: 0").unwrap();
    assert!(matches!(
        CompilerConfig::from_yaml_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}
