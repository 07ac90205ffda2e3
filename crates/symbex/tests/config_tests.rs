//! Integration tests for configuration loading

use std::fs;

use symbex::{ConfigError, SymbexConfig};
use tempfile::TempDir;

#[test]
fn test_config_file_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("symbex.toml");

    let mut config = SymbexConfig::default();
    config.plugin_name = "MySession".to_string();
    config.session.max_time = 120;
    config.to_file(&path).unwrap();

    let loaded = SymbexConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("symbex.toml");
    fs::write(&path, "[session]\nmax_time = 30\n").unwrap();

    let config = SymbexConfig::from_file(&path).unwrap();
    assert_eq!(config.plugin_name, "ConcolicSession");
    assert_eq!(config.max_symbolic_size, 1024);
    assert_eq!(config.max_name_len, 255);
    assert_eq!(config.session.max_time, 30);
    assert!(config.session.stop_on_error);
}

#[test]
fn test_invalid_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("symbex.toml");
    fs::write(&path, "max_symbolic_size = 0\n").unwrap();

    assert!(matches!(
        SymbexConfig::from_file(&path),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_missing_config_file() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
        SymbexConfig::from_file(&temp.path().join("absent.toml")),
        Err(ConfigError::Io(_))
    ));
}
