// tests/config_loading.rs

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use taskchain::config::{load_and_validate, load_from_path};
use taskchain::errors::ChainError;

fn write_chain_file(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Taskchain.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn full_chain_file_loads_with_defaults_applied() {
    let (_dir, path) = write_chain_file(
        r#"
[chain]
name = "nightly"
cancel_after_ms = 2500

[[step]]
name = "fetch"

[[step]]
name = "wait"
ticks = 3
tick_ms = 250

[[step]]
name = "abort"
cancel_chain = true
"#,
    );

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.chain.name, "nightly");
    assert_eq!(cfg.chain.cancel_after_ms, Some(2500));

    let names: Vec<&str> = cfg.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["fetch", "wait", "abort"]);

    assert_eq!(cfg.steps[0].ticks, 0);
    assert_eq!(cfg.steps[0].tick_ms, 1000);
    assert!(!cfg.steps[0].cancel_chain);
    assert_eq!((cfg.steps[1].ticks, cfg.steps[1].tick_ms), (3, 250));
    assert!(cfg.steps[2].cancel_chain);
}

#[test]
fn chain_section_is_optional() {
    let (_dir, path) = write_chain_file(
        r#"
[[step]]
name = "only"
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.chain.name, "chain");
    assert_eq!(cfg.chain.cancel_after_ms, None);
    assert_eq!(cfg.steps.len(), 1);
}

#[test]
fn raw_load_does_not_validate() {
    let (_dir, path) = write_chain_file("[chain]\nname = \"empty\"\n");

    let raw = load_from_path(&path).unwrap();
    assert!(raw.steps.is_empty());

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, ChainError::ConfigError(ref msg) if msg.contains("at least one")));
}

#[test]
fn duplicate_step_names_are_rejected() {
    let (_dir, path) = write_chain_file(
        r#"
[[step]]
name = "same"

[[step]]
name = "same"
"#,
    );

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, ChainError::ConfigError(ref msg) if msg.contains("duplicate")));
}

#[test]
fn zero_tick_interval_is_rejected_when_ticking() {
    let (_dir, path) = write_chain_file(
        r#"
[[step]]
name = "spin"
ticks = 2
tick_ms = 0
"#,
    );

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, ChainError::ConfigError(ref msg) if msg.contains("tick_ms")));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let (_dir, path) = write_chain_file("[[step]\nname = ");

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, ChainError::TomlError(_)));
}

#[test]
fn mistyped_fields_are_a_toml_error() {
    let (_dir, path) = write_chain_file(
        r#"
[[step]]
name = "bad"
ticks = "three"
"#,
    );

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, ChainError::TomlError(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ChainError::IoError(_)));
}
