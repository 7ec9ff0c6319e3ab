#![cfg(feature = "config")]

//! Loading transition configuration from files on disk.

use std::io::Write;
use std::time::Duration;

use springtide_core::{ConfigError, Directional, InitialMount, Motion, SpringParams, TransitionConfig};

fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn toml_file_with_shared_spring() {
    let file = write_temp(
        ".toml",
        r#"
        [motion.spring]
        mass = 2.0
        stiffness = 300.0
        damping = 20.0
        "#,
    );
    let config = TransitionConfig::load_toml_file(file.path()).unwrap();
    assert!(config.motion.is_shared());
    assert_eq!(
        *config.motion.open(),
        Motion::Spring(SpringParams::new(2.0, 300.0, 20.0))
    );
    assert_eq!(config.policy.initial, InitialMount::Opened);
}

#[test]
fn json_file_with_split_motion() {
    let file = write_temp(
        ".json",
        r#"{
            "motion": { "open": { "fixed": 80 }, "close": { "fixed": 240 } },
            "policy": { "keep_closed": true }
        }"#,
    );
    let config = TransitionConfig::from_json_file(file.path()).unwrap();
    assert_eq!(
        config.motion,
        Directional::Split {
            open: Motion::Fixed(Duration::from_millis(80)),
            close: Motion::Fixed(Duration::from_millis(240)),
        }
    );
    assert!(config.policy.keep_closed);
}

#[test]
fn serialized_config_reloads_identically() {
    let config = TransitionConfig::new()
        .with_split_motion(SpringParams::new(1.0, 250.0, 18.0), Duration::from_millis(120))
        .keep_closed(true);
    let text = toml::to_string(&config).unwrap();
    let file = write_temp(".toml", &text);
    assert_eq!(TransitionConfig::load_toml_file(file.path()).unwrap(), config);
}

#[test]
fn missing_file_is_io_error() {
    let err = TransitionConfig::from_toml_file("/nonexistent/springtide.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
