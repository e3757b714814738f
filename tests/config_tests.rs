// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use edge_viewer::config::ConfigError;
use edge_viewer::{CaptureBackendType, Config, FilterMode, Resolution, TransformKind};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.backend, CaptureBackendType::Synthetic);
    assert_eq!(config.preferred_resolution, Resolution::new(640, 480));
    assert_eq!(config.transform, TransformKind::Edges);
    assert_eq!(config.initial_filter, FilterMode::None);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    // Parent directories are created on save
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        backend: CaptureBackendType::V4l2,
        preferred_resolution: Resolution::new(1280, 720),
        transform: TransformKind::Color,
        initial_filter: FilterMode::Threshold,
        queue_depth: 5,
        stop_timeout_ms: 750,
        synthetic_fps: 15,
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.json"));
}

#[test]
fn test_enum_values_are_lowercase() {
    let json = serde_json::to_value(Config::default()).unwrap();
    assert_eq!(json["backend"], "synthetic");
    assert_eq!(json["transform"], "edges");
    assert_eq!(json["initial_filter"], "none");
    assert_eq!(json["preferred_resolution"]["width"], 640);
}
