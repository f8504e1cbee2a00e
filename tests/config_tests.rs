// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use barcode_camera::Config;
use barcode_camera::backends::camera::ZoomBackend;
use barcode_camera::permission::PermissionBackend;
use barcode_camera::SymbolFormat;
use barcode_camera::constants::analysis;

fn temp_config_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("barcode-camera-test-{}-{}", name, std::process::id()))
        .join("config.json")
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.analysis_width, 1280);
    assert_eq!(config.analysis_height, 720);
    assert!(config.search_all_regions);
    assert_eq!(config.zoom_backend, ZoomBackend::Auto);
    assert_eq!(config.permission, PermissionBackend::Auto);
    assert!(!config.mirror_preview);
}

#[test]
fn test_config_requests_all_symbologies() {
    let options = Config::default().decoder_options();
    assert_eq!(options.formats.len(), 13);
    assert!(options.wants(SymbolFormat::QrCode));
    assert!(options.wants(SymbolFormat::Itf));
    assert!(options.search_all_regions);
}

#[test]
fn test_missing_file_gives_defaults() {
    let path = temp_config_path("missing");
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load() {
    let path = temp_config_path("save");
    let config = Config {
        camera: Some("/dev/video2".into()),
        rotation: 270,
        zoom_backend: ZoomBackend::Digital,
        permission: PermissionBackend::Portal,
        symbol_formats: vec![SymbolFormat::QrCode, SymbolFormat::Ean13],
        ..Config::default()
    };

    config.save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"zoom_backend\": \"digital\""));
    assert!(text.contains("\"ean13\""));

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_malformed_file_is_config_error() {
    let path = temp_config_path("malformed");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, barcode_camera::errors::AppError::Config(_)));

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_in_flight_decodes_clamped_on_load() {
    let path = temp_config_path("in-flight");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    std::fs::write(&path, r#"{ "max_in_flight_decodes": 18446744073709551615 }"#).unwrap();
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.max_in_flight_decodes, analysis::MAX_IN_FLIGHT_DECODES);

    std::fs::write(&path, r#"{ "max_in_flight_decodes": 0 }"#).unwrap();
    assert_eq!(Config::load_from(&path).unwrap().max_in_flight_decodes, 1);

    std::fs::write(&path, r#"{ "max_in_flight_decodes": 8 }"#).unwrap();
    assert_eq!(Config::load_from(&path).unwrap().max_in_flight_decodes, 8);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_bind_options_follow_config() {
    let config = Config {
        analysis_width: 640,
        analysis_height: 480,
        rotation: 90,
        ..Config::default()
    };
    let options = config.bind_options();
    assert_eq!(options.analysis.width, 640);
    assert_eq!(options.analysis.height, 480);
    assert_eq!(options.analysis.rotation.degrees(), 90);
}
