use opendata_core::config::{ConfigManager, Retention, ViewerConfig};
use tempfile::tempdir;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("viewer.json"));

    let config = manager.load().unwrap();
    assert_eq!(config, ViewerConfig::default());
}

#[test]
fn test_save_creates_parent_and_round_trips() {
    let dir = tempdir().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("nested").join("viewer.json"));

    let mut config = ViewerConfig::default();
    config.upstream_url = Some("https://data.example.gov/opendata.json".to_string());
    config.retention = Retention::Hide;
    config.allow_empty = true;
    config.print.template.author = "GIS Team".to_string();
    manager.save(&config).unwrap();

    assert!(manager.path().exists());
    assert_eq!(manager.load().unwrap(), config);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("viewer.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = ConfigManager::with_path(&path).load().unwrap_err();
    assert!(err.to_string().contains("Failed to parse viewer.json"));
}
