use fbserial_settings::{
    CatalogEntry, Config, FlowControl, JsonParameterStore, ParameterCatalog, ParameterStore,
};
use tempfile::TempDir;

#[test]
fn test_config_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.connection.port = "/dev/ttyUSB1".to_string();
    config.connection.flow_control = FlowControl::Hardware;
    config.engine.exchange_timeout_ms = 750;
    config.parameters.database_path = Some(dir.path().join("params.json"));
    config.parameters.check_on_connect = true;
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded.connection.port, "/dev/ttyUSB1");
    assert_eq!(loaded.connection.flow_control, FlowControl::Hardware);
    assert_eq!(loaded.engine.exchange_timeout_ms, 750);
    assert_eq!(
        loaded.parameters.database_path,
        Some(dir.path().join("params.json"))
    );
    assert!(loaded.parameters.check_on_connect);
}

#[test]
fn test_config_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.engine.tick_interval_ms = 25;
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded.engine.tick_interval_ms, 25);
    assert_eq!(loaded.connection.baud_rate, 115200);
}

#[test]
fn test_invalid_config_is_not_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.connection.baud_rate = 0;
    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}

#[test]
fn test_load_or_default_without_file() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(config.connection.port, "/dev/ttyACM0");
}

#[test]
fn test_parameter_store_missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let store = JsonParameterStore::open(dir.path().join("params.json")).unwrap();
    assert_eq!(store.persisted_value(0).unwrap(), None);
    assert_eq!(store.load_catalog().unwrap(), ParameterCatalog::default());
}

#[test]
fn test_parameter_store_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.json");

    let mut store = JsonParameterStore::open(&path).unwrap();
    store.set_value(0, 5);
    store.set_value(71, 900);
    store.save().unwrap();

    let reopened = JsonParameterStore::open(&path).unwrap();
    assert_eq!(reopened.persisted_value(0).unwrap(), Some(5));
    assert_eq!(reopened.persisted_value(71).unwrap(), Some(900));
    assert_eq!(reopened.persisted_value(72).unwrap(), None);
}

#[test]
fn test_parameter_store_reload_picks_up_edits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.json");
    std::fs::write(&path, r#"{ "values": { "0": 3 } }"#).unwrap();

    let mut store = JsonParameterStore::open(&path).unwrap();
    assert_eq!(store.persisted_value(0).unwrap(), Some(3));

    std::fs::write(&path, r#"{ "values": { "0": 4, "11": 90 } }"#).unwrap();
    store.reload().unwrap();
    assert_eq!(store.persisted_value(0).unwrap(), Some(4));
    assert_eq!(store.persisted_value(11).unwrap(), Some(90));
}

#[test]
fn test_parameter_store_custom_catalog() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.json");
    std::fs::write(
        &path,
        r#"{
            "catalog": [
                { "name": "PARAM_VERSION", "id": 0, "default": 0 },
                { "name": "MOVEMENT_MAX_SPD_X", "id": 71, "default": 600 }
            ],
            "values": { "71": 650 }
        }"#,
    )
    .unwrap();

    let store = JsonParameterStore::open(&path).unwrap();
    let catalog = store.load_catalog().unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(
        catalog.by_id(71),
        Some(&CatalogEntry::new("MOVEMENT_MAX_SPD_X", 71, 600))
    );
}

#[test]
fn test_parameter_store_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(JsonParameterStore::open(&path).is_err());
}
