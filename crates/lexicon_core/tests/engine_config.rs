use lexicon_core::{ConfigError, EngineConfig, WriteMode};
use std::time::Duration;

#[test]
fn loads_engine_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lexicon.toml");
    std::fs::write(
        &path,
        "lookup_batch_size = 5\nbusy_timeout_ms = 750\nwrite_mode = \"split\"\n",
    )
    .unwrap();

    let config = EngineConfig::from_file(&path).unwrap();

    assert_eq!(config.lookup_batch_size, 5);
    assert_eq!(config.busy_timeout(), Duration::from_millis(750));
    assert_eq!(config.write_mode, WriteMode::Split);
    assert!(config.logging.dir.is_none());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn zero_batch_size_is_rejected() {
    let err = EngineConfig::from_toml("lookup_batch_size = 0").unwrap_err();
    assert!(err.to_string().starts_with("invalid config"));
}
