use super::*;

#[test]
fn test_load_config_missing_file_writes_and_returns_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    assert!(!path.exists());
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.default_companion, "");
    assert!(path.exists(), "missing config should be written with defaults");
}

#[test]
fn test_load_config_minimal_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{}").unwrap();
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.heartbeat.quiet_start, "21:00");
    assert!(config.tasks.contains_key(crate::config::TASK_MORNING_BRIEFING));
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut config = Config::default();
    config.default_companion = "Lissa".to_string();
    config.reminders.push(crate::config::Reminder {
        id: "r1".to_string(),
        text: "check the oven".to_string(),
        remind_at: "2026-07-27T12:00:00Z".to_string(),
        created_at: "2026-07-27T11:58:00Z".to_string(),
    });
    save_config(&config, Some(&path)).unwrap();
    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.default_companion, "Lissa");
    assert_eq!(loaded.reminders.len(), 1);
    assert_eq!(loaded.reminders[0].text, "check the oven");
}

#[test]
fn test_unknown_keys_deep_merge_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"defaultCompanion": "Aloy", "someFutureKey": 42}"#).unwrap();
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.default_companion, "Aloy");
    // Every previously-untouched key is still typed per the defaults.
    assert_eq!(config.heartbeat.quiet_end, "07:00");
    assert!(!config.variants.is_empty());
}

#[test]
fn test_save_config_atomic_write_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let config = Config::default();
    save_config(&config, Some(&path)).unwrap();
    assert!(path.exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[test]
fn test_env_override_applies() {
    use crate::config::credentials::apply_env_overrides;

    let mut config = Config::default();
    assert!(config.companion_service.api_key.is_empty());

    unsafe { std::env::set_var("BRIDGE_COMPANION_API_KEY", "test-key-from-env") };
    apply_env_overrides(&mut config);
    assert_eq!(config.companion_service.api_key, "test-key-from-env");

    unsafe { std::env::remove_var("BRIDGE_COMPANION_API_KEY") };
}

#[test]
fn test_env_override_empty_string_ignored() {
    use crate::config::credentials::apply_env_overrides;

    let mut config = Config::default();
    config.providers.home_assistant.bearer_token = "original-token".to_string();

    unsafe { std::env::set_var("BRIDGE_HOME_ASSISTANT_TOKEN", "") };
    apply_env_overrides(&mut config);
    assert_eq!(config.providers.home_assistant.bearer_token, "original-token");

    unsafe { std::env::remove_var("BRIDGE_HOME_ASSISTANT_TOKEN") };
}
