//! Integration tests for tillkeep-config

use std::io::Write;
use std::sync::Arc;
use tillkeep_config::*;

#[test]
fn test_json_file_then_override() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"poll_schedule": "0 */5 * * * *", "stall_threshold_hours": 48}}"#
    )
    .unwrap();

    let service = ConfigService::builder()
        .add_file(file.path().to_string_lossy().to_string(), FileFormat::Json)
        .build()
        .unwrap();
    service.manager().set("stall_threshold_hours", 24).unwrap();

    let core = service.core().unwrap();
    assert_eq!(core.poll_schedule, "0 */5 * * * *");
    assert_eq!(core.stall_threshold_hours, 24);
    assert_eq!(core.daily_schedule, core_config::DEFAULT_DAILY_SCHEDULE);
}

#[test]
fn test_invalid_cron_is_rejected() {
    let manager = ConfigManager::new();
    manager.set("daily_schedule", "every night").unwrap();

    let err = CoreConfig::from_manager(&manager).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_env_file_format() {
    let loader = ConfigLoader::new(FileFormat::Env);
    let value = loader
        .parse("# carrier\nexport WEBHOOK_SECRET=whsec_1\nPROVIDER_TIMEOUT_SECS=5\n")
        .unwrap();

    let manager = ConfigManager::new();
    manager.merge_value(value);
    assert_eq!(manager.get_string("webhook_secret").unwrap(), "whsec_1");

    let core = CoreConfig::from_manager(&manager).unwrap();
    assert_eq!(core.provider_timeout_secs, 5);
}

#[tokio::test]
async fn test_settings_shared_between_instances() {
    let store: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());

    let first = SettingsService::load(store.clone()).await.unwrap();
    let second = SettingsService::load(store.clone()).await.unwrap();
    assert_eq!(first.current(), StoreSettings::default());

    first
        .update(|s| s.returns_window_days = 14)
        .await
        .unwrap();

    // The other instance keeps its snapshot until it reloads.
    assert_eq!(second.current().returns_window_days, 30);
    let reloaded = second.reload().await.unwrap();
    assert_eq!(reloaded.returns_window_days, 14);
}

#[tokio::test]
async fn test_invalid_update_is_not_published() {
    let store: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());
    let service = SettingsService::load(store.clone()).await.unwrap();

    let result = service.update(|s| s.return_reasons.clear()).await;
    assert!(result.is_err());
    assert_eq!(service.current(), StoreSettings::default());

    let persisted = store.load(settings::SETTINGS_KEY).await.unwrap().unwrap();
    let persisted: StoreSettings = serde_json::from_str(&persisted).unwrap();
    assert_eq!(persisted, StoreSettings::default());
}
