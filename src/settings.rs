use crate::storage::JsonStore;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Operator preferences persisted on the panel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSettings {
    pub device_base_url: String,
    pub target_temperature: f64,
    pub target_humidity: f64,
    pub turning_interval_hours: u32,
    pub kiosk_mode_enabled: bool,
}

impl Default for LocalSettings {
    fn default() -> Self {
        LocalSettings {
            device_base_url: "http://192.168.4.1".to_string(),
            target_temperature: 37.5,
            target_humidity: 60.0,
            turning_interval_hours: 4,
            kiosk_mode_enabled: false,
        }
    }
}

/// Partial update of [`LocalSettings`]; `None` fields keep their value.
///
/// The bounds mirror the ranges the settings screen offers.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[validate(max_length = 256)]
    pub device_base_url: Option<String>,
    #[validate(minimum = 30.0)]
    #[validate(maximum = 42.0)]
    pub target_temperature: Option<f64>,
    #[validate(minimum = 30.0)]
    #[validate(maximum = 80.0)]
    pub target_humidity: Option<f64>,
    #[validate(minimum = 1)]
    #[validate(maximum = 12)]
    pub turning_interval_hours: Option<u32>,
    pub kiosk_mode_enabled: Option<bool>,
}

impl LocalSettings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(device_base_url) = patch.device_base_url {
            self.device_base_url = device_base_url;
        }
        if let Some(target_temperature) = patch.target_temperature {
            self.target_temperature = target_temperature;
        }
        if let Some(target_humidity) = patch.target_humidity {
            self.target_humidity = target_humidity;
        }
        if let Some(turning_interval_hours) = patch.turning_interval_hours {
            self.turning_interval_hours = turning_interval_hours;
        }
        if let Some(kiosk_mode_enabled) = patch.kiosk_mode_enabled {
            self.kiosk_mode_enabled = kiosk_mode_enabled;
        }
    }
}

/// Owner of the persisted [`LocalSettings`].
///
/// Consumers observe the current value through [`SettingsStore::subscribe`].
pub struct SettingsStore {
    store: JsonStore,
    tx: watch::Sender<LocalSettings>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub const KEY: &str = "incubator-settings";

    /// Load the persisted settings merged over the defaults
    ///
    /// A missing, unreadable or unparsable record is not an error: the store
    /// starts from the defaults.
    pub fn load(store: JsonStore) -> Self {
        let settings = match store.load_merged::<LocalSettings>(Self::KEY) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("failed to load settings, using defaults: {e:#}");
                LocalSettings::default()
            }
        };

        debug!("loaded settings: {settings:?}");

        SettingsStore {
            store,
            tx: watch::Sender::new(settings),
            write_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> LocalSettings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalSettings> {
        self.tx.subscribe()
    }

    /// Merge `patch` into the settings and persist the result
    ///
    /// Persisting failures are logged only; the in-memory value is updated
    /// either way.
    pub fn update(&self, patch: SettingsPatch) -> LocalSettings {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.tx.send_modify(|settings| settings.apply(patch));
        let settings = self.get();

        info!("settings updated: {settings:?}");
        self.persist(&settings);

        settings
    }

    fn persist(&self, settings: &LocalSettings) {
        if let Err(e) = self.store.write(Self::KEY, settings) {
            error!("failed to save settings: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(dir: &TempDir) -> SettingsStore {
        SettingsStore::load(JsonStore::new(dir.path()))
    }

    #[test]
    fn empty_storage_loads_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load(&dir).get(), LocalSettings::default());
    }

    #[test]
    fn partial_update_round_trips_through_storage() {
        let dir = TempDir::new().unwrap();
        load(&dir).update(SettingsPatch {
            target_temperature: Some(38.0),
            ..Default::default()
        });

        let reloaded = load(&dir).get();
        assert_eq!(
            reloaded,
            LocalSettings {
                target_temperature: 38.0,
                ..Default::default()
            }
        );
    }

    #[test]
    fn successive_updates_keep_earlier_fields() {
        let dir = TempDir::new().unwrap();
        let store = load(&dir);

        store.update(SettingsPatch {
            device_base_url: Some("http://10.0.0.2".to_string()),
            ..Default::default()
        });
        let settings = store.update(SettingsPatch {
            turning_interval_hours: Some(6),
            ..Default::default()
        });

        assert_eq!(settings.device_base_url, "http://10.0.0.2");
        assert_eq!(settings.turning_interval_hours, 6);
        assert_eq!(settings.target_humidity, 60.0);
    }

    #[test]
    fn older_schema_is_merged_over_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("incubator-settings.json"),
            r#"{"deviceBaseUrl": "http://incubator.local", "unknownField": 1}"#,
        )
        .unwrap();

        let settings = load(&dir).get();
        assert_eq!(settings.device_base_url, "http://incubator.local");
        assert_eq!(settings.target_temperature, 37.5);
        assert_eq!(settings.turning_interval_hours, 4);
    }

    #[test]
    fn mistyped_field_keeps_the_other_stored_fields() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("incubator-settings.json"),
            r#"{"deviceBaseUrl":"http://10.0.0.9","targetTemperature":38.0,"turningIntervalHours":4.5}"#,
        )
        .unwrap();

        let settings = load(&dir).get();
        assert_eq!(settings.device_base_url, "http://10.0.0.9");
        assert_eq!(settings.target_temperature, 38.0);
        assert_eq!(settings.turning_interval_hours, 4);
        assert_eq!(settings.target_humidity, 60.0);
    }

    #[test]
    fn corrupt_storage_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("incubator-settings.json"), "][").unwrap();

        assert_eq!(load(&dir).get(), LocalSettings::default());
    }

    #[test]
    fn persist_failure_is_absorbed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let store = SettingsStore::load(JsonStore::new(&blocker));
        let settings = store.update(SettingsPatch {
            target_humidity: Some(65.0),
            ..Default::default()
        });

        assert_eq!(settings.target_humidity, 65.0);
        assert_eq!(store.get().target_humidity, 65.0);
    }

    #[test]
    fn subscribers_observe_updates() {
        let dir = TempDir::new().unwrap();
        let store = load(&dir);
        let mut rx = store.subscribe();

        store.update(SettingsPatch {
            device_base_url: Some(String::new()),
            ..Default::default()
        });

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().device_base_url, "");
    }

    #[test]
    fn patch_bounds() {
        let valid = SettingsPatch {
            target_temperature: Some(38.2),
            target_humidity: Some(55.0),
            turning_interval_hours: Some(12),
            ..Default::default()
        };
        assert!(valid.validate().is_ok());

        let too_hot = SettingsPatch {
            target_temperature: Some(45.0),
            ..Default::default()
        };
        assert!(too_hot.validate().is_err());

        let never_turn = SettingsPatch {
            turning_interval_hours: Some(0),
            ..Default::default()
        };
        assert!(never_turn.validate().is_err());

        assert!(SettingsPatch::default().validate().is_ok());
    }
}
