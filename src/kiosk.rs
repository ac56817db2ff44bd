use crate::storage::JsonStore;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct KioskFlag {
    pub enabled: bool,
}

/// Owner of the persisted kiosk display toggle.
pub struct KioskFlagStore {
    store: JsonStore,
    flag: Mutex<KioskFlag>,
}

impl KioskFlagStore {
    pub const KEY: &str = "incubator-kiosk-mode";

    pub fn load(store: JsonStore) -> Self {
        let flag = store
            .load_merged::<KioskFlag>(Self::KEY)
            .unwrap_or_else(|e| {
                warn!("failed to load kiosk mode, using default: {e:#}");
                KioskFlag::default()
            });

        KioskFlagStore {
            store,
            flag: Mutex::new(flag),
        }
    }

    pub fn enabled(&self) -> bool {
        self.flag.lock().unwrap_or_else(PoisonError::into_inner).enabled
    }

    pub fn set(&self, enabled: bool) -> KioskFlag {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        flag.enabled = enabled;

        info!("kiosk mode {}", if enabled { "enabled" } else { "disabled" });
        if let Err(e) = self.store.write(Self::KEY, &*flag) {
            error!("failed to save kiosk mode: {e:#}");
        }

        *flag
    }
}
