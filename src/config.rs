use crate::status_sync::SyncPolicy;
use anyhow::{Context, Result, ensure};
use std::{env, path::PathBuf, str::FromStr, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Panel API server configuration
    pub ui: UiConfig,

    /// Incubator controller client configuration
    pub device: DeviceConfig,

    /// Status polling schedule
    pub sync: SyncPolicy,

    /// Path configuration
    pub paths: PathConfig,
}

#[derive(Clone, Debug)]
pub struct UiConfig {
    pub port: u16,
    pub bind_address: String,
    pub static_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub request_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// The first call loads from the environment; later calls return the
    /// cached instance, or the error of the first load.
    pub fn get() -> Result<&'static Self> {
        static APP_CONFIG: OnceLock<Result<AppConfig, String>> = OnceLock::new();

        APP_CONFIG
            .get_or_init(|| Self::from_env().map_err(|e| format!("{e:#}")))
            .as_ref()
            .map_err(|e| anyhow::anyhow!("failed to load application configuration: {e}"))
    }

    pub fn from_env() -> Result<Self> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Load the configuration from an arbitrary variable source
    ///
    /// # Arguments
    /// * `lookup` - returns the value of a variable, `None` if unset
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            ui: UiConfig::load(&lookup)?,
            device: DeviceConfig::load(&lookup)?,
            sync: load_sync_policy(&lookup)?,
            paths: PathConfig::load(&lookup)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("failed to parse {key}: invalid format")),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let default = u64::try_from(default.as_millis()).context("default out of range")?;
    parse_or(lookup, key, default).map(Duration::from_millis)
}

impl UiConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = parse_or(lookup, "UI_PORT", 8080u16)?;
        let bind_address = lookup("UI_BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1".to_string());
        let static_dir = lookup("STATIC_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            bind_address,
            static_dir,
        })
    }
}

impl DeviceConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let request_timeout = millis_or(
            lookup,
            "DEVICE_REQUEST_TIMEOUT_MS",
            Duration::from_millis(5000),
        )?;

        ensure!(
            !request_timeout.is_zero(),
            "failed to parse DEVICE_REQUEST_TIMEOUT_MS: must be greater than 0"
        );

        Ok(Self { request_timeout })
    }
}

fn load_sync_policy(lookup: &impl Fn(&str) -> Option<String>) -> Result<SyncPolicy> {
    let defaults = SyncPolicy::default();

    let poll_interval = millis_or(lookup, "STATUS_POLL_INTERVAL_MS", defaults.poll_interval)?;
    let retries = parse_or(lookup, "STATUS_RETRY_COUNT", defaults.retries)?;
    let retry_delay = millis_or(lookup, "STATUS_RETRY_DELAY_MS", defaults.retry_delay)?;

    ensure!(
        !poll_interval.is_zero(),
        "failed to parse STATUS_POLL_INTERVAL_MS: must be greater than 0"
    );

    Ok(SyncPolicy {
        poll_interval,
        retries,
        retry_delay,
    })
}

impl PathConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = lookup("DATA_DIR")
            .unwrap_or_else(|| format!("/var/lib/{}", env!("CARGO_PKG_NAME")))
            .into();

        Ok(Self { data_dir })
    }
}
