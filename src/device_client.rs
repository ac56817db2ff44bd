use crate::{
    error::ClientError,
    http_client::{check_response_status, read_body},
};
use log::debug;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trait_variant::make;

/// Telemetry snapshot reported by the incubator controller.
///
/// Field names on the wire are the controller's short names; the descriptive
/// names are accepted as aliases.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DeviceStatus {
    #[serde(rename = "temp", alias = "temperature")]
    pub temperature: f64,
    pub humidity: f64,
    #[serde(rename = "day", alias = "currentDay")]
    pub current_day: i32,
    #[serde(rename = "days_left", alias = "daysRemaining")]
    pub days_remaining: i32,
    #[serde(rename = "status", alias = "statusText")]
    pub status_text: String,
    #[serde(rename = "turn_time", alias = "nextTurnCountdown")]
    pub next_turn_countdown: String,
    #[serde(rename = "mode", alias = "activeMode")]
    pub active_mode: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPhase {
    Normal,
    Warning,
    Alarm,
}

impl DeviceStatus {
    /// Classify the free-form status text reported by the controller
    pub fn phase(&self) -> StatusPhase {
        let lower = self.status_text.to_lowercase();
        if lower.contains("alarm") {
            StatusPhase::Alarm
        } else if lower.contains("cooling") || lower.contains("heating") {
            StatusPhase::Warning
        } else {
            StatusPhase::Normal
        }
    }
}

/// Write operation understood by the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    ManualTurn,
    SetTemperature(f64),
    SetHumidity(f64),
    SetMode(String),
}

impl DeviceCommand {
    fn endpoint(&self) -> &'static str {
        match self {
            DeviceCommand::ManualTurn => DeviceClient::MANUAL_TURN_ENDPOINT,
            DeviceCommand::SetTemperature(_) => DeviceClient::SET_TEMP_ENDPOINT,
            DeviceCommand::SetHumidity(_) => DeviceClient::SET_HUMIDITY_ENDPOINT,
            DeviceCommand::SetMode(_) => DeviceClient::SET_MODE_ENDPOINT,
        }
    }

    fn value(&self) -> Option<String> {
        match self {
            DeviceCommand::ManualTurn => None,
            DeviceCommand::SetTemperature(value) | DeviceCommand::SetHumidity(value) => {
                Some(value.to_string())
            }
            DeviceCommand::SetMode(name) => Some(name.clone()),
        }
    }

    fn failure_prefix(&self) -> &'static str {
        match self {
            DeviceCommand::ManualTurn => "failed to trigger manual turn",
            DeviceCommand::SetTemperature(_) => "failed to set temperature",
            DeviceCommand::SetHumidity(_) => "failed to set humidity",
            DeviceCommand::SetMode(_) => "failed to set mode",
        }
    }
}

/// Trims whitespace and removes exactly one trailing `/`.
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

#[make(Send)]
pub trait DeviceApi {
    async fn get_status(&self) -> Result<DeviceStatus, ClientError>;
    async fn manual_turn(&self) -> Result<(), ClientError>;
    async fn set_temperature(&self, value: f64) -> Result<(), ClientError>;
    async fn set_humidity(&self, value: f64) -> Result<(), ClientError>;
    async fn set_mode(&self, name: &str) -> Result<(), ClientError>;
}

/// Builds a device client bound to a base address.
pub trait DeviceConnector: Send + Sync + 'static {
    type Client: DeviceApi + Send + Sync + 'static;

    fn connect(&self, base_url: &str) -> Self::Client;
}

#[derive(Clone, Debug)]
pub struct DeviceClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DeviceClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

    // API endpoint constants
    const STATUS_ENDPOINT: &str = "/status";
    const MANUAL_TURN_ENDPOINT: &str = "/manualTurn";
    const SET_TEMP_ENDPOINT: &str = "/setTemp";
    const SET_HUMIDITY_ENDPOINT: &str = "/setHumidity";
    const SET_MODE_ENDPOINT: &str = "/setMode";

    const CONNECT_FALLBACK: &str = "failed to connect to device";

    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        DeviceClient {
            client,
            base_url: normalize_base_url(base_url),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// Full request target for the status endpoint
    pub fn status_url(&self) -> Result<Url, ClientError> {
        self.build_url(Self::STATUS_ENDPOINT, None)
    }

    /// Full request target for a command, value form-encoded into the query
    pub fn command_url(&self, command: &DeviceCommand) -> Result<Url, ClientError> {
        self.build_url(command.endpoint(), command.value().as_deref())
    }

    fn build_url(&self, path: &str, value: Option<&str>) -> Result<Url, ClientError> {
        if !self.is_configured() {
            return Err(ClientError::not_configured());
        }

        let mut url = Url::parse(&format!("{}{path}", self.base_url)).map_err(|e| {
            ClientError::Network(format!("invalid device address {}: {e}", self.base_url))
        })?;

        if let Some(value) = value {
            url.query_pairs_mut().append_pair("value", value);
        }

        Ok(url)
    }

    /// GET request to the controller, bounded by the client's timeout
    async fn get(
        &self,
        url: Url,
        failure_prefix: Option<&str>,
        fallback: &str,
    ) -> Result<reqwest::Response, ClientError> {
        debug!("GET {url}");

        let res = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&e, fallback))?;

        check_response_status(res, failure_prefix)
    }

    async fn send_command(&self, command: DeviceCommand) -> Result<(), ClientError> {
        let url = self.command_url(&command)?;
        let prefix = command.failure_prefix();

        self.get(url, Some(prefix), prefix).await?;
        Ok(())
    }
}

impl DeviceApi for DeviceClient {
    async fn get_status(&self) -> Result<DeviceStatus, ClientError> {
        let url = self.status_url()?;
        let res = self.get(url, None, Self::CONNECT_FALLBACK).await?;
        let body = read_body(res, Self::CONNECT_FALLBACK).await?;

        serde_json::from_str(&body)
            .map_err(|e| ClientError::Parse(format!("failed to parse status: {e}")))
    }

    async fn manual_turn(&self) -> Result<(), ClientError> {
        self.send_command(DeviceCommand::ManualTurn).await
    }

    async fn set_temperature(&self, value: f64) -> Result<(), ClientError> {
        self.send_command(DeviceCommand::SetTemperature(value)).await
    }

    async fn set_humidity(&self, value: f64) -> Result<(), ClientError> {
        self.send_command(DeviceCommand::SetHumidity(value)).await
    }

    async fn set_mode(&self, name: &str) -> Result<(), ClientError> {
        self.send_command(DeviceCommand::SetMode(name.to_string())).await
    }
}

/// Production connector: one pooled HTTP client, one timeout, any address.
#[derive(Clone, Debug)]
pub struct HttpConnector {
    client: Client,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(client: Client, timeout: Duration) -> Self {
        HttpConnector { client, timeout }
    }
}

impl DeviceConnector for HttpConnector {
    type Client = DeviceClient;

    fn connect(&self, base_url: &str) -> DeviceClient {
        DeviceClient::new(self.client.clone(), base_url, self.timeout)
    }
}
