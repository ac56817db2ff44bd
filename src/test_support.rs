use crate::{
    device_client::{DeviceApi, DeviceCommand, DeviceConnector, DeviceStatus},
    error::ClientError,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};
use tokio::sync::Notify;

pub fn sample_status() -> DeviceStatus {
    DeviceStatus {
        temperature: 37.6,
        humidity: 58.0,
        current_day: 5,
        days_remaining: 16,
        status_text: "Stable".to_string(),
        next_turn_countdown: "01:12".to_string(),
        active_mode: "Chicken".to_string(),
    }
}

#[derive(Default)]
struct FakeState {
    statuses: VecDeque<Result<DeviceStatus, ClientError>>,
    status_calls: Vec<String>,
    command_result: Option<ClientError>,
    commands: Vec<(String, DeviceCommand)>,
}

/// In-memory device shared by every client the connector hands out.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
    gate: Option<Arc<Notify>>,
}

impl FakeConnector {
    /// Commands wait for the returned notify before completing
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let connector = FakeConnector {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        (connector, gate)
    }

    /// Queue the result of the next status request; an empty queue answers
    /// with [`sample_status`]
    pub fn push_status(&self, result: Result<DeviceStatus, ClientError>) {
        self.state.lock().unwrap().statuses.push_back(result);
    }

    pub fn fail_commands(&self, error: ClientError) {
        self.state.lock().unwrap().command_result = Some(error);
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().status_calls.clone()
    }

    pub fn commands(&self) -> Vec<(String, DeviceCommand)> {
        self.state.lock().unwrap().commands.clone()
    }
}

pub struct FakeDevice {
    base_url: String,
    connector: FakeConnector,
}

impl FakeDevice {
    async fn command(&self, command: DeviceCommand) -> Result<(), ClientError> {
        if let Some(gate) = &self.connector.gate {
            gate.notified().await;
        }

        let mut state = self.connector.state.lock().unwrap();
        state.commands.push((self.base_url.clone(), command));
        match &state.command_result {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl DeviceConnector for FakeConnector {
    type Client = FakeDevice;

    fn connect(&self, base_url: &str) -> FakeDevice {
        FakeDevice {
            base_url: base_url.to_string(),
            connector: self.clone(),
        }
    }
}

impl DeviceApi for FakeDevice {
    async fn get_status(&self) -> Result<DeviceStatus, ClientError> {
        let mut state = self.connector.state.lock().unwrap();
        state.status_calls.push(self.base_url.clone());
        state.statuses.pop_front().unwrap_or_else(|| Ok(sample_status()))
    }

    async fn manual_turn(&self) -> Result<(), ClientError> {
        self.command(DeviceCommand::ManualTurn).await
    }

    async fn set_temperature(&self, value: f64) -> Result<(), ClientError> {
        self.command(DeviceCommand::SetTemperature(value)).await
    }

    async fn set_humidity(&self, value: f64) -> Result<(), ClientError> {
        self.command(DeviceCommand::SetHumidity(value)).await
    }

    async fn set_mode(&self, name: &str) -> Result<(), ClientError> {
        self.command(DeviceCommand::SetMode(name.to_string())).await
    }
}
