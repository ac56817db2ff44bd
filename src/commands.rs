use crate::{
    device_client::{DeviceApi, DeviceCommand, DeviceConnector},
    settings::LocalSettings,
    status_sync::StatusRefresh,
};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    ManualTurn,
    SetTemperature,
    SetHumidity,
    SetMode,
}

impl CommandKind {
    pub fn success_message(self) -> &'static str {
        match self {
            CommandKind::ManualTurn => "Manual egg turn triggered",
            CommandKind::SetTemperature => "Temperature updated",
            CommandKind::SetHumidity => "Humidity updated",
            CommandKind::SetMode => "Species mode updated",
        }
    }

    pub fn failure_prefix(self) -> &'static str {
        match self {
            CommandKind::ManualTurn => "Manual turn failed",
            CommandKind::SetTemperature => "Failed to set temperature",
            CommandKind::SetHumidity => "Failed to set humidity",
            CommandKind::SetMode => "Failed to set mode",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl From<&DeviceCommand> for CommandKind {
    fn from(command: &DeviceCommand) -> Self {
        match command {
            DeviceCommand::ManualTurn => CommandKind::ManualTurn,
            DeviceCommand::SetTemperature(_) => CommandKind::SetTemperature,
            DeviceCommand::SetHumidity(_) => CommandKind::SetHumidity,
            DeviceCommand::SetMode(_) => CommandKind::SetMode,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// One-shot outcome of a command, presented as a toast by the panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Notification {
            id: Uuid::new_v4(),
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notification {
            id: Uuid::new_v4(),
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.level == NotificationLevel::Success
    }
}

/// Pending flag per command, used to disable the triggering controls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCommands {
    pub manual_turn: bool,
    pub set_temperature: bool,
    pub set_humidity: bool,
    pub set_mode: bool,
}

#[derive(Debug, Default)]
struct InFlight([AtomicUsize; 4]);

impl InFlight {
    fn begin(&self, kind: CommandKind) -> InFlightGuard<'_> {
        self.0[kind.index()].fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            in_flight: self,
            kind,
        }
    }

    fn is_pending(&self, kind: CommandKind) -> bool {
        self.0[kind.index()].load(Ordering::SeqCst) > 0
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    kind: CommandKind,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.0[self.kind.index()].fetch_sub(1, Ordering::SeqCst);
    }
}

/// Issues write operations against the configured device.
///
/// Every dispatch produces exactly one [`Notification`]. A successful command
/// forces a status refresh since the device state is now stale; failures are
/// final and never retried here.
pub struct CommandDispatcher<C, R> {
    connector: C,
    settings: watch::Receiver<LocalSettings>,
    refresher: R,
    in_flight: InFlight,
}

impl<C, R> CommandDispatcher<C, R>
where
    C: DeviceConnector,
    R: StatusRefresh,
{
    pub fn new(connector: C, settings: watch::Receiver<LocalSettings>, refresher: R) -> Self {
        CommandDispatcher {
            connector,
            settings,
            refresher,
            in_flight: InFlight::default(),
        }
    }

    pub async fn manual_turn(&self) -> Notification {
        self.dispatch(DeviceCommand::ManualTurn).await
    }

    pub async fn set_temperature(&self, value: f64) -> Notification {
        self.dispatch(DeviceCommand::SetTemperature(value)).await
    }

    pub async fn set_humidity(&self, value: f64) -> Notification {
        self.dispatch(DeviceCommand::SetHumidity(value)).await
    }

    pub async fn set_mode(&self, name: &str) -> Notification {
        self.dispatch(DeviceCommand::SetMode(name.to_string())).await
    }

    /// Push the saved incubation targets to the device
    pub async fn push_targets(&self, settings: &LocalSettings) -> Vec<Notification> {
        let (temperature, humidity) = tokio::join!(
            self.set_temperature(settings.target_temperature),
            self.set_humidity(settings.target_humidity)
        );

        vec![temperature, humidity]
    }

    pub async fn dispatch(&self, command: DeviceCommand) -> Notification {
        let kind = CommandKind::from(&command);
        let _in_flight = self.in_flight.begin(kind);

        let base_url = self.settings.borrow().device_base_url.clone();
        let client = self.connector.connect(&base_url);

        let result = match &command {
            DeviceCommand::ManualTurn => client.manual_turn().await,
            DeviceCommand::SetTemperature(value) => client.set_temperature(*value).await,
            DeviceCommand::SetHumidity(value) => client.set_humidity(*value).await,
            DeviceCommand::SetMode(name) => client.set_mode(name).await,
        };

        match result {
            Ok(()) => {
                info!("{command:?} acknowledged by device");
                self.refresher.refresh();
                Notification::success(kind.success_message())
            }
            Err(e) => {
                warn!("{command:?} failed: {e}");
                Notification::error(format!("{}: {}", kind.failure_prefix(), e.message()))
            }
        }
    }

    pub fn is_pending(&self, kind: CommandKind) -> bool {
        self.in_flight.is_pending(kind)
    }

    pub fn pending(&self) -> PendingCommands {
        PendingCommands {
            manual_turn: self.is_pending(CommandKind::ManualTurn),
            set_temperature: self.is_pending(CommandKind::SetTemperature),
            set_humidity: self.is_pending(CommandKind::SetHumidity),
            set_mode: self.is_pending(CommandKind::SetMode),
        }
    }
}
