use crate::{
    device_client::{DeviceApi, DeviceConnector, DeviceStatus, normalize_base_url},
    error::ClientError,
    settings::LocalSettings,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{Notify, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval, sleep},
};

/// Schedule of the status subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPolicy {
    pub poll_interval: Duration,
    /// Additional attempts after a failed poll before the failure is shown.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            poll_interval: Duration::from_millis(3000),
            retries: 2,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Cached device status as seen by display consumers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusState {
    pub data: Option<DeviceStatus>,
    pub error: Option<ClientError>,
    /// True until the first result for the current address arrived.
    pub is_loading: bool,
    /// False while no device address is configured.
    pub is_active: bool,
}

impl StatusState {
    fn loading() -> Self {
        StatusState {
            is_loading: true,
            is_active: true,
            ..Default::default()
        }
    }

    fn record(&mut self, result: Result<DeviceStatus, ClientError>) {
        self.is_loading = false;
        match result {
            Ok(status) => {
                self.data = Some(status);
                self.error = None;
            }
            Err(e) => self.error = Some(e),
        }
    }
}

/// Requests an out-of-schedule status poll.
pub trait StatusRefresh: Send + Sync + 'static {
    fn refresh(&self);
}

#[derive(Clone, Debug, Default)]
pub struct RefreshHandle(Arc<Notify>);

impl StatusRefresh for RefreshHandle {
    fn refresh(&self) {
        self.0.notify_one();
    }
}

/// Subscription polling the device while an address is configured.
///
/// The polling task stops when this value is dropped.
pub struct StatusSync {
    state: watch::Receiver<StatusState>,
    refresh: RefreshHandle,
    task: JoinHandle<()>,
}

impl StatusSync {
    pub fn spawn<C: DeviceConnector>(
        connector: C,
        settings: watch::Receiver<LocalSettings>,
        policy: SyncPolicy,
    ) -> Self {
        let (state_tx, state) = watch::channel(StatusState::default());
        let refresh = RefreshHandle::default();

        let task = tokio::spawn(run(
            connector,
            settings,
            policy,
            state_tx,
            refresh.0.clone(),
        ));

        StatusSync {
            state,
            refresh,
            task,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusState> {
        self.state.clone()
    }

    pub fn current(&self) -> StatusState {
        self.state.borrow().clone()
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }
}

impl Drop for StatusSync {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<C: DeviceConnector>(
    connector: C,
    mut settings: watch::Receiver<LocalSettings>,
    policy: SyncPolicy,
    state: watch::Sender<StatusState>,
    refresh: Arc<Notify>,
) {
    loop {
        let base_url = normalize_base_url(&settings.borrow_and_update().device_base_url);

        if base_url.is_empty() {
            debug!("device address not configured, status polling paused");
            state.send_replace(StatusState::default());

            if settings.changed().await.is_err() {
                break;
            }
            continue;
        }

        info!("polling device status at {base_url}");
        state.send_replace(StatusState::loading());
        let client = connector.connect(&base_url);

        // an address change drops the in-flight poll, its result is never recorded
        tokio::select! {
            _ = poll(&client, &policy, &state, &refresh) => {}
            changed = address_changed(&mut settings, &base_url) => {
                if !changed {
                    break;
                }
            }
        }
    }

    debug!("settings channel closed, status polling stopped");
}

/// Resolves once the configured address differs from `current`, or with
/// `false` when the settings channel is closed.
async fn address_changed(settings: &mut watch::Receiver<LocalSettings>, current: &str) -> bool {
    loop {
        if settings.changed().await.is_err() {
            return false;
        }

        let address = normalize_base_url(&settings.borrow().device_base_url);
        if address != current {
            return true;
        }
    }
}

async fn poll<A: DeviceApi>(
    client: &A,
    policy: &SyncPolicy,
    state: &watch::Sender<StatusState>,
    refresh: &Notify,
) {
    // a refresh requested before this address was polled is covered by the first tick
    {
        let stale = refresh.notified();
        tokio::pin!(stale);
        stale.as_mut().enable();
    }

    let mut ticker = interval(policy.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = refresh.notified() => debug!("status refresh requested"),
        }

        let result = fetch_with_retry(client, policy).await;
        state.send_modify(|current| current.record(result));
    }
}

async fn fetch_with_retry<A: DeviceApi>(
    client: &A,
    policy: &SyncPolicy,
) -> Result<DeviceStatus, ClientError> {
    let mut attempt = 0;

    loop {
        match client.get_status().await {
            Ok(status) => return Ok(status),
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                warn!(
                    "status poll failed: {e} (retry {attempt}/{} in {:?})",
                    policy.retries, policy.retry_delay
                );
                sleep(policy.retry_delay).await;
            }
            Err(e) => {
                error!("status poll failed after {} attempts: {e}", attempt + 1);
                return Err(e);
            }
        }
    }
}
