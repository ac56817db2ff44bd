use crate::{
    commands::{CommandDispatcher, Notification},
    device_client::{DeviceConnector, DeviceStatus, StatusPhase},
    kiosk::{KioskFlag, KioskFlagStore},
    settings::{LocalSettings, SettingsPatch, SettingsStore},
    species::Species,
    status_sync::{RefreshHandle, StatusState},
};
use actix_web::{HttpResponse, Responder, web};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Deserialize, Validate)]
pub struct TemperaturePayload {
    #[validate(minimum = 30.0)]
    #[validate(maximum = 42.0)]
    value: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HumidityPayload {
    #[validate(minimum = 30.0)]
    #[validate(maximum = 80.0)]
    value: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ModePayload {
    #[validate(min_length = 1)]
    #[validate(max_length = 64)]
    name: String,
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    state: StatusState,
    phase: Option<StatusPhase>,
}

#[derive(Serialize)]
struct SaveSettingsResponse {
    settings: LocalSettings,
    notifications: Vec<Notification>,
}

pub type Dispatcher<C> = CommandDispatcher<C, RefreshHandle>;

pub struct Api<C: DeviceConnector> {
    pub settings: Arc<SettingsStore>,
    pub kiosk: Arc<KioskFlagStore>,
    pub status: watch::Receiver<StatusState>,
    pub dispatcher: Arc<Dispatcher<C>>,
}

impl<C: DeviceConnector> Clone for Api<C> {
    fn clone(&self) -> Self {
        Api {
            settings: self.settings.clone(),
            kiosk: self.kiosk.clone(),
            status: self.status.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<C: DeviceConnector> Api<C> {
    pub fn new(
        settings: Arc<SettingsStore>,
        kiosk: Arc<KioskFlagStore>,
        status: watch::Receiver<StatusState>,
        dispatcher: Arc<Dispatcher<C>>,
    ) -> Self {
        Api {
            settings,
            kiosk,
            status,
            dispatcher,
        }
    }

    /// Register the panel API routes
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/api/status", web::get().to(Self::status))
            .route("/api/commands/turn", web::post().to(Self::manual_turn))
            .route(
                "/api/commands/temperature",
                web::post().to(Self::set_temperature),
            )
            .route("/api/commands/humidity", web::post().to(Self::set_humidity))
            .route("/api/commands/mode", web::post().to(Self::set_mode))
            .route("/api/commands/pending", web::get().to(Self::pending))
            .route("/api/settings", web::get().to(Self::get_settings))
            .route("/api/settings", web::patch().to(Self::update_settings))
            .route("/api/settings/save", web::post().to(Self::save_settings))
            .route("/api/kiosk", web::get().to(Self::get_kiosk))
            .route("/api/kiosk", web::put().to(Self::set_kiosk))
            .route("/api/species", web::get().to(Self::species))
            .route("/version", web::get().to(Self::version));
    }

    pub async fn status(api: web::Data<Self>) -> impl Responder {
        let state = api.status.borrow().clone();
        let phase = state.data.as_ref().map(DeviceStatus::phase);

        HttpResponse::Ok().json(StatusResponse { state, phase })
    }

    pub async fn manual_turn(api: web::Data<Self>) -> impl Responder {
        debug!("manual_turn() called");
        notification_response(api.dispatcher.manual_turn().await)
    }

    pub async fn set_temperature(
        body: web::Json<TemperaturePayload>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("set_temperature() called: {body:?}");

        if let Err(e) = body.validate() {
            return bad_request(e);
        }

        notification_response(api.dispatcher.set_temperature(body.value).await)
    }

    pub async fn set_humidity(
        body: web::Json<HumidityPayload>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("set_humidity() called: {body:?}");

        if let Err(e) = body.validate() {
            return bad_request(e);
        }

        notification_response(api.dispatcher.set_humidity(body.value).await)
    }

    pub async fn set_mode(body: web::Json<ModePayload>, api: web::Data<Self>) -> impl Responder {
        debug!("set_mode() called: {body:?}");

        if let Err(e) = body.validate() {
            return bad_request(e);
        }

        notification_response(api.dispatcher.set_mode(&body.name).await)
    }

    pub async fn pending(api: web::Data<Self>) -> impl Responder {
        HttpResponse::Ok().json(api.dispatcher.pending())
    }

    pub async fn get_settings(api: web::Data<Self>) -> impl Responder {
        HttpResponse::Ok().json(api.settings.get())
    }

    pub async fn update_settings(
        body: web::Json<SettingsPatch>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("update_settings() called: {body:?}");

        if let Err(e) = body.validate() {
            return bad_request(e);
        }

        HttpResponse::Ok().json(api.settings.update(body.into_inner()))
    }

    /// Persist the settings, then push the saved targets to the device
    ///
    /// The settings are kept even when the device rejects the targets; the
    /// outcome of each push is reported as a notification.
    pub async fn save_settings(
        body: web::Json<SettingsPatch>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("save_settings() called: {body:?}");

        if let Err(e) = body.validate() {
            return bad_request(e);
        }

        let settings = api.settings.update(body.into_inner());
        let notifications = api.dispatcher.push_targets(&settings).await;

        HttpResponse::Ok().json(SaveSettingsResponse {
            settings,
            notifications,
        })
    }

    pub async fn get_kiosk(api: web::Data<Self>) -> impl Responder {
        HttpResponse::Ok().json(KioskFlag {
            enabled: api.kiosk.enabled(),
        })
    }

    pub async fn set_kiosk(body: web::Json<KioskFlag>, api: web::Data<Self>) -> impl Responder {
        debug!("set_kiosk() called: {body:?}");
        HttpResponse::Ok().json(api.kiosk.set(body.enabled))
    }

    pub async fn species() -> impl Responder {
        HttpResponse::Ok().json(Species::ALL)
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }
}

fn notification_response(notification: Notification) -> HttpResponse {
    if notification.is_success() {
        HttpResponse::Ok().json(notification)
    } else {
        HttpResponse::BadGateway().json(notification)
    }
}

fn bad_request(e: impl std::fmt::Display) -> HttpResponse {
    warn!("rejected payload: {e}");
    HttpResponse::BadRequest().body(e.to_string())
}
