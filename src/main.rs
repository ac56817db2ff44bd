use actix_cors::Cors;
use actix_files::Files;
use actix_server::ServerHandle;
use actix_web::{App, HttpServer, web::Data};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use incubator_panel::{
    api::Api,
    commands::CommandDispatcher,
    config::AppConfig,
    device_client::HttpConnector,
    http_client::device_http_client,
    kiosk::KioskFlagStore,
    settings::SettingsStore,
    status_sync::StatusSync,
    storage::JsonStore,
};
use log::{debug, error, info};
use std::{io::Write, sync::Arc};
use tokio::signal::unix::{SignalKind, signal};

type PanelApi = Api<HttpConnector>;

#[actix_web::main]
async fn main() {
    initialize_logging();

    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

fn initialize_logging() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

async fn run() -> Result<()> {
    let config = AppConfig::get()?;
    debug!("configuration: {config:?}");

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let store = JsonStore::new(&config.paths.data_dir);
    let settings = Arc::new(SettingsStore::load(store.clone()));
    let kiosk = Arc::new(KioskFlagStore::load(store));

    let connector = HttpConnector::new(device_http_client()?, config.device.request_timeout);
    let status_sync = StatusSync::spawn(connector.clone(), settings.subscribe(), config.sync);
    let dispatcher = Arc::new(CommandDispatcher::new(
        connector,
        settings.subscribe(),
        status_sync.refresh_handle(),
    ));

    let api = PanelApi::new(settings, kiosk, status_sync.subscribe(), dispatcher);
    let (server_handle, server_task) = run_server(api, config)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
        },
    }

    info!("shutting down");
    server_handle.stop(true).await;
    drop(status_sync);
    info!("shutdown complete");

    Ok(())
}

fn run_server(
    api: PanelApi,
    config: &'static AppConfig,
) -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let ui = &config.ui;

    let server = HttpServer::new(move || {
        let app = App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_header()
                    .allowed_methods(vec!["GET", "POST", "PATCH", "PUT"])
                    .max_age(3600),
            )
            .app_data(Data::new(api.clone()))
            .configure(PanelApi::configure);

        match &ui.static_dir {
            Some(dir) => app.service(Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind((ui.bind_address.as_str(), ui.port))
    .context("failed to bind server")?
    .disable_signals()
    .run();

    info!("listening on {}:{}", ui.bind_address, ui.port);

    Ok((server.handle(), tokio::spawn(server)))
}
