pub mod api;
pub mod commands;
pub mod config;
pub mod device_client;
pub mod error;
pub mod http_client;
pub mod kiosk;
pub mod settings;
pub mod species;
pub mod status_sync;
pub mod storage;

#[cfg(test)]
mod test_support;
