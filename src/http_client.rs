use crate::error::ClientError;
use anyhow::{Context, Result};
use reqwest::{Client, Response};

/// Create the pooled HTTP client shared by all device clients
///
/// The incubator controller lives on the local network, so proxies from the
/// environment are ignored. Timeouts are applied per request by the caller.
///
/// # Examples
/// ```no_run
/// use incubator_panel::http_client::device_http_client;
///
/// let client = device_http_client().expect("failed to create client");
/// ```
pub fn device_http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .no_proxy()
        .build()
        .context("failed to create device HTTP client")
}

/// Check the HTTP status of a device response
///
/// A non-2xx status is a network failure regardless of the body. The message
/// carries the status code and reason, prefixed with `failure_prefix` when the
/// caller names the operation.
///
/// # Arguments
/// * `res` - The HTTP response to check
/// * `failure_prefix` - Operation description such as "failed to set mode"
///
/// # Returns
/// * `Ok(Response)` - The untouched response if the status is successful
/// * `Err(ClientError::Network)` - If the status is not successful
pub fn check_response_status(
    res: Response,
    failure_prefix: Option<&str>,
) -> Result<Response, ClientError> {
    let status = res.status();

    if status.is_success() {
        return Ok(res);
    }

    Err(ClientError::Network(match failure_prefix {
        Some(prefix) => format!("{prefix}: HTTP {status}"),
        None => format!("HTTP {status}"),
    }))
}

/// Read the body of a successful response as text
///
/// Failures while reading are transport failures and classified as such.
pub async fn read_body(res: Response, fallback: &str) -> Result<String, ClientError> {
    res.text()
        .await
        .map_err(|e| ClientError::from_transport(&e, fallback))
}
