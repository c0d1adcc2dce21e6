//! Shared request plumbing for the Public API and Vault API clients.
//!
//! One call = build URL → attach auth → send → check status → decode JSON.
//! Failures are logged with method/URL (and status/body for HTTP errors)
//! before being returned.

use crate::bitwarden::types::*;
use log::error;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Build the HTTP client used by every Bitwarden call.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, BitwardenError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BitwardenError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Serialize any request body into a JSON value.
pub(crate) fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, BitwardenError> {
    serde_json::to_value(body).map_err(|e| BitwardenError::parse(format!("Request body error: {}", e)))
}

/// Return the array under `data` when `value` is a `{"data": [...]}`
/// envelope, otherwise `value` unchanged.
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_array) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

/// Append `segments` to `base`, percent-encoding each one as a single path
/// segment. Empty, `.` and `..` segments are rejected.
pub(crate) fn endpoint_url(base: &str, segments: &[&str]) -> Result<String, BitwardenError> {
    if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
        return Err(BitwardenError::invalid_input(format!("Invalid path segment '{}'", bad)));
    }
    let mut url = Url::parse(base)
        .map_err(|e| BitwardenError::invalid_config(format!("Invalid base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| BitwardenError::invalid_config(format!("Base URL cannot have a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

/// Decode a success body. Empty bodies and JSON `null` become `{}`.
fn decode_body(text: &str) -> Result<Value, BitwardenError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(value) => Ok(value),
        Err(e) => Err(BitwardenError::parse(format!("Response parse error: {}", e))),
    }
}

/// JSON transport shared by both API clients.
#[derive(Debug, Clone)]
pub(crate) struct ApiTransport {
    client: Client,
    /// Human-readable API name used in logs and error messages.
    label: &'static str,
}

impl ApiTransport {
    pub(crate) fn new(label: &'static str, timeout_secs: u64) -> Result<Self, BitwardenError> {
        Ok(Self { client: build_client(timeout_secs)?, label })
    }

    /// Send one request and decode the JSON response.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, BitwardenError> {
        let mut builder = self.client.request(method.clone(), url).header(ACCEPT, "application/json");
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
                builder = builder.json(body);
            }
        }

        let request = builder.build().map_err(|e| {
            error!("Bitwarden {} request exception: {} {}: {}", self.label, method, url, e);
            BitwardenError::network(format!("Invalid {} request: {}", self.label, e))
        })?;
        let full_url = request.url().to_string();

        let response = self.client.execute(request).await.map_err(|e| {
            error!("Bitwarden {} request exception: {} {}: {}", self.label, method, full_url, e);
            BitwardenError::network(format!("{} request failed: {}", self.label, e))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Bitwarden {} request exception: {} {}: {}", self.label, method, full_url, e);
            BitwardenError::network(format!("Failed to read {} response: {}", self.label, e))
        })?;

        if !status.is_success() {
            error!(
                "Bitwarden {} request failed: {} {} -> {}: {}",
                self.label,
                method,
                full_url,
                status.as_u16(),
                text
            );
            return Err(BitwardenError::api(format!(
                "{} request failed: {} - {}",
                self.label,
                status.as_u16(),
                text
            ))
            .with_status(status.as_u16()));
        }

        decode_body(&text)
    }
}
