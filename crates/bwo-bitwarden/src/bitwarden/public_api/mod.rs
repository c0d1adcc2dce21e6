//! Client for the Bitwarden organization Public API.
//!
//! Every call fetches a bearer token through [`TokenService`] and hits
//! `{api_url}public/...`. Resource operations live in one file per resource.

mod collections;
mod groups;
mod members;

use crate::bitwarden::http::{endpoint_url, ApiTransport};
use crate::bitwarden::settings::SettingsResolver;
use crate::bitwarden::token::TokenService;
use crate::bitwarden::types::*;
use log::debug;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Normalize a server API URL so it ends with `/api/`.
pub fn normalize_api_base(api_url: &str) -> String {
    if api_url.ends_with("/api/") {
        return api_url.to_string();
    }
    let trimmed = api_url.trim_end_matches('/');
    if trimmed.ends_with("/api") {
        format!("{}/", trimmed)
    } else {
        format!("{}/api/", trimmed)
    }
}

/// Bearer-authenticated Public API client.
#[derive(Debug, Clone)]
pub struct PublicApiClient {
    settings: Arc<SettingsResolver>,
    tokens: Arc<TokenService>,
    transport: ApiTransport,
}

impl PublicApiClient {
    pub fn new(settings: Arc<SettingsResolver>, tokens: Arc<TokenService>) -> Result<Self, BitwardenError> {
        let transport = ApiTransport::new("Public API", settings.config().timeout_secs)?;
        Ok(Self { settings, tokens, transport })
    }

    /// Resolved base URL, always ending with `/api/`.
    pub fn base_url(&self) -> String {
        normalize_api_base(&self.settings.api_url())
    }

    fn url(&self, segments: &[&str]) -> Result<String, BitwardenError> {
        endpoint_url(&self.base_url(), segments)
    }

    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, BitwardenError> {
        let url = self.url(segments)?;
        let token = self.tokens.get_token().await?;
        self.transport.send(method, &url, Some(&token), query, body).await
    }

    async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value, BitwardenError> {
        let response = self.request(Method::GET, segments, query, None).await?;
        if segments.get(1) == Some(&"groups") {
            debug!(
                "Bitwarden {} response: {} (data key: {})",
                segments.join("/"),
                shape(&response),
                response.get("data").is_some()
            );
        }
        Ok(response)
    }

    async fn post(&self, segments: &[&str], body: &Value) -> Result<Value, BitwardenError> {
        self.request(Method::POST, segments, &[], Some(body)).await
    }

    async fn put(&self, segments: &[&str], body: &Value) -> Result<Value, BitwardenError> {
        self.request(Method::PUT, segments, &[], Some(body)).await
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), BitwardenError> {
        self.request(Method::DELETE, segments, &[], None).await?;
        Ok(())
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
        _ => "scalar",
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::bitwarden::token_store::{MemoryTokenStore, TokenStore};
    use chrono::{Duration, Utc};

    /// A client pointed at `server_uri` with a pre-seeded valid token `tok`.
    pub(crate) async fn client(server_uri: &str, group_users_body: GroupUsersBody) -> PublicApiClient {
        let config = BitwardenConfig {
            api_url: format!("{}/api/", server_uri),
            organization_api_client_id: "organization.org-1".into(),
            organization_api_client_secret: "secret".into(),
            timeout_secs: 5,
            group_users_body,
            ..Default::default()
        };
        let store = Arc::new(MemoryTokenStore::new());
        let now = Utc::now();
        store
            .insert(NewAccessToken {
                client_id: "organization.org-1".into(),
                access_token: "tok".into(),
                expires_in: 3600,
                expires_at: now + Duration::seconds(3600),
                device_identifier: "d".into(),
                device_name: "Public API Client".into(),
                device_type: 14,
                created_at: now,
            })
            .await
            .unwrap();
        let settings = Arc::new(SettingsResolver::new(config));
        let tokens = Arc::new(TokenService::new(settings.clone(), store).unwrap());
        PublicApiClient::new(settings, tokens).unwrap()
    }
}
