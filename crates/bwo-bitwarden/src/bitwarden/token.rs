//! OAuth2 client-credentials token acquisition.
//!
//! [`TokenService::get_token`] returns a cached token while one is valid and
//! otherwise requests a fresh one from `{base}/identity/connect/token`,
//! persisting it before returning.

use crate::bitwarden::http::build_client;
use crate::bitwarden::settings::SettingsResolver;
use crate::bitwarden::token_store::TokenStore;
use crate::bitwarden::types::*;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Strip a trailing `/api` (and slashes) from a server URL.
pub(crate) fn identity_base(api_url: &str) -> &str {
    let trimmed = api_url.trim_end_matches('/');
    trimmed.strip_suffix("/api").unwrap_or(trimmed).trim_end_matches('/')
}

/// Absolute expiry for a lifetime in seconds. `None` for negative or
/// out-of-range lifetimes.
fn expiry(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    if expires_in < 0 {
        return None;
    }
    now.checked_add_signed(Duration::try_seconds(expires_in)?)
}

/// Fetches and caches bearer tokens for the Public API.
pub struct TokenService {
    settings: Arc<SettingsResolver>,
    store: Arc<dyn TokenStore>,
    client: Client,
    /// Held while a new token is requested so concurrent callers share it.
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").field("settings", &self.settings).finish()
    }
}

impl TokenService {
    pub fn new(settings: Arc<SettingsResolver>, store: Arc<dyn TokenStore>) -> Result<Self, BitwardenError> {
        let client = build_client(settings.config().timeout_secs)?;
        Ok(Self { settings, store, client, refresh_lock: Mutex::new(()) })
    }

    /// The token endpoint derived from the resolved API URL.
    pub fn identity_url(&self) -> String {
        format!("{}/identity/connect/token", identity_base(&self.settings.api_url()))
    }

    /// The underlying token store.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Return a valid bearer token, requesting a new one when none is cached.
    pub async fn get_token(&self) -> Result<String, BitwardenError> {
        let client_id = self.settings.client_id();
        let client_secret = self.settings.client_secret();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(BitwardenError::invalid_config(
                "Bitwarden client credentials are not configured",
            ));
        }

        if let Some(record) = self.store.find_valid(&client_id, Utc::now()).await? {
            debug!("Reusing cached Bitwarden token #{} for {}", record.id, client_id);
            return Ok(record.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(record) = self.store.find_valid(&client_id, Utc::now()).await? {
            return Ok(record.access_token);
        }

        self.generate(&client_id, &client_secret).await
    }

    async fn generate(&self, client_id: &str, client_secret: &str) -> Result<String, BitwardenError> {
        let config = self.settings.config();
        let url = self.identity_url();

        let device_identifier = if config.organization_api_device_identifier.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.organization_api_device_identifier.clone()
        };
        let device_type = config.organization_api_device_type.to_string();

        let params = [
            ("grant_type", config.organization_api_grant_type.as_str()),
            ("scope", config.organization_api_scope.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("device_identifier", device_identifier.as_str()),
            ("device_name", config.organization_api_device_name.as_str()),
            ("device_type", device_type.as_str()),
        ];

        let resp = self.client.post(&url).form(&params).send().await.map_err(|e| {
            error!("Bitwarden token generation exception: {}: {}", url, e);
            BitwardenError::network(format!("Token request failed: {}", e))
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            error!("Bitwarden token generation exception: {}: {}", url, e);
            BitwardenError::network(format!("Failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            error!("Bitwarden token generation failed: {} -> {}: {}", url, status.as_u16(), body);
            return Err(BitwardenError::auth_failed(format!(
                "Token request failed: {} - {}",
                status.as_u16(),
                body
            ))
            .with_status(status.as_u16()));
        }

        let token: BearerToken = serde_json::from_str(&body)
            .map_err(|e| BitwardenError::parse(format!("Token parse error: {}: {}", e, body)))?;
        let access_token = match token.access_token {
            Some(t) if !t.is_empty() => t,
            _ => {
                error!("Bitwarden token generation failed: {}: no access_token in response", url);
                return Err(BitwardenError::parse(format!("Token response has no access_token: {}", body)));
            }
        };
        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

        let now = Utc::now();
        let expires_at = expiry(now, expires_in).ok_or_else(|| {
            error!("Bitwarden token generation failed: {}: invalid expires_in {}", url, expires_in);
            BitwardenError::parse(format!("Token response has invalid expires_in: {}", expires_in))
        })?;
        let record = self
            .store
            .insert(NewAccessToken {
                client_id: client_id.to_string(),
                access_token,
                expires_in,
                expires_at,
                device_identifier,
                device_name: config.organization_api_device_name.clone(),
                device_type: config.organization_api_device_type,
                created_at: now,
            })
            .await?;

        info!("Generated Bitwarden access token for {} (expires in {}s)", client_id, expires_in);
        Ok(record.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwarden::token_store::MemoryTokenStore;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: &str) -> BitwardenConfig {
        BitwardenConfig {
            api_url: api_url.to_string(),
            organization_api_client_id: "organization.org-1".into(),
            organization_api_client_secret: "secret".into(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn service(config: BitwardenConfig, store: Arc<MemoryTokenStore>) -> TokenService {
        TokenService::new(Arc::new(SettingsResolver::new(config)), store).unwrap()
    }

    fn new_token(token: &str, ttl: i64) -> NewAccessToken {
        let now = Utc::now();
        NewAccessToken {
            client_id: "organization.org-1".into(),
            access_token: token.into(),
            expires_in: ttl,
            expires_at: now + Duration::seconds(ttl),
            device_identifier: "d".into(),
            device_name: "Public API Client".into(),
            device_type: 14,
            created_at: now,
        }
    }

    #[test]
    fn identity_base_strips_api_suffix() {
        assert_eq!(identity_base("https://vault.bitwarden.com/api/"), "https://vault.bitwarden.com");
        assert_eq!(identity_base("https://vault.bitwarden.com/api"), "https://vault.bitwarden.com");
        assert_eq!(identity_base("https://vw.example.org/"), "https://vw.example.org");
        assert_eq!(identity_base("https://vw.example.org/bw/api/"), "https://vw.example.org/bw");
    }

    #[test]
    fn identity_url_uses_resolved_api_url() {
        let svc = service(config("https://vault.bitwarden.com/api/"), Arc::new(MemoryTokenStore::new()));
        assert_eq!(svc.identity_url(), "https://vault.bitwarden.com/identity/connect/token");
    }

    #[tokio::test]
    async fn reuses_valid_token_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        store.insert(new_token("cached", 3600)).await.unwrap();

        let svc = service(config(&format!("{}/api/", server.uri())), store);
        assert_eq!(svc.get_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn refreshes_expired_token_once_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/connect/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("scope=api.organization"))
            .and(body_string_contains("client_id=organization.org-1"))
            .and(body_string_contains("device_type=14"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh", "expires_in": 1800 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        store.insert(new_token("stale", -10)).await.unwrap();

        let svc = service(config(&format!("{}/api/", server.uri())), store.clone());
        let before = Utc::now();
        assert_eq!(svc.get_token().await.unwrap(), "fresh");
        // Second call is served from the store.
        assert_eq!(svc.get_token().await.unwrap(), "fresh");

        let rows = store.list("organization.org-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        let newest = &rows[0];
        assert_eq!(newest.expires_in, 1800);
        let delta = (newest.expires_at - before).num_seconds();
        assert!((1799..=1801).contains(&delta), "expires_at off by {}", delta);
    }

    #[tokio::test]
    async fn missing_expires_in_defaults_to_an_hour() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok" })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let svc = service(config(&server.uri()), store.clone());
        svc.get_token().await.unwrap();
        let rows = store.list("organization.org-1").await.unwrap();
        assert_eq!(rows[0].expires_in, 3600);
    }

    #[tokio::test]
    async fn out_of_range_expires_in_is_parse_error() {
        for expires_in in [9_000_000_000_000_000_i64, i64::MAX, -5] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t", "expires_in": expires_in })),
                )
                .mount(&server)
                .await;

            let store = Arc::new(MemoryTokenStore::new());
            let svc = service(config(&server.uri()), store.clone());
            let err = svc.get_token().await.unwrap_err();
            assert_eq!(err.kind, BitwardenErrorKind::ParseError, "expires_in {}", expires_in);
            assert!(store.list("organization.org-1").await.unwrap().is_empty());
        }
    }

    #[test]
    fn expiry_accepts_zero_and_normal_lifetimes() {
        let now = Utc::now();
        assert_eq!(expiry(now, 0), Some(now));
        assert_eq!(expiry(now, 60), Some(now + Duration::seconds(60)));
        assert_eq!(expiry(now, -1), None);
    }

    #[tokio::test]
    async fn unreachable_identity_endpoint_is_network_error() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut cfg = config("http://127.0.0.1:1/api/");
        cfg.timeout_secs = 2;
        let svc = service(cfg, store.clone());
        let err = svc.get_token().await.unwrap_err();
        assert_eq!(err.kind, BitwardenErrorKind::NetworkError);
        assert!(store.list("organization.org-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.organization_api_client_secret.clear();
        let svc = service(cfg, Arc::new(MemoryTokenStore::new()));
        let err = svc.get_token().await.unwrap_err();
        assert_eq!(err.kind, BitwardenErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_failed_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let svc = service(config(&server.uri()), store.clone());
        let err = svc.get_token().await.unwrap_err();
        assert_eq!(err.kind, BitwardenErrorKind::AuthFailed);
        assert_eq!(err.status, Some(401));
        assert!(err.message.contains("invalid_client"));
        assert!(store.list("organization.org-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn response_without_access_token_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "expires_in": 3600 })))
            .mount(&server)
            .await;

        let svc = service(config(&server.uri()), Arc::new(MemoryTokenStore::new()));
        let err = svc.get_token().await.unwrap_err();
        assert_eq!(err.kind, BitwardenErrorKind::ParseError);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "shared", "expires_in": 3600 }))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let svc = Arc::new(service(config(&server.uri()), Arc::new(MemoryTokenStore::new())));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.get_token().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "shared");
        }
    }
}
