//! Core types for the Bitwarden integration.
//!
//! Defines the error type, the static configuration (with environment and
//! JSON loading), the persisted access-token record, and the request bodies
//! accepted by the Public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ── Error types ─────────────────────────────────────────────────────

/// Bitwarden-specific error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitwardenErrorKind {
    /// Required configuration is missing (credentials, URLs, vault password).
    InvalidConfig,
    /// A caller-supplied value has the wrong shape.
    InvalidInput,
    /// The identity endpoint rejected the token request.
    AuthFailed,
    /// A Public API or Vault API call returned a non-success status.
    ApiError,
    /// A network or HTTP transport error.
    NetworkError,
    /// JSON parsing or serialization failure.
    ParseError,
    /// The token store failed.
    StorageError,
}

/// A Bitwarden integration error.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct BitwardenError {
    pub kind: BitwardenErrorKind,
    pub message: String,
    /// HTTP status of the failed response, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<sqlx::Error> for BitwardenError {
    fn from(e: sqlx::Error) -> Self {
        BitwardenError::storage(format!("Token store error: {}", e))
    }
}

impl BitwardenError {
    fn new(kind: BitwardenErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into(), status: None }
    }
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(BitwardenErrorKind::InvalidConfig, msg)
    }
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(BitwardenErrorKind::InvalidInput, msg)
    }
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(BitwardenErrorKind::AuthFailed, msg)
    }
    pub fn api(msg: impl Into<String>) -> Self {
        Self::new(BitwardenErrorKind::ApiError, msg)
    }
    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(BitwardenErrorKind::NetworkError, msg)
    }
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(BitwardenErrorKind::ParseError, msg)
    }
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(BitwardenErrorKind::StorageError, msg)
    }

    /// Attach the HTTP status of the response that caused this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Body shape sent by `update_group_users`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupUsersBody {
    /// `["id1", "id2"]`
    #[default]
    Array,
    /// `{"userIds": ["id1", "id2"]}`
    Object,
}

impl FromStr for GroupUsersBody {
    type Err = BitwardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            other => Err(BitwardenError::invalid_config(format!(
                "Unknown group users body shape '{}' (expected 'array' or 'object')",
                other
            ))),
        }
    }
}

impl fmt::Display for GroupUsersBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Configuration for connecting to Bitwarden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitwardenConfig {
    /// Server API URL; the Public API lives under `{api_url}public/`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Static organization API token (only surfaced through the resolver).
    #[serde(default)]
    pub organization_api_token: String,

    /// OAuth2 client id, usually `organization.<uuid>`.
    #[serde(default)]
    pub organization_api_client_id: String,

    /// OAuth2 client secret.
    #[serde(default)]
    pub organization_api_client_secret: String,

    #[serde(default = "default_scope")]
    pub organization_api_scope: String,

    #[serde(default = "default_grant_type")]
    pub organization_api_grant_type: String,

    /// Device identifier sent with token requests. Empty means a fresh
    /// random UUID per request.
    #[serde(default)]
    pub organization_api_device_identifier: String,

    #[serde(default = "default_device_name")]
    pub organization_api_device_name: String,

    #[serde(default = "default_device_type")]
    pub organization_api_device_type: i64,

    /// Base URL of the `bw serve` Vault Management API.
    #[serde(default)]
    pub vault_api_url: String,

    /// Master password used by `unlock` when none is passed.
    #[serde(default)]
    pub vault_password: String,

    /// Prefer values from an injected external settings source.
    #[serde(default)]
    pub use_external_settings: bool,

    /// SQLx connection URL of the token cache database.
    #[serde(default = "default_token_database_url")]
    pub token_database_url: String,

    /// Timeout in seconds for every HTTP request.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub group_users_body: GroupUsersBody,
}

fn default_api_url() -> String { "https://vault.bitwarden.com/api/".into() }
fn default_scope() -> String { "api.organization".into() }
fn default_grant_type() -> String { "client_credentials".into() }
fn default_device_name() -> String { "Public API Client".into() }
fn default_device_type() -> i64 { 14 }
fn default_token_database_url() -> String { "sqlite://bitwarden_tokens.db?mode=rwc".into() }
fn default_timeout() -> u64 { 30 }

impl Default for BitwardenConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            organization_api_token: String::new(),
            organization_api_client_id: String::new(),
            organization_api_client_secret: String::new(),
            organization_api_scope: default_scope(),
            organization_api_grant_type: default_grant_type(),
            organization_api_device_identifier: String::new(),
            organization_api_device_name: default_device_name(),
            organization_api_device_type: default_device_type(),
            vault_api_url: String::new(),
            vault_password: String::new(),
            use_external_settings: false,
            token_database_url: default_token_database_url(),
            timeout_secs: default_timeout(),
            group_users_body: GroupUsersBody::default(),
        }
    }
}

impl BitwardenConfig {
    /// Load from `BITWARDEN_*` environment variables, defaulting every
    /// variable that is unset.
    pub fn from_env() -> Result<Self, BitwardenError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup using the environment variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BitwardenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        let device_type = match lookup("BITWARDEN_ORGANIZATION_API_DEVICE_TYPE") {
            Some(v) => v.trim().parse().map_err(|_| {
                BitwardenError::invalid_config(format!("Invalid BITWARDEN_ORGANIZATION_API_DEVICE_TYPE: {}", v))
            })?,
            None => defaults.organization_api_device_type,
        };
        let timeout_secs = match lookup("BITWARDEN_HTTP_TIMEOUT_SECS") {
            Some(v) => v.trim().parse().map_err(|_| {
                BitwardenError::invalid_config(format!("Invalid BITWARDEN_HTTP_TIMEOUT_SECS: {}", v))
            })?,
            None => defaults.timeout_secs,
        };
        let use_external_settings = match lookup("BITWARDEN_USE_EXTERNAL_SETTINGS") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                BitwardenError::invalid_config(format!("Invalid BITWARDEN_USE_EXTERNAL_SETTINGS: {}", v))
            })?,
            None => defaults.use_external_settings,
        };
        let group_users_body = match lookup("BITWARDEN_GROUP_USERS_BODY") {
            Some(v) => v.parse()?,
            None => defaults.group_users_body,
        };

        Ok(Self {
            api_url: string("BITWARDEN_API_URL", defaults.api_url),
            organization_api_token: string("BITWARDEN_ORGANIZATION_API_TOKEN", defaults.organization_api_token),
            organization_api_client_id: string("BITWARDEN_ORGANIZATION_API_CLIENT_ID", defaults.organization_api_client_id),
            organization_api_client_secret: string(
                "BITWARDEN_ORGANIZATION_API_CLIENT_SECRET",
                defaults.organization_api_client_secret,
            ),
            organization_api_scope: string("BITWARDEN_ORGANIZATION_API_SCOPE", defaults.organization_api_scope),
            organization_api_grant_type: string(
                "BITWARDEN_ORGANIZATION_API_GRANT_TYPE",
                defaults.organization_api_grant_type,
            ),
            organization_api_device_identifier: string(
                "BITWARDEN_ORGANIZATION_API_DEVICE_IDENTIFIER",
                defaults.organization_api_device_identifier,
            ),
            organization_api_device_name: string(
                "BITWARDEN_ORGANIZATION_API_DEVICE_NAME",
                defaults.organization_api_device_name,
            ),
            organization_api_device_type: device_type,
            vault_api_url: string("BITWARDEN_VAULT_API_URL", defaults.vault_api_url),
            vault_password: string("BITWARDEN_VAULT_API_PASSWORD", defaults.vault_password),
            use_external_settings,
            token_database_url: string("BITWARDEN_TOKEN_DATABASE_URL", defaults.token_database_url),
            timeout_secs,
            group_users_body,
        })
    }

    /// Load from a JSON file with camelCase keys. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BitwardenError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BitwardenError::invalid_config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| BitwardenError::parse(format!("Config parse error in {}: {}", path.display(), e)))
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Values provided by an external settings source. Absent values resolve to
/// the empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSettings {
    pub api_url: Option<String>,
    pub organization_api_token: Option<String>,
    pub vault_api_url: Option<String>,
    pub organization_api_client_id: Option<String>,
    pub organization_api_client_secret: Option<String>,
}

// ── Access tokens ───────────────────────────────────────────────────

/// Token response from the Bitwarden identity server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerToken {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A persisted access token row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRecord {
    pub id: i64,
    pub client_id: String,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub device_identifier: String,
    pub device_name: String,
    pub device_type: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessTokenRecord {
    /// Whether the token is still usable at `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Fields of a token row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewAccessToken {
    pub client_id: String,
    pub access_token: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub device_identifier: String,
    pub device_name: String,
    pub device_type: i64,
    pub created_at: DateTime<Utc>,
}

// ── Public API request bodies ───────────────────────────────────────

/// Collection access entry used by groups, members and collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionAccess {
    pub id: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_passwords: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manage: Option<bool>,
}

/// Body for creating or updating a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub collections: Vec<CollectionAccess>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

/// Organization member role as encoded by the Public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OrgUserType {
    Owner = 0,
    Admin = 1,
    User = 2,
    Manager = 3,
    Custom = 4,
}

impl From<OrgUserType> for u8 {
    fn from(t: OrgUserType) -> u8 {
        t as u8
    }
}

impl TryFrom<u8> for OrgUserType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Owner),
            1 => Ok(Self::Admin),
            2 => Ok(Self::User),
            3 => Ok(Self::Manager),
            4 => Ok(Self::Custom),
            other => Err(format!("unknown member type {}", other)),
        }
    }
}

/// Body for inviting one or more members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteMembersRequest {
    pub emails: Vec<String>,
    #[serde(rename = "type")]
    pub member_type: OrgUserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_all: Option<bool>,
    #[serde(default)]
    pub collections: Vec<CollectionAccess>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Body for updating a member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdateRequest {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<OrgUserType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<CollectionAccess>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

/// Body for creating or updating a collection (Public API and Vault API).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<CollectionAccess>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<CollectionAccess>,
}
