//! Client for the Vault Management API served by `bw serve`.
//!
//! The API is unauthenticated and local. Organization-scoped calls default
//! their organization id to the configured client id without its
//! `organization.` prefix.

use crate::bitwarden::http::{endpoint_url, to_body, ApiTransport};
use crate::bitwarden::settings::SettingsResolver;
use crate::bitwarden::types::*;
use log::info;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

// ── Vault Management API (bw serve) ────────────────────────────────

/// Client for `bw serve`.
#[derive(Debug, Clone)]
pub struct VaultApiClient {
    settings: Arc<SettingsResolver>,
    transport: ApiTransport,
}

impl VaultApiClient {
    pub fn new(settings: Arc<SettingsResolver>) -> Result<Self, BitwardenError> {
        let transport = ApiTransport::new("Vault API", settings.config().timeout_secs)?;
        Ok(Self { settings, transport })
    }

    /// Resolved base URL with a trailing `/`.
    pub fn base_url(&self) -> Result<String, BitwardenError> {
        let url = self.settings.vault_api_url();
        if url.trim().is_empty() {
            return Err(BitwardenError::invalid_config("Bitwarden vault API URL is not configured"));
        }
        Ok(format!("{}/", url.trim_end_matches('/')))
    }

    fn org_id(&self, org_id: Option<&str>) -> String {
        match org_id {
            Some(id) => id.to_string(),
            None => self.settings.organization_id(),
        }
    }

    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, BitwardenError> {
        let url = endpoint_url(&self.base_url()?, segments)?;
        self.transport.send(method, &url, None, query, body).await
    }

    // ── Collections ─────────────────────────────────────────────────

    /// Serialize `body` and stamp it with `organizationId`.
    fn org_body<B: Serialize + ?Sized>(body: &B, org_id: &str) -> Result<Value, BitwardenError> {
        let mut value = to_body(body)?;
        match value.as_object_mut() {
            Some(map) => {
                map.insert("organizationId".into(), Value::String(org_id.to_string()));
                Ok(value)
            }
            None => Err(BitwardenError::invalid_input("Collection body must be a JSON object")),
        }
    }

    pub async fn create_collection<B: Serialize + ?Sized>(
        &self,
        body: &B,
        org_id: Option<&str>,
    ) -> Result<Value, BitwardenError> {
        let org_id = self.org_id(org_id);
        let body = Self::org_body(body, &org_id)?;
        let created = self
            .request(Method::POST, &["object", "org-collection"], &[("organizationid", org_id.as_str())], Some(&body))
            .await?;
        info!("Created vault collection in organization {}", org_id);
        Ok(created)
    }

    pub async fn update_collection<B: Serialize + ?Sized>(
        &self,
        collection_id: &str,
        body: &B,
        org_id: Option<&str>,
    ) -> Result<Value, BitwardenError> {
        let org_id = self.org_id(org_id);
        let body = Self::org_body(body, &org_id)?;
        self.request(
            Method::PUT,
            &["object", "org-collection", collection_id],
            &[("organizationid", org_id.as_str())],
            Some(&body),
        )
        .await
    }

    pub async fn get_collection(&self, collection_id: &str, org_id: Option<&str>) -> Result<Value, BitwardenError> {
        let org_id = self.org_id(org_id);
        self.request(
            Method::GET,
            &["object", "org-collection", collection_id],
            &[("organizationId", org_id.as_str())],
            None,
        )
        .await
    }

    pub async fn delete_collection(&self, collection_id: &str, org_id: Option<&str>) -> Result<(), BitwardenError> {
        let org_id = self.org_id(org_id);
        self.request(
            Method::DELETE,
            &["object", "org-collection", collection_id],
            &[("organizationId", org_id.as_str())],
            None,
        )
        .await?;
        info!("Deleted vault collection {}", collection_id);
        Ok(())
    }

    pub async fn list_org_collections(&self, org_id: Option<&str>) -> Result<Value, BitwardenError> {
        let org_id = self.org_id(org_id);
        self.request(Method::GET, &["list", "object", "org-collections"], &[("organizationId", org_id.as_str())], None)
            .await
    }

    /// Collections visible to the unlocked vault, across organizations.
    pub async fn list_collections(&self) -> Result<Value, BitwardenError> {
        self.request(Method::GET, &["list", "object", "collections"], &[], None).await
    }

    // ── Members ─────────────────────────────────────────────────────

    pub async fn list_members(&self, org_id: Option<&str>) -> Result<Value, BitwardenError> {
        let org_id = self.org_id(org_id);
        self.request(Method::GET, &["list", "object", "org-members"], &[("organizationId", org_id.as_str())], None)
            .await
    }

    /// Confirm an accepted member.
    pub async fn confirm_member(&self, member_id: &str, org_id: Option<&str>) -> Result<Value, BitwardenError> {
        let org_id = self.org_id(org_id);
        let body = json!({ "organizationId": &org_id });
        let response = self
            .request(Method::POST, &["confirm", "org-member", member_id], &[], Some(&body))
            .await?;
        info!("Confirmed member {} in organization {}", member_id, org_id);
        Ok(response)
    }

    // ── Status / Sync / Lock ────────────────────────────────────────

    pub async fn status(&self) -> Result<Value, BitwardenError> {
        self.request(Method::GET, &["status"], &[], None).await
    }

    pub async fn sync(&self) -> Result<Value, BitwardenError> {
        self.request(Method::POST, &["sync"], &[], None).await
    }

    pub async fn lock(&self) -> Result<Value, BitwardenError> {
        self.request(Method::POST, &["lock"], &[], None).await
    }

    /// Unlock with `password`, or the configured vault password when `None`.
    pub async fn unlock(&self, password: Option<&str>) -> Result<Value, BitwardenError> {
        let password = match password {
            Some(p) => p.to_string(),
            None => self.settings.config().vault_password.clone(),
        };
        if password.is_empty() {
            return Err(BitwardenError::invalid_config("Bitwarden vault password is not configured"));
        }
        let response = self
            .request(Method::POST, &["unlock"], &[], Some(&json!({ "password": password })))
            .await?;
        info!("Vault unlocked");
        Ok(response)
    }
}
