//! Bitwarden service container.
//!
//! Provides the central `BitwardenService` that wires the settings resolver,
//! token service, Public API client and Vault API client from one
//! configuration and one token store.

use crate::bitwarden::public_api::PublicApiClient;
use crate::bitwarden::settings::{SettingsResolver, SettingsSource};
use crate::bitwarden::token::TokenService;
use crate::bitwarden::token_store::{SqliteTokenStore, TokenStore};
use crate::bitwarden::types::*;
use crate::bitwarden::vault_api::VaultApiClient;
use log::info;
use std::sync::Arc;

/// Shared handle to the service.
pub type BitwardenServiceState = Arc<BitwardenService>;

/// Central Bitwarden integration service.
#[derive(Debug)]
pub struct BitwardenService {
    settings: Arc<SettingsResolver>,
    tokens: Arc<TokenService>,
    public_api: PublicApiClient,
    vault_api: VaultApiClient,
}

impl BitwardenService {
    /// Build from static configuration and a token store.
    pub fn new(config: BitwardenConfig, store: Arc<dyn TokenStore>) -> Result<Self, BitwardenError> {
        Self::from_resolver(SettingsResolver::new(config), store)
    }

    /// Build with an external settings source consulted when
    /// `use_external_settings` is on.
    pub fn with_settings_source(
        config: BitwardenConfig,
        store: Arc<dyn TokenStore>,
        source: Arc<dyn SettingsSource>,
    ) -> Result<Self, BitwardenError> {
        Self::from_resolver(SettingsResolver::with_source(config, source), store)
    }

    /// Open the SQLite token store at `config.token_database_url` and build.
    pub async fn connect(config: BitwardenConfig) -> Result<Self, BitwardenError> {
        let store = SqliteTokenStore::connect(&config.token_database_url).await?;
        Self::new(config, Arc::new(store))
    }

    fn from_resolver(resolver: SettingsResolver, store: Arc<dyn TokenStore>) -> Result<Self, BitwardenError> {
        let settings = Arc::new(resolver);
        let tokens = Arc::new(TokenService::new(settings.clone(), store)?);
        let public_api = PublicApiClient::new(settings.clone(), tokens.clone())?;
        let vault_api = VaultApiClient::new(settings.clone())?;
        info!(
            "Bitwarden service ready (external settings: {})",
            settings.should_use_external_settings()
        );
        Ok(Self { settings, tokens, public_api, vault_api })
    }

    /// Wrap in the shared state handle.
    pub fn into_state(self) -> BitwardenServiceState {
        Arc::new(self)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn config(&self) -> &BitwardenConfig {
        self.settings.config()
    }

    pub fn settings(&self) -> &SettingsResolver {
        &self.settings
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn public_api(&self) -> &PublicApiClient {
        &self.public_api
    }

    pub fn vault_api(&self) -> &VaultApiClient {
        &self.vault_api
    }
}
