//! Bitwarden integration crate: sub-modules.
//!
//! Provides:
//! - Static configuration with environment/JSON loading and an optional
//!   injected external settings source
//! - OAuth2 client-credentials token acquisition with a persistent token cache
//! - REST client for the Bitwarden Public API (groups, members, collections)
//! - REST client for the `bw serve` Vault Management API
//! - A service container wiring all of the above from one configuration

pub mod types;
pub mod settings;
pub mod http;
pub mod token_store;
pub mod token;
pub mod public_api;
pub mod vault_api;
pub mod service;

// Re-export top-level items for convenience.
pub use types::*;
pub use settings::{SettingsResolver, SettingsSource, StaticSettingsSource};
pub use token_store::{MemoryTokenStore, SqliteTokenStore, TokenStore};
pub use token::TokenService;
pub use public_api::PublicApiClient;
pub use vault_api::VaultApiClient;
pub use service::{BitwardenService, BitwardenServiceState};
