//! Settings resolution.
//!
//! Every string setting the clients need is read through
//! [`SettingsResolver`], which prefers an injected [`SettingsSource`] over the
//! static [`BitwardenConfig`] when `use_external_settings` is on.

use crate::bitwarden::types::*;
use std::sync::Arc;

const ORGANIZATION_PREFIX: &str = "organization.";

/// An externally managed settings provider (e.g. a settings row owned by
/// another application).
pub trait SettingsSource: Send + Sync {
    /// The current settings, or `None` when nothing is stored yet.
    fn current(&self) -> Option<ExternalSettings>;
}

impl<F> SettingsSource for F
where
    F: Fn() -> Option<ExternalSettings> + Send + Sync,
{
    fn current(&self) -> Option<ExternalSettings> {
        self()
    }
}

/// A fixed set of external settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSettingsSource(pub ExternalSettings);

impl SettingsSource for StaticSettingsSource {
    fn current(&self) -> Option<ExternalSettings> {
        Some(self.0.clone())
    }
}

/// Resolves settings from an external source or the static config.
#[derive(Clone)]
pub struct SettingsResolver {
    config: BitwardenConfig,
    source: Option<Arc<dyn SettingsSource>>,
}

impl std::fmt::Debug for SettingsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsResolver")
            .field("use_external_settings", &self.config.use_external_settings)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl SettingsResolver {
    /// Resolver backed by static configuration only.
    pub fn new(config: BitwardenConfig) -> Self {
        Self { config, source: None }
    }

    /// Resolver that consults `source` when external settings are enabled.
    pub fn with_source(config: BitwardenConfig, source: Arc<dyn SettingsSource>) -> Self {
        Self { config, source: Some(source) }
    }

    /// The static configuration.
    pub fn config(&self) -> &BitwardenConfig {
        &self.config
    }

    pub fn should_use_external_settings(&self) -> bool {
        self.config.use_external_settings
    }

    fn external(&self) -> Option<ExternalSettings> {
        if !self.should_use_external_settings() {
            return None;
        }
        self.source.as_ref()?.current()
    }

    fn resolve<F>(&self, pick: F, fallback: &str) -> String
    where
        F: FnOnce(ExternalSettings) -> Option<String>,
    {
        match self.external() {
            Some(settings) => pick(settings).unwrap_or_default(),
            None => fallback.to_string(),
        }
    }

    pub fn api_url(&self) -> String {
        self.resolve(|s| s.api_url, &self.config.api_url)
    }

    pub fn organization_api_token(&self) -> String {
        self.resolve(|s| s.organization_api_token, &self.config.organization_api_token)
    }

    pub fn vault_api_url(&self) -> String {
        self.resolve(|s| s.vault_api_url, &self.config.vault_api_url)
    }

    pub fn client_id(&self) -> String {
        self.resolve(|s| s.organization_api_client_id, &self.config.organization_api_client_id)
    }

    pub fn client_secret(&self) -> String {
        self.resolve(
            |s| s.organization_api_client_secret,
            &self.config.organization_api_client_secret,
        )
    }

    /// Organization id derived from the client id (`organization.<id>`).
    pub fn organization_id(&self) -> String {
        let client_id = self.client_id();
        match client_id.strip_prefix(ORGANIZATION_PREFIX) {
            Some(id) => id.to_string(),
            None => client_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BitwardenConfig {
        BitwardenConfig {
            api_url: "https://static.example.com/api/".into(),
            organization_api_client_id: "organization.static-org".into(),
            organization_api_client_secret: "static-secret".into(),
            vault_api_url: "http://static:8087".into(),
            ..Default::default()
        }
    }

    fn external() -> ExternalSettings {
        ExternalSettings {
            api_url: Some("https://external.example.com/api/".into()),
            organization_api_token: Some("ext-token".into()),
            vault_api_url: None,
            organization_api_client_id: Some("organization.ext-org".into()),
            organization_api_client_secret: Some("ext-secret".into()),
        }
    }

    #[test]
    fn static_config_when_flag_off() {
        let resolver = SettingsResolver::with_source(config(), Arc::new(StaticSettingsSource(external())));
        assert!(!resolver.should_use_external_settings());
        assert_eq!(resolver.api_url(), "https://static.example.com/api/");
        assert_eq!(resolver.client_id(), "organization.static-org");
    }

    #[test]
    fn external_settings_take_precedence_when_enabled() {
        let mut cfg = config();
        cfg.use_external_settings = true;
        let resolver = SettingsResolver::with_source(cfg, Arc::new(StaticSettingsSource(external())));
        assert_eq!(resolver.api_url(), "https://external.example.com/api/");
        assert_eq!(resolver.organization_api_token(), "ext-token");
        assert_eq!(resolver.client_id(), "organization.ext-org");
        assert_eq!(resolver.client_secret(), "ext-secret");
    }

    #[test]
    fn missing_external_value_resolves_empty() {
        let mut cfg = config();
        cfg.use_external_settings = true;
        let resolver = SettingsResolver::with_source(cfg, Arc::new(StaticSettingsSource(external())));
        assert_eq!(resolver.vault_api_url(), "");
    }

    #[test]
    fn falls_back_when_source_has_nothing() {
        let mut cfg = config();
        cfg.use_external_settings = true;
        let resolver = SettingsResolver::with_source(cfg, Arc::new(|| None::<ExternalSettings>));
        assert_eq!(resolver.api_url(), "https://static.example.com/api/");
        assert_eq!(resolver.vault_api_url(), "http://static:8087");
    }

    #[test]
    fn falls_back_without_source() {
        let mut cfg = config();
        cfg.use_external_settings = true;
        let resolver = SettingsResolver::new(cfg);
        assert_eq!(resolver.client_secret(), "static-secret");
    }

    #[test]
    fn organization_id_strips_prefix() {
        let resolver = SettingsResolver::new(config());
        assert_eq!(resolver.organization_id(), "static-org");

        let mut cfg = config();
        cfg.organization_api_client_id = "plain-id".into();
        assert_eq!(SettingsResolver::new(cfg).organization_id(), "plain-id");
    }
}
