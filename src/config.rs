// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::storage::TokenStore;
use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;

fn default_redirect_uri() -> String {
    "http://127.0.0.1:53682/callback".to_string()
}

fn default_freshness_window_mins() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Base URL of the coaching REST API, e.g. "https://api.example.com".
    pub api_url: String,
    /// Base URL of the OAuth2 authorization server, e.g. "https://tenant.auth0.com".
    pub issuer_url: String,
    pub client_id: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default)]
    pub allow_insecure_certs: bool,
    #[serde(default = "default_freshness_window_mins")]
    pub freshness_window_mins: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            issuer_url: String::new(),
            client_id: String::new(),
            audience: String::new(),
            // Match the serde defaults
            redirect_uri: default_redirect_uri(),
            allow_insecure_certs: false,
            freshness_window_mins: 60,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        // Explicitly detect missing file so callers (onboarding) can behave accordingly.
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Helper to detect whether an anyhow::Error indicates that the config file was missing.
    /// Checks our explicit "Config file not found" message first, then walks the
    /// error chain looking for an underlying IO NotFound.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        TokenStore::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            TokenStore::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Get the path string using an explicit context.
    pub fn get_path_string(ctx: &dyn AppContext) -> Result<String> {
        let path = ctx.get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }

    pub fn freshness_window_ms(&self) -> i64 {
        (self.freshness_window_mins * 60 * 1000) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    #[test]
    fn test_missing_config_is_detected() {
        let ctx = TestContext::new();
        let err = Config::load(&ctx).unwrap_err();
        assert!(Config::is_missing_config_error(&err));
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let ctx = TestContext::new();
        let cfg = Config {
            api_url: "https://api.example.com".to_string(),
            issuer_url: "https://auth.example.com".to_string(),
            client_id: "client-1".to_string(),
            audience: "https://api.example.com".to_string(),
            ..Config::default()
        };
        cfg.save(&ctx).unwrap();

        let loaded = Config::load(&ctx).unwrap();
        assert_eq!(loaded.api_url, cfg.api_url);
        assert_eq!(loaded.client_id, "client-1");
        // Untouched fields come back as defaults
        assert_eq!(loaded.freshness_window_mins, 60);
        assert_eq!(loaded.request_timeout_secs, 30);
    }

    #[test]
    fn test_malformed_config_is_not_missing() {
        let ctx = TestContext::new();
        let path = ctx.get_config_file_path().unwrap();
        std::fs::write(&path, "api_url = [not toml").unwrap();
        let err = Config::load(&ctx).unwrap_err();
        assert!(!Config::is_missing_config_error(&err));
    }
}
