//! Configuration management for the portal client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default auth backend URL (can be overridden at compile time via TIDEWATCH_AUTH_URL).
pub const DEFAULT_AUTH_URL: &str = match option_env!("TIDEWATCH_AUTH_URL") {
    Some(url) => url,
    None => "https://auth.tidewatch.app",
};

/// Default auth backend publishable key (compile-time via TIDEWATCH_AUTH_PUBLISHABLE_KEY).
const DEFAULT_AUTH_PUBLISHABLE_KEY: &str = match option_env!("TIDEWATCH_AUTH_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "tw-publishable-dev",
};

/// Default document store URL (compile-time via TIDEWATCH_DIRECTORY_URL).
pub const DEFAULT_DIRECTORY_URL: &str = match option_env!("TIDEWATCH_DIRECTORY_URL") {
    Some(url) => url,
    None => "https://directory.tidewatch.app",
};

/// Default geoportal authorize endpoint (compile-time via TIDEWATCH_PROVIDER_AUTHORIZE_URL).
pub const DEFAULT_PROVIDER_AUTHORIZE_URL: &str =
    match option_env!("TIDEWATCH_PROVIDER_AUTHORIZE_URL") {
        Some(url) => url,
        None => "https://www.geoportal.com/sharing/rest/oauth2/authorize",
    };

/// Default geoportal token endpoint.
const DEFAULT_PROVIDER_TOKEN_URL: &str = match option_env!("TIDEWATCH_PROVIDER_TOKEN_URL") {
    Some(url) => url,
    None => "https://www.geoportal.com/sharing/rest/oauth2/token",
};

/// Default geoportal self endpoint (identity + organization attributes).
const DEFAULT_PROVIDER_SELF_URL: &str = match option_env!("TIDEWATCH_PROVIDER_SELF_URL") {
    Some(url) => url,
    None => "https://www.geoportal.com/sharing/rest/portals/self",
};

/// Default geoportal OAuth client id.
pub const DEFAULT_PROVIDER_CLIENT_ID: &str = match option_env!("TIDEWATCH_PROVIDER_CLIENT_ID") {
    Some(id) => id,
    None => "tidewatchPortal",
};

/// Default loopback callback port.
pub const DEFAULT_CALLBACK_PORT: u16 = 8617;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main portal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Auth backend base URL.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Auth backend publishable API key (public, safe to expose).
    #[serde(default = "default_auth_publishable_key")]
    pub auth_publishable_key: String,
    /// Document store base URL.
    #[serde(default = "default_directory_url")]
    pub directory_url: String,
    /// Geoportal authorize endpoint.
    #[serde(default = "default_provider_authorize_url")]
    pub provider_authorize_url: String,
    /// Geoportal token endpoint.
    #[serde(default = "default_provider_token_url")]
    pub provider_token_url: String,
    /// Geoportal self endpoint.
    #[serde(default = "default_provider_self_url")]
    pub provider_self_url: String,
    /// Geoportal OAuth client id.
    #[serde(default = "default_provider_client_id")]
    pub provider_client_id: String,
    /// Loopback callback port.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_auth_publishable_key() -> String {
    DEFAULT_AUTH_PUBLISHABLE_KEY.to_string()
}

fn default_directory_url() -> String {
    DEFAULT_DIRECTORY_URL.to_string()
}

fn default_provider_authorize_url() -> String {
    DEFAULT_PROVIDER_AUTHORIZE_URL.to_string()
}

fn default_provider_token_url() -> String {
    DEFAULT_PROVIDER_TOKEN_URL.to_string()
}

fn default_provider_self_url() -> String {
    DEFAULT_PROVIDER_SELF_URL.to_string()
}

fn default_provider_client_id() -> String {
    DEFAULT_PROVIDER_CLIENT_ID.to_string()
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            auth_publishable_key: DEFAULT_AUTH_PUBLISHABLE_KEY.to_string(),
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            provider_authorize_url: DEFAULT_PROVIDER_AUTHORIZE_URL.to_string(),
            provider_token_url: DEFAULT_PROVIDER_TOKEN_URL.to_string(),
            provider_self_url: DEFAULT_PROVIDER_SELF_URL.to_string(),
            provider_client_id: DEFAULT_PROVIDER_CLIENT_ID.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    ///
    /// Backend URLs and keys are compile-time only and always use the
    /// built-in defaults regardless of what's in the config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Loading configuration file");
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.auth_url = DEFAULT_AUTH_URL.to_string();
        config.auth_publishable_key = DEFAULT_AUTH_PUBLISHABLE_KEY.to_string();
        config.directory_url = DEFAULT_DIRECTORY_URL.to_string();
        config.provider_authorize_url = DEFAULT_PROVIDER_AUTHORIZE_URL.to_string();
        config.provider_token_url = DEFAULT_PROVIDER_TOKEN_URL.to_string();
        config.provider_self_url = DEFAULT_PROVIDER_SELF_URL.to_string();
        config.provider_client_id = DEFAULT_PROVIDER_CLIENT_ID.to_string();

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables. Only the log level
    /// can be overridden at runtime; endpoints are compile-time.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("TIDEWATCH_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Get the auth backend URL as a parsed URL.
    pub fn auth_url(&self) -> CoreResult<Url> {
        Url::parse(&self.auth_url).map_err(CoreError::from)
    }

    /// Get the document store URL as a parsed URL.
    pub fn directory_url(&self) -> CoreResult<Url> {
        Url::parse(&self.directory_url).map_err(CoreError::from)
    }

    /// Get the provider authorize endpoint as a parsed URL.
    pub fn provider_authorize_url(&self) -> CoreResult<Url> {
        Url::parse(&self.provider_authorize_url).map_err(CoreError::from)
    }

    /// Loopback redirect URI handed to the provider.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.callback_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.directory_url, DEFAULT_DIRECTORY_URL);
        assert_eq!(config.callback_port, DEFAULT_CALLBACK_PORT);
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug"
        }"#;

        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.log_level = "trace".to_string();

        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.log_level, "trace");
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
    }

    #[test]
    fn test_config_endpoints_forced_on_load() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config_json = r#"{
            "log_level": "info",
            "auth_url": "https://evil.example.com",
            "provider_client_id": "spoofed"
        }"#;
        std::fs::write(paths.config_file(), config_json).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(loaded.provider_client_id, DEFAULT_PROVIDER_CLIENT_ID);
    }

    #[test]
    fn test_config_url_accessors() {
        let config = Config::default();
        let url = config.auth_url().unwrap();
        assert_eq!(url.scheme(), "https");
        assert!(config.directory_url().is_ok());
        assert!(config.provider_authorize_url().is_ok());
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.auth_url = "not a valid url".to_string();

        let result = config.auth_url();
        assert!(result.is_err());
    }

    #[test]
    fn test_redirect_uri_uses_callback_port() {
        let mut config = Config::default();
        config.callback_port = 9123;
        assert_eq!(config.redirect_uri(), "http://localhost:9123/callback");
    }
}
