// Connection settings for the management API: the tenant base URL and
// the API token. Loaded from the environment first, then from a JSON file
// in the user's config directory.

use crate::error::{ApiError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const TENANT_ENV: &str = "KST_TENANT";
pub const TOKEN_ENV: &str = "KST_TOKEN";

/// Tenant URL and bearer token used to open an `ApiClient`.
#[derive(Clone)]
pub struct ApiConfig {
    pub tenant_url: Url,
    pub api_token: String,
}

/// On-disk shape of the config file.
#[derive(Serialize, Deserialize)]
struct ConfigFile {
    tenant_url: String,
    api_token: String,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("tenant_url", &self.tenant_url.as_str())
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl ApiConfig {
    /// Build a config, checking that the URL is absolute http(s) and the
    /// token is not blank.
    pub fn new(tenant_url: &str, api_token: &str) -> Result<Self> {
        let tenant_url = Url::parse(tenant_url.trim())
            .map_err(|e| ApiError::Config(format!("invalid tenant URL {tenant_url:?}: {e}")))?;
        let config = ApiConfig {
            tenant_url,
            api_token: api_token.trim().to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.tenant_url.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "tenant URL must use http or https, got {}",
                self.tenant_url.scheme()
            )));
        }
        if self.api_token.is_empty() {
            return Err(ApiError::Config("API token must not be empty".into()));
        }
        Ok(())
    }

    /// Read `KST_TENANT` and `KST_TOKEN`. If either is unset, fall back
    /// to the config file returned by [`config_file_path`].
    pub fn from_env() -> Result<Self> {
        match (std::env::var(TENANT_ENV), std::env::var(TOKEN_ENV)) {
            (Ok(url), Ok(token)) => ApiConfig::new(&url, &token),
            _ => {
                let path = config_file_path().ok_or_else(|| {
                    ApiError::Config("could not determine config directory".into())
                })?;
                if !path.is_file() {
                    return Err(ApiError::Config(format!(
                        "set {TENANT_ENV} and {TOKEN_ENV} or create {}",
                        path.display()
                    )));
                }
                ApiConfig::load(&path)
            }
        }
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&contents)
            .map_err(|e| ApiError::Config(format!("{}: {e}", path.display())))?;
        ApiConfig::new(&file.tenant_url, &file.api_token)
    }

    /// Save as pretty JSON, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ConfigFile {
            tenant_url: self.tenant_url.to_string(),
            api_token: self.api_token.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)
            .map_err(|e| ApiError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// `~/.config/kst/config.json` on Linux, the platform equivalent elsewhere.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kst").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_https_tenant() {
        let config = ApiConfig::new("https://acme.api.kandji.io", "token").unwrap();
        assert_eq!(config.tenant_url.host_str(), Some("acme.api.kandji.io"));
        assert_eq!(config.api_token, "token");
    }

    #[test]
    fn new_rejects_bad_url_and_blank_token() {
        assert!(matches!(ApiConfig::new("not a url", "token"), Err(ApiError::Config(_))));
        assert!(matches!(ApiConfig::new("ftp://acme.example", "token"), Err(ApiError::Config(_))));
        assert!(matches!(ApiConfig::new("https://acme.example", "   "), Err(ApiError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = ApiConfig::new("https://acme.example", "secret").unwrap();
        config.save(&path).unwrap();

        let loaded = ApiConfig::load(&path).unwrap();
        assert_eq!(loaded.tenant_url, config.tenant_url);
        assert_eq!(loaded.api_token, "secret");
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tenant_url": "https://acme.example"}"#).unwrap();
        assert!(matches!(ApiConfig::load(&path), Err(ApiError::Config(_))));
    }

    #[test]
    fn debug_redacts_token() {
        let config = ApiConfig::new("https://acme.example", "secret").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
    }
}
