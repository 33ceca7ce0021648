use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.shellycloud.com/apiv2";

const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load `config.toml` from the config directory, falling back to defaults
    /// when the file does not exist.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Default location of the per-user config directory (`~/.shelly`).
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shelly")
}

/// Email and API token persisted after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub token: String,
}

impl Credentials {
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(CREDENTIALS_FILE)
    }

    /// Returns `None` when the user never logged in.
    pub fn load(config_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(config_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials: {}", path.display()))?;
        let credentials = toml::from_str(&content)
            .with_context(|| format!("Failed to parse credentials: {}", path.display()))?;
        Ok(Some(credentials))
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;

        let path = Self::path(config_dir);
        let content = toml::to_string(self).context("Failed to serialize credentials")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write credentials: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %path.display(), "Saved credentials");
        Ok(())
    }

    /// Remove stored credentials. Returns whether a file was deleted.
    pub fn delete(config_dir: &Path) -> Result<bool> {
        let path = Self::path(config_dir);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove credentials: {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
[api]
url = "https://api.example.com"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.api.url, "https://api.example.com");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[api\nurl=").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_credentials_lifecycle() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".shelly");

        assert_eq!(Credentials::load(&config_dir).unwrap(), None);

        let credentials = Credentials {
            email: "bob@example.com".to_string(),
            token: "abc".to_string(),
        };
        credentials.save(&config_dir).unwrap();
        assert_eq!(
            Credentials::load(&config_dir).unwrap(),
            Some(credentials.clone())
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(Credentials::path(&config_dir))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(Credentials::delete(&config_dir).unwrap());
        assert!(!Credentials::delete(&config_dir).unwrap());
    }
}
