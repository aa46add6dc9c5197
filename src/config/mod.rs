//! Configuration management for the JARVIS tools
//!
//! Settings come from environment variables, optionally overridden by a TOML
//! file passed with `--config`.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the JARVIS workspace
    #[serde(default = "default_jarvis_home")]
    pub jarvis_home: PathBuf,

    /// Email organizer configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// PMO dashboard data locations
    #[serde(default)]
    pub pmo: PmoConfig,

    /// Google Sheets mirror configuration
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Health assembler configuration
    #[serde(default)]
    pub health: HealthConfig,
}

/// Email organizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_imap_host")]
    pub imap_host: String,

    #[serde(default = "default_imap_port")]
    pub imap_port: u16,

    #[serde(default = "default_imap_username")]
    pub imap_username: Option<String>,

    #[serde(default = "default_imap_password", skip_serializing)]
    pub imap_password: Option<String>,

    /// Override for config/project-codes.json
    #[serde(default)]
    pub project_codes_file: Option<PathBuf>,

    /// Override for the IMAP cursor file
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    #[serde(default)]
    pub unclassified_dir: Option<PathBuf>,

    /// Base directory for per-project PMO folders
    #[serde(default)]
    pub pmo_base: Option<PathBuf>,
}

/// PMO dashboard data locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmoConfig {
    #[serde(default = "default_pmo_root")]
    pub pmo_root: PathBuf,

    #[serde(default = "default_config_root")]
    pub config_root: PathBuf,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_sync_on_startup")]
    pub sync_on_startup: bool,
}

/// Google Sheets mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default = "default_sheet_id")]
    pub sheet_id: Option<String>,

    /// Service-account JSON key file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: Option<PathBuf>,

    #[serde(default = "default_sheets_api_base")]
    pub api_base: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token; `None` disables the auth gate
    #[serde(default = "default_auth_token", skip_serializing)]
    pub auth_token: Option<String>,
}

/// Health assembler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Directory with shell-collected fragments
    #[serde(default = "default_health_dir")]
    pub fragments_dir: Option<PathBuf>,
}

/// Resolved filesystem layout of the email organizer
#[derive(Debug, Clone)]
pub struct MailPaths {
    pub project_codes_file: PathBuf,
    pub state_file: PathBuf,
    pub staging_dir: PathBuf,
    pub unclassified_dir: PathBuf,
    pub pmo_base: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jarvis_home: default_jarvis_home(),
            mail: MailConfig::default(),
            pmo: PmoConfig::default(),
            sheets: SheetsConfig::default(),
            server: ServerConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            imap_host: default_imap_host(),
            imap_port: default_imap_port(),
            imap_username: default_imap_username(),
            imap_password: default_imap_password(),
            project_codes_file: None,
            state_file: None,
            staging_dir: None,
            unclassified_dir: None,
            pmo_base: None,
        }
    }
}

impl Default for PmoConfig {
    fn default() -> Self {
        Self {
            pmo_root: default_pmo_root(),
            config_root: default_config_root(),
            db_path: default_db_path(),
            sync_on_startup: default_sync_on_startup(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            sheet_id: default_sheet_id(),
            credentials_path: default_credentials_path(),
            api_base: default_sheets_api_base(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth_token: default_auth_token(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            fragments_dir: default_health_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, falling back to environment defaults
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load(path),
            None => {
                debug!("No config file given, using environment defaults");
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Resolve the email organizer layout under `jarvis_home`
    pub fn mail_paths(&self) -> MailPaths {
        let home = &self.jarvis_home;
        let data = home.join("data").join("email-organizer");
        MailPaths {
            project_codes_file: self
                .mail
                .project_codes_file
                .clone()
                .unwrap_or_else(|| home.join("config").join("project-codes.json")),
            state_file: self
                .mail
                .state_file
                .clone()
                .unwrap_or_else(|| data.join("imap_state.json")),
            staging_dir: self
                .mail
                .staging_dir
                .clone()
                .unwrap_or_else(|| data.join("staging")),
            unclassified_dir: self
                .mail
                .unclassified_dir
                .clone()
                .unwrap_or_else(|| data.join("unclassified")),
            pmo_base: self.mail.pmo_base.clone().unwrap_or_else(|| {
                home.join("workspaces").join("strokmatic").join("pmo")
            }),
        }
    }

    /// Path of the dashboard's project registry
    pub fn pmo_project_codes_file(&self) -> PathBuf {
        self.pmo.config_root.join("project-codes.json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".to_string()));
        }

        if self.mail.imap_host.trim().is_empty() {
            return Err(Error::Config("mail.imap_host must not be empty".to_string()));
        }

        if self.sheets.api_base.trim().is_empty() {
            return Err(Error::Config("sheets.api_base must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.server.port > 0);
    }

    #[test]
    fn test_mail_paths_follow_jarvis_home() {
        let mut config = Config::default();
        config.jarvis_home = PathBuf::from("/srv/jarvis");
        config.mail.staging_dir = None;
        config.mail.pmo_base = None;

        let paths = config.mail_paths();
        assert_eq!(
            paths.state_file,
            PathBuf::from("/srv/jarvis/data/email-organizer/imap_state.json")
        );
        assert_eq!(
            paths.staging_dir,
            PathBuf::from("/srv/jarvis/data/email-organizer/staging")
        );
        assert_eq!(
            paths.pmo_base,
            PathBuf::from("/srv/jarvis/workspaces/strokmatic/pmo")
        );
    }

    #[test]
    fn test_load_toml_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jarvis.toml");
        std::fs::write(
            &path,
            r#"
jarvis_home = "/opt/jarvis"

[server]
port = 9100

[pmo]
pmo_root = "/tmp/pmo"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.jarvis_home, PathBuf::from("/opt/jarvis"));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.pmo.pmo_root, PathBuf::from("/tmp/pmo"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 8090;
        config.mail.imap_host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
