//! Default values for configuration
//!
//! Every default consults its environment variable first so that the tools
//! behave the same whether or not a config file is present.

use std::path::PathBuf;

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Default JARVIS home directory (~/JARVIS)
pub fn default_jarvis_home() -> PathBuf {
    env_nonempty("JARVIS_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("JARVIS")
        })
}

/// Default IMAP host
pub fn default_imap_host() -> String {
    env_nonempty("IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".to_string())
}

/// Default IMAP port (implicit TLS)
pub fn default_imap_port() -> u16 {
    env_nonempty("IMAP_PORT")
        .and_then(|p| p.parse().ok())
        .unwrap_or(993)
}

pub fn default_imap_username() -> Option<String> {
    env_nonempty("IMAP_USERNAME")
}

pub fn default_imap_password() -> Option<String> {
    env_nonempty("IMAP_PASSWORD")
}

/// Default PMO data root served by the dashboard
pub fn default_pmo_root() -> PathBuf {
    PathBuf::from(env_nonempty("PMO_ROOT").unwrap_or_else(|| "/data/pmo".to_string()))
}

/// Default directory holding project-codes.json for the dashboard
pub fn default_config_root() -> PathBuf {
    PathBuf::from(env_nonempty("CONFIG_ROOT").unwrap_or_else(|| "/data/config".to_string()))
}

/// Default SQLite database path
pub fn default_db_path() -> PathBuf {
    PathBuf::from(env_nonempty("DB_PATH").unwrap_or_else(|| "/data/db/pmo.db".to_string()))
}

/// Default bearer token (unset disables auth)
pub fn default_auth_token() -> Option<String> {
    env_nonempty("AUTH_TOKEN")
}

pub fn default_sheet_id() -> Option<String> {
    env_nonempty("GOOGLE_SHEET_ID")
}

pub fn default_credentials_path() -> Option<PathBuf> {
    env_nonempty("GOOGLE_CREDENTIALS_PATH").map(PathBuf::from)
}

/// Default Sheets API endpoint
pub fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4/spreadsheets".to_string()
}

/// Default HTTP bind host
pub fn default_host() -> String {
    env_nonempty("HOST").unwrap_or_else(|| "0.0.0.0".to_string())
}

/// Default HTTP port
pub fn default_port() -> u16 {
    env_nonempty("PORT")
        .and_then(|p| p.parse().ok())
        .unwrap_or(8090)
}

/// Default: run filesystem sync when the server starts
pub fn default_sync_on_startup() -> bool {
    true
}

/// Default health fragment directory (TMPD)
pub fn default_health_dir() -> Option<PathBuf> {
    env_nonempty("TMPD").map(PathBuf::from)
}
