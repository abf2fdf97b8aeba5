//! Configuration management for the Workspace MCP Server
//!
//! Handles paths, environment variables, endpoint constants, and scopes.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result, WorkspaceMcpError};

/// Google OAuth authorization endpoint
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth token endpoint (code exchange and refresh exchange)
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Timeout applied to every token-endpoint call so a stuck exchange
/// cannot hang a tool invocation indefinitely
pub const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for the Workspace MCP Server
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for storing configuration files
    pub config_dir: PathBuf,

    /// Path to OAuth keys file (client credentials)
    pub oauth_keys_path: PathBuf,

    /// Path to stored credentials (access/refresh tokens per identity)
    pub credentials_path: PathBuf,

    /// Path to the clasp CLI session file
    pub clasprc_path: PathBuf,

    /// Redirect URI for the copy/paste authorization flow
    pub redirect_uri: String,

    /// Port for the interactive OAuth callback server
    pub oauth_callback_port: u16,

    /// Requested Workspace scopes
    pub scopes: Vec<String>,
}

impl Config {
    /// Create a new configuration with default paths
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;

        let oauth_keys_path = std::env::var("WORKSPACE_MCP_OAUTH_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("gcp-oauth.keys.json"));

        let credentials_path = std::env::var("WORKSPACE_MCP_CREDENTIALS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("credentials.json"));

        let clasprc_path = std::env::var("WORKSPACE_MCP_CLASPRC_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".clasprc.json")
            });

        let oauth_callback_port = std::env::var("WORKSPACE_MCP_OAUTH_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Ok(Self {
            config_dir,
            oauth_keys_path,
            credentials_path,
            clasprc_path,
            // The redirect target never serves a page; the user copies the
            // resulting URL from the address bar into complete_google_auth.
            redirect_uri: "http://localhost".to_string(),
            oauth_callback_port,
            scopes: default_scopes(),
        })
    }

    /// Get the configuration directory, creating it if necessary
    fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| {
                WorkspaceMcpError::Config(ConfigError::DirNotFound {
                    path: "~".to_string(),
                })
            })?
            .join(".workspace-mcp");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|_| {
                WorkspaceMcpError::Config(ConfigError::DirCreationFailed {
                    path: config_dir.display().to_string(),
                })
            })?;
        }

        Ok(config_dir)
    }

    /// Check if the OAuth keys file exists
    pub fn oauth_keys_exist(&self) -> bool {
        self.oauth_keys_path.exists()
    }

    /// Redirect URI for the interactive callback server
    pub fn callback_redirect_uri(&self) -> String {
        format!("http://localhost:{}/oauth2callback", self.oauth_callback_port)
    }
}

/// Scopes requested during authorization.
///
/// `openid` and `userinfo.email` are included so the token response carries
/// an ID token naming the authorized account.
fn default_scopes() -> Vec<String> {
    [
        "openid",
        "https://www.googleapis.com/auth/userinfo.email",
        "https://www.googleapis.com/auth/gmail.modify",
        "https://www.googleapis.com/auth/drive",
        "https://www.googleapis.com/auth/spreadsheets",
        "https://www.googleapis.com/auth/calendar",
        "https://www.googleapis.com/auth/documents",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Google API base URLs
pub mod endpoints {
    /// Gmail API
    pub const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

    /// Drive API
    pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

    /// Sheets API
    pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

    /// Calendar API
    pub const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

    /// Docs API
    pub const DOCS_BASE_URL: &str = "https://docs.googleapis.com/v1";

    /// User ID for the authenticated user in Gmail API paths
    pub const USER_ID: &str = "me";
}
