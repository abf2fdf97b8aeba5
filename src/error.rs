//! Error types for the Workspace MCP Server
//!
//! This module defines the error hierarchy for all operations in the server.

use thiserror::Error;

/// Main error type for the Workspace MCP Server
#[derive(Error, Debug)]
pub enum WorkspaceMcpError {
    /// Authentication and credential errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Google API errors
    #[error("Google API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Authentication and credential errors
///
/// Each variant maps to a distinct user-facing message so the tool layer
/// never collapses different failure kinds into a generic one.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OAuth keys file not found: {path}. Place gcp-oauth.keys.json there or set WORKSPACE_MCP_OAUTH_PATH")]
    KeysFileNotFound { path: String },

    #[error("Invalid OAuth keys format: expected 'installed' or 'web' credentials")]
    InvalidKeysFormat,

    /// Persistence layer unavailable or corrupt. Fatal to the current
    /// operation and surfaced verbatim.
    #[error("Credential storage error: {message}")]
    Storage { message: String },

    /// The credential cannot be refreshed; the user has to re-run the
    /// interactive flow. A normal resolver outcome, not an exception path.
    #[error("Authorization required: run the start_google_auth tool to authorize this account")]
    ReauthRequired,

    /// Transient network or provider failure during a refresh exchange.
    /// The resolver retries this at most once before surfacing it.
    #[error("Failed to refresh access token: {message}")]
    Refresh { message: String },

    /// Bad, expired, or already-used state token or redirect URL.
    #[error("Invalid authorization flow: {reason}. Restart authorization with start_google_auth; your link expired or was already used")]
    InvalidFlow { reason: String },

    /// The provider rejected the authorization code.
    #[error("Token exchange failed: {message}. Restart authorization with start_google_auth")]
    Exchange { message: String },
}

/// Google API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("API request failed: {message}")]
    RequestFailed { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },
}

/// Configuration errors
#[derive(Error, Debug)]
#[allow(dead_code)] // Some variants reserved for future use
pub enum ConfigError {
    #[error("Config directory not found: {path}")]
    DirNotFound { path: String },

    #[error("Failed to create config directory: {path}")]
    DirCreationFailed { path: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
#[allow(dead_code)] // Some variants reserved for future use
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid tool arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },
}

/// Result type alias for Workspace MCP operations
pub type Result<T> = std::result::Result<T, WorkspaceMcpError>;
