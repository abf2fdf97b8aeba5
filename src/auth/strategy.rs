//! Authentication strategies and OAuth client credentials.
//!
//! Three strategies share one capability set (build an authorization
//! request, exchange a code, refresh tokens) with different protocol
//! details: OAuth 2.1 adds a PKCE verifier and drops the client secret;
//! clasp delegation wraps an externally managed CLI session and skips the
//! browser handshake entirely.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// How a credential was (or will be) obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStrategy {
    /// Delegation to the local clasp CLI session; no browser handshake
    #[serde(rename = "clasp")]
    ClaspSession,

    /// OAuth 2.0 authorization code flow (confidential client)
    #[serde(rename = "oauth2")]
    OAuth2,

    /// OAuth 2.1 authorization code flow with PKCE (public client)
    #[serde(rename = "oauth21")]
    OAuth21,
}

impl AuthStrategy {
    /// Whether the authorization request and code exchange carry a PKCE
    /// verifier/challenge pair.
    pub fn requires_pkce(&self) -> bool {
        matches!(self, AuthStrategy::OAuth21)
    }

    /// Whether token-endpoint calls include the client secret.
    /// OAuth 2.1 treats the client as public and relies on PKCE instead.
    pub fn sends_client_secret(&self) -> bool {
        !matches!(self, AuthStrategy::OAuth21)
    }

    /// Parse a strategy name as accepted by the auth tools.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "clasp" => Some(AuthStrategy::ClaspSession),
            "oauth2" | "oauth2.0" => Some(AuthStrategy::OAuth2),
            "oauth21" | "oauth2.1" => Some(AuthStrategy::OAuth21),
            _ => None,
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::ClaspSession => write!(f, "clasp"),
            AuthStrategy::OAuth2 => write!(f, "oauth2"),
            AuthStrategy::OAuth21 => write!(f, "oauth2.1"),
        }
    }
}

/// OAuth client credentials loaded from the keys file
#[derive(Debug, Clone, Deserialize)]
pub struct ClientKeys {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Auth URI
    pub auth_uri: String,

    /// Token URI
    pub token_uri: String,

    /// Redirect URIs registered for the client
    #[serde(default)]
    #[allow(dead_code)]
    pub redirect_uris: Vec<String>,
}

/// Keys file format (can be "installed" or "web")
#[derive(Debug, Deserialize)]
struct ClientKeysFile {
    #[serde(alias = "web")]
    installed: Option<ClientKeys>,
}

impl ClientKeys {
    /// Load client keys from a `gcp-oauth.keys.json` file.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::KeysFileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AuthError::Storage {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let keys_file: ClientKeysFile =
            serde_json::from_str(&content).map_err(|_| AuthError::InvalidKeysFormat)?;

        keys_file.installed.ok_or(AuthError::InvalidKeysFormat)
    }
}
