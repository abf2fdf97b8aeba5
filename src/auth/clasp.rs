//! clasp CLI-session delegation.
//!
//! clasp (the Apps Script CLI) keeps its own Google OAuth session in
//! `~/.clasprc.json`. When that session exists, it can back Workspace
//! calls without any GCP project configuration on our side: the file
//! holds a standard Google token plus the client id/secret it was issued
//! to, so refreshes go through the normal token endpoint.

use std::path::Path;

use serde::Deserialize;

use crate::auth::strategy::AuthStrategy;
use crate::auth::types::{default_token_type, Credential};

/// On-disk layout of `~/.clasprc.json`
#[derive(Debug, Deserialize)]
struct ClasprcFile {
    token: ClaspToken,

    #[serde(rename = "oauth2ClientSettings")]
    oauth2_client_settings: ClaspClientSettings,
}

#[derive(Debug, Deserialize)]
struct ClaspToken {
    access_token: String,

    #[serde(default)]
    refresh_token: Option<String>,

    #[serde(default)]
    scope: String,

    #[serde(default = "default_token_type")]
    token_type: String,

    /// Expiry in Unix milliseconds
    #[serde(default)]
    expiry_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ClaspClientSettings {
    #[serde(rename = "clientId")]
    client_id: String,

    #[serde(rename = "clientSecret")]
    client_secret: String,
}

/// True when a clasp session file is present.
pub fn session_available(clasprc_path: &Path) -> bool {
    clasprc_path.exists()
}

/// Import the clasp session as a credential, if one is present and
/// readable.
///
/// A missing or malformed file is a normal "no usable session" outcome,
/// not an error; the resolver falls through to stored credentials.
pub fn load_session(clasprc_path: &Path) -> Option<Credential> {
    let content = match std::fs::read_to_string(clasprc_path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to read {}: {}", clasprc_path.display(), e);
            }
            return None;
        }
    };

    let file: ClasprcFile = match serde_json::from_str(&content) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(
                "unrecognized clasp session format in {}: {}",
                clasprc_path.display(),
                e
            );
            return None;
        }
    };

    Some(Credential {
        access_token: file.token.access_token,
        refresh_token: file.token.refresh_token,
        token_type: file.token.token_type,
        expires_at: file.token.expiry_date.map(|ms| ms / 1000),
        scopes: file
            .token
            .scope
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        client_id: file.oauth2_client_settings.client_id,
        client_secret: Some(file.oauth2_client_settings.client_secret),
        strategy: AuthStrategy::ClaspSession,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CLASPRC: &str = r#"{
        "token": {
            "access_token": "clasp-access",
            "refresh_token": "clasp-refresh",
            "scope": "https://www.googleapis.com/auth/script.projects",
            "token_type": "Bearer",
            "expiry_date": 1700000000000
        },
        "oauth2ClientSettings": {
            "clientId": "clasp-client-id",
            "clientSecret": "clasp-client-secret",
            "redirectUri": "http://localhost"
        },
        "isLocalCreds": false
    }"#;

    #[test]
    fn test_load_session_parses_clasprc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".clasprc.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(CLASPRC.as_bytes()).unwrap();

        assert!(session_available(&path));
        let cred = load_session(&path).unwrap();
        assert_eq!(cred.access_token, "clasp-access");
        assert_eq!(cred.refresh_token.as_deref(), Some("clasp-refresh"));
        assert_eq!(cred.client_id, "clasp-client-id");
        assert_eq!(cred.strategy, AuthStrategy::ClaspSession);
        // Millisecond expiry converted to seconds.
        assert_eq!(cred.expires_at, Some(1700000000));
        assert_eq!(cred.scopes.len(), 1);
    }

    #[test]
    fn test_missing_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(!session_available(&path));
        assert!(load_session(&path).is_none());
    }

    #[test]
    fn test_malformed_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".clasprc.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_session(&path).is_none());
    }
}
