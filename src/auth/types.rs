//! Credential and token types shared across the auth subsystem.

use serde::{Deserialize, Serialize};

use crate::auth::strategy::AuthStrategy;

/// Margin subtracted from a token's expiry when deciding whether to
/// refresh, absorbing clock drift and in-flight request latency.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// A stored Google credential for one identity.
///
/// The strategy that obtained the credential is recorded on it so a later
/// refresh uses the same protocol details that created it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Access token presented to Workspace APIs
    pub access_token: String,

    /// Refresh token, absent for grants that did not issue one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Expiry timestamp (Unix seconds); absent means not known to expire
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    /// Scopes granted with this credential
    #[serde(default)]
    pub scopes: Vec<String>,

    /// OAuth client ID the credential was issued to
    pub client_id: String,

    /// OAuth client secret; not sent by public-client strategies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Strategy that obtained this credential
    pub strategy: AuthStrategy,
}

pub(crate) fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    /// True when the access token expires within `skew_secs` from now.
    ///
    /// A credential without an expiry is treated as non-expiring.
    pub fn expires_within(&self, skew_secs: i64) -> bool {
        match self.expires_at {
            Some(expiry) => expiry - unix_now() < skew_secs,
            None => false,
        }
    }

    /// True when the access token is already past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_within(0)
    }
}

/// Token response from the OAuth token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime in seconds, converted to an absolute expiry on receipt
    pub expires_in: Option<i64>,

    #[serde(default)]
    pub scope: String,

    /// OpenID Connect ID token carrying the account email
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry computed from `expires_in` at receipt time.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_in.map(|secs| unix_now() + secs)
    }

    /// Granted scopes as a list (the wire format is space-separated).
    pub fn scope_list(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_string).collect()
    }
}

/// Outcome of a `refresh_if_needed` call
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The credential is still usable; no network call was made
    Current(Credential),

    /// A refresh exchange produced an updated credential; the caller
    /// must persist it
    Refreshed(Credential),
}

impl RefreshOutcome {
    /// The usable credential regardless of which branch was taken.
    pub fn into_credential(self) -> Credential {
        match self {
            RefreshOutcome::Current(c) | RefreshOutcome::Refreshed(c) => c,
        }
    }
}

/// Outcome of resolving an identity to a credential
#[derive(Debug)]
pub enum Resolution {
    /// A valid, non-expired credential ready for API calls
    Ready(Credential),

    /// No usable credential; the user must run the interactive flow.
    /// The resolver never starts one itself.
    AuthRequired,
}

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
