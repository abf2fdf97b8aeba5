//! Token refresh against the OAuth token endpoint.

use crate::auth::types::{Credential, RefreshOutcome, TokenResponse, EXPIRY_SKEW_SECS};
use crate::config::{GOOGLE_TOKEN_URI, TOKEN_EXCHANGE_TIMEOUT};
use crate::error::AuthError;

/// Stateless refresher; the caller persists any updated credential.
pub struct TokenRefresher {
    http_client: reqwest::Client,
    token_uri: String,
}

impl TokenRefresher {
    /// Refresher against the Google token endpoint.
    pub fn new() -> Self {
        Self::with_endpoint(GOOGLE_TOKEN_URI)
    }

    /// Refresher against a specific token endpoint.
    pub fn with_endpoint(token_uri: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(TOKEN_EXCHANGE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            token_uri: token_uri.into(),
        }
    }

    /// Refresh the credential if it is inside the expiry skew window.
    ///
    /// A fresh credential comes back as [`RefreshOutcome::Current`] with no
    /// network call. A stale credential without a refresh token is
    /// unusable and yields `ReauthRequired` rather than a refresh attempt.
    /// Transport failures yield `Refresh` and are never retried here; the
    /// resolver owns the (single) retry.
    pub async fn refresh_if_needed(
        &self,
        credential: Credential,
    ) -> Result<RefreshOutcome, AuthError> {
        if !credential.expires_within(EXPIRY_SKEW_SECS) {
            return Ok(RefreshOutcome::Current(credential));
        }

        let Some(refresh_token) = credential.refresh_token.clone() else {
            return Err(AuthError::ReauthRequired);
        };

        tracing::debug!(
            strategy = %credential.strategy,
            "access token stale, refreshing"
        );
        let refreshed = self.refresh(credential, refresh_token).await?;
        Ok(RefreshOutcome::Refreshed(refreshed))
    }

    async fn refresh(
        &self,
        credential: Credential,
        refresh_token: String,
    ) -> Result<Credential, AuthError> {
        let mut params = vec![
            ("client_id", credential.client_id.clone()),
            ("refresh_token", refresh_token.clone()),
            ("grant_type", "refresh_token".to_string()),
        ];
        if credential.strategy.sends_client_secret() {
            if let Some(secret) = credential.client_secret.clone() {
                params.push(("client_secret", secret));
            }
        }

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Refresh {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // A revoked or expired grant cannot be retried; only a fresh
            // interactive flow recovers it.
            if text.contains("invalid_grant") {
                tracing::warn!("refresh grant rejected by provider: {}", text);
                return Err(AuthError::ReauthRequired);
            }
            return Err(AuthError::Refresh {
                message: format!("token endpoint returned {}: {}", status, text),
            });
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| AuthError::Refresh {
                message: format!("malformed token response: {}", e),
            })?;

        let expires_at = token_response.expires_at();
        let scopes = if token_response.scope.is_empty() {
            credential.scopes
        } else {
            token_response.scope_list()
        };
        Ok(Credential {
            access_token: token_response.access_token,
            // Some providers rotate the refresh token, others omit it;
            // keep the old one unless a new one was explicitly issued.
            refresh_token: token_response.refresh_token.or(Some(refresh_token)),
            token_type: token_response.token_type,
            expires_at,
            scopes,
            client_id: credential.client_id,
            client_secret: credential.client_secret,
            strategy: credential.strategy,
        })
    }
}

impl Default for TokenRefresher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::strategy::AuthStrategy;
    use crate::auth::types::unix_now;

    fn credential(expires_at: Option<i64>, refresh_token: Option<&str>) -> Credential {
        Credential {
            access_token: "old-access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            token_type: "Bearer".to_string(),
            expires_at,
            scopes: vec!["openid".to_string()],
            client_id: "client".to_string(),
            client_secret: Some("secret".to_string()),
            strategy: AuthStrategy::OAuth2,
        }
    }

    #[tokio::test]
    async fn test_fresh_credential_skips_network() {
        // Endpoint is unroutable; a network attempt would error out.
        let refresher = TokenRefresher::with_endpoint("http://127.0.0.1:1/token");
        let cred = credential(Some(unix_now() + 3600), Some("refresh"));

        let outcome = refresher.refresh_if_needed(cred).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Current(_)));
    }

    #[tokio::test]
    async fn test_stale_without_refresh_token_requires_reauth() {
        let refresher = TokenRefresher::with_endpoint("http://127.0.0.1:1/token");
        let cred = credential(Some(unix_now() - 10), None);

        let err = refresher.refresh_if_needed(cred).await.unwrap_err();
        assert!(matches!(err, AuthError::ReauthRequired));
    }

    #[tokio::test]
    async fn test_transport_failure_is_refresh_error() {
        let refresher = TokenRefresher::with_endpoint("http://127.0.0.1:1/token");
        let cred = credential(Some(unix_now() - 10), Some("refresh"));

        let err = refresher.refresh_if_needed(cred).await.unwrap_err();
        assert!(matches!(err, AuthError::Refresh { .. }));
    }
}
