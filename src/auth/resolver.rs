//! Credential resolution, the entry point every tool call goes through.

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::clasp;
use crate::auth::refresh::TokenRefresher;
use crate::auth::store::CredentialStore;
use crate::auth::strategy::AuthStrategy;
use crate::auth::types::{Credential, RefreshOutcome, Resolution};
use crate::error::AuthError;

/// Selects the best available strategy for an identity and returns a
/// ready-to-use credential, refreshing as needed.
///
/// Order of preference: clasp CLI-session delegation when a local session
/// is detected (no GCP project setup required), then a stored OAuth
/// credential, else `AuthRequired`. The resolver orchestrates the store
/// and refresher; it never mutates state directly and never starts an
/// interactive flow.
pub struct CredentialResolver {
    store: Arc<CredentialStore>,
    refresher: TokenRefresher,
    clasprc_path: PathBuf,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<CredentialStore>,
        refresher: TokenRefresher,
        clasprc_path: PathBuf,
    ) -> Self {
        Self {
            store,
            refresher,
            clasprc_path,
        }
    }

    /// Resolve an identity to a usable credential.
    pub async fn resolve(&self, identity: &str) -> Result<Resolution, AuthError> {
        let mut clasp_tried = false;

        if clasp::session_available(&self.clasprc_path) {
            // Prefer our stored copy of the clasp credential: it carries
            // any refresh already performed for this identity.
            let candidate = match self.store.get(identity).await? {
                Some(stored) if stored.strategy == AuthStrategy::ClaspSession => Some(stored),
                _ => clasp::load_session(&self.clasprc_path),
            };

            if let Some(credential) = candidate {
                clasp_tried = true;
                match self.refresh_and_persist(identity, credential).await {
                    Ok(credential) => return Ok(Resolution::Ready(credential)),
                    Err(AuthError::ReauthRequired) => {
                        tracing::warn!(
                            identity,
                            "clasp session is stale and not refreshable, trying stored credentials"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let Some(credential) = self.store.get(identity).await? else {
            return Ok(Resolution::AuthRequired);
        };
        if clasp_tried && credential.strategy == AuthStrategy::ClaspSession {
            // Already failed through the clasp path above.
            return Ok(Resolution::AuthRequired);
        }

        match self.refresh_and_persist(identity, credential).await {
            Ok(credential) => Ok(Resolution::Ready(credential)),
            Err(AuthError::ReauthRequired) => Ok(Resolution::AuthRequired),
            Err(e) => Err(e),
        }
    }

    /// Refresh a credential if needed and persist any update before
    /// handing it out.
    ///
    /// A transport-failed refresh is retried exactly once; there is no
    /// retry loop that could mask a revoked grant.
    async fn refresh_and_persist(
        &self,
        identity: &str,
        credential: Credential,
    ) -> Result<Credential, AuthError> {
        let outcome = match self.refresher.refresh_if_needed(credential.clone()).await {
            Err(AuthError::Refresh { message }) => {
                tracing::warn!(identity, "refresh failed ({}), retrying once", message);
                self.refresher.refresh_if_needed(credential).await?
            }
            other => other?,
        };

        match outcome {
            RefreshOutcome::Current(credential) => Ok(credential),
            RefreshOutcome::Refreshed(credential) => {
                self.store.save(identity, credential.clone()).await?;
                tracing::info!(identity, "persisted refreshed credential");
                Ok(credential)
            }
        }
    }
}
