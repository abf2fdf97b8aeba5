//! Shared HTTP plumbing for Workspace API calls.
//!
//! Every request resolves the caller's identity to a credential first;
//! the resolver decides between the clasp session and stored OAuth
//! credentials and refreshes as needed.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{CredentialResolver, Resolution};
use crate::error::{ApiError, AuthError, Result, WorkspaceMcpError};

/// Client for Google Workspace APIs
pub struct WorkspaceClient {
    http_client: reqwest::Client,
    resolver: Arc<CredentialResolver>,
}

impl WorkspaceClient {
    pub fn new(resolver: Arc<CredentialResolver>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            resolver,
        }
    }

    /// A valid access token for the identity, or `ReauthRequired` when no
    /// usable credential exists.
    pub(crate) async fn access_token(&self, identity: &str) -> Result<String> {
        match self.resolver.resolve(identity).await? {
            Resolution::Ready(credential) => Ok(credential.access_token),
            Resolution::AuthRequired => Err(WorkspaceMcpError::Auth(AuthError::ReauthRequired)),
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        identity: &str,
        url: &str,
    ) -> Result<T> {
        let token = self.access_token(identity).await?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await?;
        parse_json(response, url).await
    }

    /// GET returning the raw body (file downloads, document exports).
    pub(crate) async fn get_text(&self, identity: &str, url: &str) -> Result<String> {
        let token = self.access_token(identity).await?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await?;
        let response = check_status(response, url).await?;
        Ok(response.text().await?)
    }

    pub(crate) async fn post_json<T, B>(&self, identity: &str, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.access_token(identity).await?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        parse_json(response, url).await
    }

    pub(crate) async fn put_json<T, B>(&self, identity: &str, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.access_token(identity).await?;
        let response = self
            .http_client
            .put(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        parse_json(response, url).await
    }

    pub(crate) async fn patch_json<T, B>(&self, identity: &str, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.access_token(identity).await?;
        let response = self
            .http_client
            .patch(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        parse_json(response, url).await
    }

    pub(crate) async fn delete(&self, identity: &str, url: &str) -> Result<()> {
        let token = self.access_token(identity).await?;
        let response = self
            .http_client
            .delete(url)
            .bearer_auth(&token)
            .send()
            .await?;
        check_status(response, url).await?;
        Ok(())
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
    let response = check_status(response, url).await?;
    Ok(response.json().await?)
}

async fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 404 {
        return Err(WorkspaceMcpError::Api(ApiError::NotFound {
            resource: url.to_string(),
        }));
    }
    let text = response.text().await.unwrap_or_default();
    Err(WorkspaceMcpError::Api(ApiError::RequestFailed {
        message: format!("{} returned {}: {}", url, status, text),
    }))
}
