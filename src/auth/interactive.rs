//! Interactive authentication for the CLI `auth` subcommand.
//!
//! Runs a local HTTP callback server, opens the authorization URL in the
//! browser, and feeds the redirect back through the flow coordinator.

use std::sync::Arc;

use axum::extract::RawQuery;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tokio::sync::oneshot;

use crate::auth::flow::{FlowCoordinator, FlowStart};
use crate::auth::store::CredentialStore;
use crate::auth::strategy::AuthStrategy;
use crate::error::{AuthError, Result};

/// Run the browser-based authentication flow to completion and persist
/// the resulting credential. Returns the authorized identity.
pub async fn run_interactive_auth(
    flows: &FlowCoordinator,
    store: &CredentialStore,
    strategy: AuthStrategy,
    port: u16,
) -> Result<String> {
    let redirect_uri = format!("http://localhost:{}/oauth2callback", port);

    let start = flows.begin_with_redirect(strategy, None, redirect_uri.clone())?;
    let (auth_url, _state) = match start {
        FlowStart::Authorization { url, state } => (url, state),
        FlowStart::LocalSession => {
            eprintln!("A clasp session is already available; no browser sign-in is needed.");
            return Ok("clasp session".to_string());
        }
    };

    eprintln!("\nPlease visit this URL to authenticate:");
    eprintln!("{}\n", auth_url);

    if let Err(e) = open::that(&auth_url) {
        eprintln!("Could not open browser automatically: {}", e);
        eprintln!("Please open the URL manually.");
    }

    // The handler forwards the raw redirect query to the waiting flow.
    let (tx, rx) = oneshot::channel::<String>();
    let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

    let tx_clone = tx.clone();
    let callback_redirect = redirect_uri.clone();
    let callback_handler = move |RawQuery(query): RawQuery| async move {
        let redirect_url = format!("{}?{}", callback_redirect, query.unwrap_or_default());
        if let Some(tx) = tx_clone.lock().unwrap().take() {
            let _ = tx.send(redirect_url);
        }
        Html(
            "<html><body><h1>Authentication received</h1>\
             <p>You can close this window and return to the terminal.</p></body></html>",
        )
    };

    let app = Router::new().route("/oauth2callback", get(callback_handler));
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    eprintln!("Waiting for authentication callback on port {}...", port);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            result?;
            Err(AuthError::InvalidFlow {
                reason: "callback server stopped before a redirect arrived".to_string(),
            }
            .into())
        }
        redirect = rx => {
            let redirect_url = redirect.map_err(|_| AuthError::InvalidFlow {
                reason: "callback channel closed before a redirect arrived".to_string(),
            })?;

            eprintln!("Received authorization redirect, exchanging code for tokens...");
            let completed = flows.complete(&redirect_url).await?;
            let identity = completed
                .identity
                .clone()
                .unwrap_or_else(|| "default".to_string());
            store.save(&identity, completed.credential).await?;
            eprintln!("Authentication completed for {}.", identity);
            Ok(identity)
        }
    }
}
