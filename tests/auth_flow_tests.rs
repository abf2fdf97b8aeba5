//! Integration tests for the authentication subsystem.
//!
//! The Google token endpoint is simulated with wiremock; no real network
//! calls are made.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use workspace_mcp_server_rust::auth::{
    AuthStrategy, ClientKeys, CompletedAuth, Credential, CredentialResolver, CredentialStore,
    FlowCoordinator, FlowStart, Resolution, TokenRefresher,
};
use workspace_mcp_server_rust::error::AuthError;

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn client_keys(token_uri: String) -> ClientKeys {
    serde_json::from_value(json!({
        "client_id": "test-client",
        "client_secret": "test-secret",
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": token_uri,
        "redirect_uris": ["http://localhost"]
    }))
    .unwrap()
}

fn credential(
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: Option<i64>,
) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        token_type: "Bearer".to_string(),
        expires_at,
        scopes: vec!["openid".to_string()],
        client_id: "test-client".to_string(),
        client_secret: Some("test-secret".to_string()),
        strategy: AuthStrategy::OAuth2,
    }
}

/// An unsigned ID token whose payload carries the given email claim.
fn id_token(email: &str) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"email":"{}","sub":"1"}}"#, email));
    format!("eyJhbGciOiJSUzI1NiJ9.{}.signature", payload)
}

struct TestEnv {
    _dir: tempfile::TempDir,
    store: Arc<CredentialStore>,
    resolver: CredentialResolver,
}

/// Resolver wired to a mock token endpoint, with no clasp session.
fn test_env(server: &MockServer) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CredentialStore::new(dir.path().join("credentials.json")));
    let resolver = CredentialResolver::new(
        store.clone(),
        TokenRefresher::with_endpoint(format!("{}/token", server.uri())),
        dir.path().join("no-clasprc.json"),
    );
    TestEnv {
        _dir: dir,
        store,
        resolver,
    }
}

// ==================== Resolver properties ====================

#[tokio::test]
async fn fresh_credential_resolves_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let env = test_env(&server);
    env.store
        .save(
            "alice@example.com",
            credential("fresh-token", Some("refresh-1"), Some(unix_now() + 3600)),
        )
        .await
        .unwrap();

    let resolution = env.resolver.resolve("alice@example.com").await.unwrap();
    match resolution {
        Resolution::Ready(cred) => assert_eq!(cred.access_token, "fresh-token"),
        other => panic!("expected Ready, got {:?}", other),
    }
}

#[tokio::test]
async fn stale_credential_refreshes_once_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let env = test_env(&server);
    env.store
        .save(
            "alice@example.com",
            credential("stale-token", Some("refresh-1"), Some(unix_now() - 10)),
        )
        .await
        .unwrap();

    let resolution = env.resolver.resolve("alice@example.com").await.unwrap();
    let Resolution::Ready(cred) = resolution else {
        panic!("expected Ready");
    };
    assert_eq!(cred.access_token, "renewed-token");
    // The response carried no refresh token, so the prior one is kept.
    assert_eq!(cred.refresh_token.as_deref(), Some("refresh-1"));

    // The update was persisted before resolve returned.
    let stored = env
        .store
        .get("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "renewed-token");
    assert!(stored.expires_at.unwrap() > unix_now());
}

#[tokio::test]
async fn rotated_refresh_token_replaces_stored_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed-token",
            "refresh_token": "refresh-2",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let env = test_env(&server);
    env.store
        .save(
            "alice@example.com",
            credential("stale-token", Some("refresh-1"), Some(unix_now() - 10)),
        )
        .await
        .unwrap();

    env.resolver.resolve("alice@example.com").await.unwrap();
    let stored = env
        .store
        .get("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn expired_credential_without_refresh_token_requires_reauth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let env = test_env(&server);
    env.store
        .save(
            "alice@example.com",
            credential("stale-token", None, Some(unix_now() - 10)),
        )
        .await
        .unwrap();

    let resolution = env.resolver.resolve("alice@example.com").await.unwrap();
    assert!(matches!(resolution, Resolution::AuthRequired));
}

#[tokio::test]
async fn unknown_identity_requires_auth() {
    let server = MockServer::start().await;
    let env = test_env(&server);
    let resolution = env.resolver.resolve("nobody@example.com").await.unwrap();
    assert!(matches!(resolution, Resolution::AuthRequired));
}

#[tokio::test]
async fn revoked_grant_surfaces_as_auth_required_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let env = test_env(&server);
    env.store
        .save(
            "alice@example.com",
            credential("stale-token", Some("revoked"), Some(unix_now() - 10)),
        )
        .await
        .unwrap();

    let resolution = env.resolver.resolve("alice@example.com").await.unwrap();
    assert!(matches!(resolution, Resolution::AuthRequired));
}

#[tokio::test]
async fn transient_refresh_failure_is_retried_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend unavailable"))
        .expect(2)
        .mount(&server)
        .await;

    let env = test_env(&server);
    env.store
        .save(
            "alice@example.com",
            credential("stale-token", Some("refresh-1"), Some(unix_now() - 10)),
        )
        .await
        .unwrap();

    let err = env.resolver.resolve("alice@example.com").await.unwrap_err();
    assert!(matches!(err, AuthError::Refresh { .. }));
}

// ==================== clasp delegation ====================

fn write_clasprc(path: &std::path::Path, expiry_ms: i64) {
    let content = json!({
        "token": {
            "access_token": "clasp-access",
            "refresh_token": "clasp-refresh",
            "scope": "openid",
            "token_type": "Bearer",
            "expiry_date": expiry_ms
        },
        "oauth2ClientSettings": {
            "clientId": "clasp-client",
            "clientSecret": "clasp-secret",
            "redirectUri": "http://localhost"
        }
    });
    std::fs::write(path, serde_json::to_string(&content).unwrap()).unwrap();
}

#[tokio::test]
async fn fresh_clasp_session_is_used_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let clasprc = dir.path().join(".clasprc.json");
    write_clasprc(&clasprc, (unix_now() + 3600) * 1000);

    let store = Arc::new(CredentialStore::new(dir.path().join("credentials.json")));
    let resolver = CredentialResolver::new(
        store,
        TokenRefresher::with_endpoint(format!("{}/token", server.uri())),
        clasprc,
    );

    let Resolution::Ready(cred) = resolver.resolve("alice@example.com").await.unwrap() else {
        panic!("expected Ready");
    };
    assert_eq!(cred.access_token, "clasp-access");
    assert_eq!(cred.strategy, AuthStrategy::ClaspSession);
}

#[tokio::test]
async fn stale_clasp_session_refreshes_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=clasp-refresh"))
        .and(body_string_contains("client_id=clasp-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "clasp-renewed",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let clasprc = dir.path().join(".clasprc.json");
    write_clasprc(&clasprc, (unix_now() - 60) * 1000);

    let store = Arc::new(CredentialStore::new(dir.path().join("credentials.json")));
    let resolver = CredentialResolver::new(
        store.clone(),
        TokenRefresher::with_endpoint(format!("{}/token", server.uri())),
        clasprc,
    );

    let Resolution::Ready(cred) = resolver.resolve("alice@example.com").await.unwrap() else {
        panic!("expected Ready");
    };
    assert_eq!(cred.access_token, "clasp-renewed");

    // The refreshed clasp credential is cached under the identity.
    let stored = store.get("alice@example.com").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "clasp-renewed");
    assert_eq!(stored.strategy, AuthStrategy::ClaspSession);
}

// ==================== Authorization flow ====================

#[tokio::test]
async fn full_handshake_then_resolve_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "exchanged-token",
            "refresh_token": "exchanged-refresh",
            "token_type": "Bearer",
            "expires_in": 3600,
            "id_token": id_token("alice@example.com")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let env = test_env(&server);
    let flows = FlowCoordinator::new(
        client_keys(format!("{}/token", server.uri())),
        "http://localhost".to_string(),
        vec!["openid".to_string()],
    );

    let FlowStart::Authorization { url, state } =
        flows.begin(AuthStrategy::OAuth2, None).unwrap()
    else {
        panic!("expected browser handshake");
    };
    assert!(url.contains(&format!("state={}", state)));

    let redirect = format!("http://localhost/?code=4%2F0Acode&state={}", state);
    let CompletedAuth {
        identity,
        credential,
    } = flows.complete(&redirect).await.unwrap();

    let identity = identity.unwrap();
    assert_eq!(identity, "alice@example.com");
    assert!(!credential.access_token.is_empty());
    assert!(credential.expires_at.unwrap() > unix_now());

    // Persist the way the auth tool does, then resolve with zero
    // further token-endpoint calls (the expect(1) above enforces it).
    env.store.save(&identity, credential).await.unwrap();
    let Resolution::Ready(resolved) = env.resolver.resolve(&identity).await.unwrap() else {
        panic!("expected Ready");
    };
    assert_eq!(resolved.access_token, "exchanged-token");
}

#[tokio::test]
async fn replayed_redirect_url_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "exchanged-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flows = FlowCoordinator::new(
        client_keys(format!("{}/token", server.uri())),
        "http://localhost".to_string(),
        vec![],
    );

    let FlowStart::Authorization { state, .. } =
        flows.begin(AuthStrategy::OAuth2, None).unwrap()
    else {
        panic!("expected browser handshake");
    };

    let redirect = format!("http://localhost/?code=abc&state={}", state);
    assert!(flows.complete(&redirect).await.is_ok());

    let err = flows.complete(&redirect).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidFlow { .. }));
}

#[tokio::test]
async fn expired_flow_is_rejected_even_with_valid_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "never-issued",
            "token_type": "Bearer"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let flows = FlowCoordinator::with_ttl(
        client_keys(format!("{}/token", server.uri())),
        "http://localhost".to_string(),
        vec![],
        Duration::ZERO,
    );

    let FlowStart::Authorization { state, .. } =
        flows.begin(AuthStrategy::OAuth2, None).unwrap()
    else {
        panic!("expected browser handshake");
    };

    let redirect = format!("http://localhost/?code=abc&state={}", state);
    let err = flows.complete(&redirect).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidFlow { .. }));
}

#[tokio::test]
async fn concurrent_flows_route_redirects_by_state_token() {
    let server = MockServer::start().await;

    // The PKCE flow's exchange must carry its verifier; the plain OAuth2
    // exchange must carry the client secret. Routing the redirect to the
    // wrong flow would miss both mocks and fail the exchange.
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=pkce-code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "pkce-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=plain-code"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "plain-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flows = FlowCoordinator::new(
        client_keys(format!("{}/token", server.uri())),
        "http://localhost".to_string(),
        vec![],
    );

    let FlowStart::Authorization { state: pkce_state, .. } =
        flows.begin(AuthStrategy::OAuth21, None).unwrap()
    else {
        panic!("expected browser handshake");
    };
    let FlowStart::Authorization { state: plain_state, .. } =
        flows.begin(AuthStrategy::OAuth2, None).unwrap()
    else {
        panic!("expected browser handshake");
    };
    assert_ne!(pkce_state, plain_state);
    assert_eq!(flows.pending_flows(), 2);

    // Complete in the opposite order from begin.
    let plain = flows
        .complete(&format!(
            "http://localhost/?code=plain-code&state={}",
            plain_state
        ))
        .await
        .unwrap();
    assert_eq!(plain.credential.access_token, "plain-token");

    let pkce = flows
        .complete(&format!(
            "http://localhost/?code=pkce-code&state={}",
            pkce_state
        ))
        .await
        .unwrap();
    assert_eq!(pkce.credential.access_token, "pkce-token");

    assert_eq!(flows.pending_flows(), 0);
}

#[tokio::test]
async fn rejected_code_surfaces_exchange_error_and_consumes_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_request" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let flows = FlowCoordinator::new(
        client_keys(format!("{}/token", server.uri())),
        "http://localhost".to_string(),
        vec![],
    );

    let FlowStart::Authorization { state, .. } =
        flows.begin(AuthStrategy::OAuth2, None).unwrap()
    else {
        panic!("expected browser handshake");
    };

    let redirect = format!("http://localhost/?code=bad&state={}", state);
    let err = flows.complete(&redirect).await.unwrap_err();
    assert!(matches!(err, AuthError::Exchange { .. }));

    // The flow is gone; the user must restart from begin.
    assert_eq!(flows.pending_flows(), 0);
}

#[tokio::test]
async fn malformed_redirect_url_is_invalid_flow() {
    let server = MockServer::start().await;
    let flows = FlowCoordinator::new(
        client_keys(format!("{}/token", server.uri())),
        "http://localhost".to_string(),
        vec![],
    );

    let err = flows
        .complete("http://localhost/?scope=openid")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidFlow { .. }));
}
