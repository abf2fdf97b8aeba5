//! Interactive authorization flow lifecycle.
//!
//! `begin` hands out an authorization URL and registers a pending flow
//! keyed by its state token; `complete` consumes the redirect URL the
//! user pasted back. The redirect happens out of process in a browser,
//! so an arbitrary delay between the two calls is tolerated up to the
//! flow TTL. Flows are keyed by state token, not held in a single slot,
//! so concurrent handshakes for different accounts cannot clobber each
//! other.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::auth::strategy::{AuthStrategy, ClientKeys};
use crate::auth::types::{Credential, TokenResponse};
use crate::config::TOKEN_EXCHANGE_TIMEOUT;
use crate::error::AuthError;

/// How long an unfinished flow stays claimable before it is discarded.
pub const FLOW_TTL: Duration = Duration::from_secs(600);

/// An authorization handshake between `begin` and `complete`
#[derive(Debug)]
struct PendingFlow {
    verifier: Option<String>,
    strategy: AuthStrategy,
    redirect_uri: String,
    identity_hint: Option<String>,
    created: Instant,
}

/// What `begin` produced
#[derive(Debug)]
pub enum FlowStart {
    /// Browser handshake required: open `url`, then pass the redirect
    /// URL to `complete`
    Authorization { url: String, state: String },

    /// clasp delegation needs no handshake; the local session is used
    /// as-is
    LocalSession,
}

/// A finished handshake: the credential plus the account it belongs to,
/// when the provider identified one
#[derive(Debug)]
pub struct CompletedAuth {
    pub identity: Option<String>,
    pub credential: Credential,
}

/// Coordinates interactive authorization handshakes.
pub struct FlowCoordinator {
    http_client: reqwest::Client,
    keys: ClientKeys,
    redirect_uri: String,
    scopes: Vec<String>,
    ttl: Duration,
    flows: Mutex<HashMap<String, PendingFlow>>,
}

impl FlowCoordinator {
    /// Coordinator using the default flow TTL.
    pub fn new(keys: ClientKeys, redirect_uri: String, scopes: Vec<String>) -> Self {
        Self::with_ttl(keys, redirect_uri, scopes, FLOW_TTL)
    }

    /// Coordinator with an explicit flow TTL.
    pub fn with_ttl(
        keys: ClientKeys,
        redirect_uri: String,
        scopes: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(TOKEN_EXCHANGE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            keys,
            redirect_uri,
            scopes,
            ttl,
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Start an authorization handshake with the default redirect URI.
    pub fn begin(
        &self,
        strategy: AuthStrategy,
        identity_hint: Option<String>,
    ) -> Result<FlowStart, AuthError> {
        let redirect_uri = self.redirect_uri.clone();
        self.begin_with_redirect(strategy, identity_hint, redirect_uri)
    }

    /// Start an authorization handshake redirecting to a specific URI
    /// (the interactive CLI uses its local callback server here).
    pub fn begin_with_redirect(
        &self,
        strategy: AuthStrategy,
        identity_hint: Option<String>,
        redirect_uri: String,
    ) -> Result<FlowStart, AuthError> {
        if strategy == AuthStrategy::ClaspSession {
            return Ok(FlowStart::LocalSession);
        }

        let state = generate_state();
        let (verifier, challenge) = if strategy.requires_pkce() {
            let (verifier, challenge) = generate_pkce_pair();
            (Some(verifier), Some(challenge))
        } else {
            (None, None)
        };

        let url = self.authorization_url(&redirect_uri, &state, challenge.as_deref());

        let flow = PendingFlow {
            verifier,
            strategy,
            redirect_uri,
            identity_hint,
            created: Instant::now(),
        };

        let mut flows = self.flows.lock().expect("flow registry poisoned");
        let ttl = self.ttl;
        flows.retain(|_, f| f.created.elapsed() < ttl);
        flows.insert(state.clone(), flow);

        tracing::debug!(strategy = %strategy, "registered pending authorization flow");
        Ok(FlowStart::Authorization { url, state })
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str, challenge: Option<&str>) -> String {
        let scopes = self.scopes.join(" ");
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&prompt=consent",
            self.keys.auth_uri,
            urlencoding::encode(&self.keys.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state),
        );
        if let Some(challenge) = challenge {
            url.push_str("&code_challenge=");
            url.push_str(challenge);
            url.push_str("&code_challenge_method=S256");
        }
        url
    }

    /// Finish a handshake from the redirect URL the browser landed on.
    ///
    /// The matching flow is claimed atomically by state token and removed
    /// regardless of the exchange outcome: a rejected code is not
    /// retryable, and a replayed redirect URL must fail.
    pub async fn complete(&self, redirect_url: &str) -> Result<CompletedAuth, AuthError> {
        let (code, state) = parse_redirect_params(redirect_url)?;
        let flow = self.claim(&state)?;

        let mut params = vec![
            ("client_id", self.keys.client_id.clone()),
            ("code", code),
            ("grant_type", "authorization_code".to_string()),
            ("redirect_uri", flow.redirect_uri.clone()),
        ];
        if flow.strategy.sends_client_secret() {
            params.push(("client_secret", self.keys.client_secret.clone()));
        }
        if let Some(verifier) = flow.verifier.clone() {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http_client
            .post(&self.keys.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Exchange {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange {
                message: format!("token endpoint returned {}: {}", status, text),
            });
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| AuthError::Exchange {
                message: format!("malformed token response: {}", e),
            })?;

        let identity = token_response
            .id_token
            .as_deref()
            .and_then(email_from_id_token)
            .or(flow.identity_hint);

        let expires_at = token_response.expires_at();
        let scopes = if token_response.scope.is_empty() {
            self.scopes.clone()
        } else {
            token_response.scope_list()
        };
        let credential = Credential {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            token_type: token_response.token_type,
            expires_at,
            scopes,
            client_id: self.keys.client_id.clone(),
            client_secret: Some(self.keys.client_secret.clone()),
            strategy: flow.strategy,
        };

        tracing::info!(
            identity = identity.as_deref().unwrap_or("unknown"),
            strategy = %flow.strategy,
            "authorization flow completed"
        );
        Ok(CompletedAuth {
            identity,
            credential,
        })
    }

    /// Remove and return the flow for a state token.
    ///
    /// Removal and the TTL check happen under one lock acquisition, so a
    /// completion can never race the sweep into using an expired flow.
    fn claim(&self, state: &str) -> Result<PendingFlow, AuthError> {
        let mut flows = self.flows.lock().expect("flow registry poisoned");
        let flow = flows.remove(state).ok_or_else(|| AuthError::InvalidFlow {
            reason: "unknown or already used state token".to_string(),
        })?;
        if flow.created.elapsed() >= self.ttl {
            return Err(AuthError::InvalidFlow {
                reason: "authorization flow expired".to_string(),
            });
        }
        Ok(flow)
    }

    /// Number of flows currently awaiting a redirect.
    pub fn pending_flows(&self) -> usize {
        let mut flows = self.flows.lock().expect("flow registry poisoned");
        let ttl = self.ttl;
        flows.retain(|_, f| f.created.elapsed() < ttl);
        flows.len()
    }
}

/// Random, unguessable state token bound to one authorization attempt.
fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE verifier and S256 challenge.
///
/// The verifier is 43 characters from the unreserved URI set; the
/// challenge is the base64url-encoded SHA-256 digest of the verifier.
fn generate_pkce_pair() -> (String, String) {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::thread_rng();
    let verifier: String = (0..43)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let challenge = pkce_challenge(&verifier);
    (verifier, challenge)
}

fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Extract `code` and `state` from a redirect URL.
///
/// Accepts a full URL (`http://localhost/?code=...&state=...`) or a bare
/// query string. A provider error parameter or missing pieces make the
/// flow invalid.
pub(crate) fn parse_redirect_params(redirect_url: &str) -> Result<(String, String), AuthError> {
    let query = redirect_url
        .split_once('?')
        .map(|(_, q)| q)
        .unwrap_or(redirect_url);
    let query = query.split('#').next().unwrap_or(query);

    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)
            .map_err(|_| AuthError::InvalidFlow {
                reason: format!("undecodable {} parameter", key),
            })?
            .into_owned();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => {
                return Err(AuthError::InvalidFlow {
                    reason: format!("provider returned error: {}", value),
                })
            }
            _ => {}
        }
    }

    match (code, state) {
        (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => Ok((code, state)),
        _ => Err(AuthError::InvalidFlow {
            reason: "redirect URL is missing code or state parameters".to_string(),
        }),
    }
}

/// Account email from an OpenID Connect ID token, when present.
///
/// The token was just issued to us over TLS by the provider, so the
/// claims are read without signature verification. An unparseable token
/// is a normal "email unknown" outcome.
fn email_from_id_token(id_token: &str) -> Option<String> {
    let mut parts = id_token.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims
        .get("email")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_redirect_full_url() {
        let (code, state) =
            parse_redirect_params("http://localhost/?code=4%2F0Aabc&state=xyz&scope=openid")
                .unwrap();
        assert_eq!(code, "4/0Aabc");
        assert_eq!(state, "xyz");
    }

    #[test]
    fn test_parse_redirect_bare_query() {
        let (code, state) = parse_redirect_params("code=abc&state=def").unwrap();
        assert_eq!(code, "abc");
        assert_eq!(state, "def");
    }

    #[test]
    fn test_parse_redirect_missing_state() {
        let err = parse_redirect_params("http://localhost/?code=abc").unwrap_err();
        assert!(matches!(err, AuthError::InvalidFlow { .. }));
    }

    #[test]
    fn test_parse_redirect_provider_error() {
        let err = parse_redirect_params("http://localhost/?error=access_denied&state=x").unwrap_err();
        match err {
            AuthError::InvalidFlow { reason } => assert!(reason.contains("access_denied")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_state_tokens_are_unique_and_long() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        // 32 random bytes base64url-encode to 43 characters.
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_pkce_verifier_charset() {
        let (verifier, _) = generate_pkce_pair();
        assert_eq!(verifier.len(), 43);
        assert!(verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-._~".contains(c)));
    }

    #[test]
    fn test_email_from_id_token() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"email":"user@example.com","sub":"1"}"#);
        let token = format!("eyJhbGciOiJSUzI1NiJ9.{}.sig", payload);
        assert_eq!(
            email_from_id_token(&token).as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn test_email_from_garbage_id_token() {
        assert!(email_from_id_token("not-a-jwt").is_none());
        assert!(email_from_id_token("a.b.c").is_none());
    }

    fn keys() -> ClientKeys {
        serde_json::from_value(serde_json::json!({
            "client_id": "client",
            "client_secret": "secret",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "http://127.0.0.1:1/token"
        }))
        .unwrap()
    }

    fn coordinator() -> FlowCoordinator {
        FlowCoordinator::new(
            keys(),
            "http://localhost".to_string(),
            vec!["openid".to_string()],
        )
    }

    #[test]
    fn test_begin_registers_flow_with_state_in_url() {
        let flows = coordinator();
        let FlowStart::Authorization { url, state } =
            flows.begin(AuthStrategy::OAuth2, None).unwrap()
        else {
            panic!("expected browser handshake");
        };
        assert!(url.contains(&format!("state={}", state)));
        assert!(url.contains("access_type=offline"));
        assert!(!url.contains("code_challenge"));
        assert_eq!(flows.pending_flows(), 1);
    }

    #[test]
    fn test_begin_oauth21_includes_pkce_challenge() {
        let flows = coordinator();
        let FlowStart::Authorization { url, .. } =
            flows.begin(AuthStrategy::OAuth21, None).unwrap()
        else {
            panic!("expected browser handshake");
        };
        assert!(url.contains("code_challenge="));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn test_begin_clasp_is_local_confirmation() {
        let flows = coordinator();
        let start = flows.begin(AuthStrategy::ClaspSession, None).unwrap();
        assert!(matches!(start, FlowStart::LocalSession));
        assert_eq!(flows.pending_flows(), 0);
    }

    #[test]
    fn test_concurrent_begins_get_distinct_states() {
        let flows = coordinator();
        let FlowStart::Authorization { state: first, .. } =
            flows.begin(AuthStrategy::OAuth2, None).unwrap()
        else {
            panic!("expected browser handshake");
        };
        let FlowStart::Authorization { state: second, .. } =
            flows.begin(AuthStrategy::OAuth2, None).unwrap()
        else {
            panic!("expected browser handshake");
        };
        assert_ne!(first, second);
        assert_eq!(flows.pending_flows(), 2);
    }

    #[test]
    fn test_claim_is_single_use() {
        let flows = coordinator();
        let FlowStart::Authorization { state, .. } =
            flows.begin(AuthStrategy::OAuth2, None).unwrap()
        else {
            panic!("expected browser handshake");
        };

        assert!(flows.claim(&state).is_ok());
        let err = flows.claim(&state).unwrap_err();
        assert!(matches!(err, AuthError::InvalidFlow { .. }));
    }

    #[test]
    fn test_expired_flow_cannot_be_claimed() {
        let flows = FlowCoordinator::with_ttl(
            keys(),
            "http://localhost".to_string(),
            vec![],
            Duration::ZERO,
        );
        let FlowStart::Authorization { state, .. } =
            flows.begin(AuthStrategy::OAuth2, None).unwrap()
        else {
            panic!("expected browser handshake");
        };

        let err = flows.claim(&state).unwrap_err();
        match err {
            AuthError::InvalidFlow { reason } => assert!(reason.contains("expired")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
