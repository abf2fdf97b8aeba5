//! Unified authentication subsystem.
//!
//! Establishes, persists, resolves, and refreshes Google credentials
//! across three strategies (clasp CLI-session delegation, OAuth 2.0,
//! OAuth 2.1/PKCE), and tracks in-flight interactive authorization
//! handshakes. Every tool call obtains its credential through
//! [`resolver::CredentialResolver`] before touching a Workspace API.

pub mod clasp;
pub mod flow;
pub mod interactive;
pub mod refresh;
pub mod resolver;
pub mod store;
pub mod strategy;
pub mod types;

pub use flow::{CompletedAuth, FlowCoordinator, FlowStart};
pub use refresh::TokenRefresher;
pub use resolver::CredentialResolver;
pub use store::CredentialStore;
pub use strategy::{AuthStrategy, ClientKeys};
pub use types::{Credential, RefreshOutcome, Resolution};
