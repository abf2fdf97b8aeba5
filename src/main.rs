//! Workspace MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server for Google Workspace with
//! unified authentication: clasp (no GCP project needed), OAuth 2.0,
//! and OAuth 2.1.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use workspace_mcp_server_rust::auth::{
    clasp, interactive, AuthStrategy, ClientKeys, CredentialResolver, CredentialStore,
    FlowCoordinator, TokenRefresher,
};
use workspace_mcp_server_rust::config::Config;
use workspace_mcp_server_rust::error::Result;
use workspace_mcp_server_rust::mcp::server::McpServer;
use workspace_mcp_server_rust::mcp::tools::ToolHandler;
use workspace_mcp_server_rust::workspace::WorkspaceClient;

/// Workspace MCP Server
#[derive(Parser)]
#[command(name = "workspace-mcp-server")]
#[command(author, version, about = "Google Workspace MCP server with unified authentication")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Google through the browser
    Auth {
        /// Authentication strategy: oauth2 or oauth2.1
        #[arg(long, default_value = "oauth2")]
        strategy: String,
    },
    /// Show stored identities and the clasp session state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new()?;

    match cli.command {
        Some(Commands::Auth { strategy }) => run_auth(config, &strategy).await,
        Some(Commands::Status) => run_status(config).await,
        None => run_server(config).await,
    }
}

async fn run_auth(config: Config, strategy: &str) -> Result<()> {
    let Some(strategy) = AuthStrategy::parse(strategy) else {
        eprintln!("Unknown strategy '{}'. Use oauth2 or oauth2.1.", strategy);
        std::process::exit(2);
    };
    if strategy == AuthStrategy::ClaspSession {
        if clasp::session_available(&config.clasprc_path) {
            eprintln!("clasp session found; no browser authentication is needed.");
            return Ok(());
        }
        eprintln!(
            "No clasp session at {}. Run 'clasp login' first.",
            config.clasprc_path.display()
        );
        std::process::exit(1);
    }

    let keys = ClientKeys::load(&config.oauth_keys_path)?;
    let store = CredentialStore::new(config.credentials_path.clone());
    let flows = FlowCoordinator::new(keys, config.redirect_uri.clone(), config.scopes.clone());

    let identity =
        interactive::run_interactive_auth(&flows, &store, strategy, config.oauth_callback_port)
            .await?;
    eprintln!("Credentials stored for {}.", identity);
    Ok(())
}

async fn run_status(config: Config) -> Result<()> {
    if clasp::session_available(&config.clasprc_path) {
        println!("clasp session: available ({})", config.clasprc_path.display());
    } else {
        println!("clasp session: not found");
    }

    let store = CredentialStore::new(config.credentials_path.clone());
    let identities = store.identities().await?;
    if identities.is_empty() {
        println!("stored credentials: none");
        return Ok(());
    }
    println!("stored credentials:");
    for (identity, credential) in identities {
        let expiry = match credential.expires_at {
            Some(at) => format!("expires at {}", at),
            None => "no recorded expiry".to_string(),
        };
        println!(
            "  {} ({}, {}, refresh token {})",
            identity,
            credential.strategy,
            expiry,
            if credential.refresh_token.is_some() {
                "present"
            } else {
                "absent"
            },
        );
    }
    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let store = Arc::new(CredentialStore::new(config.credentials_path.clone()));

    // OAuth keys are optional: a clasp session alone can back every tool.
    let (flows, refresher) = match ClientKeys::load(&config.oauth_keys_path) {
        Ok(keys) => {
            let refresher = TokenRefresher::with_endpoint(keys.token_uri.clone());
            let flows = Arc::new(FlowCoordinator::new(
                keys,
                config.redirect_uri.clone(),
                config.scopes.clone(),
            ));
            (Some(flows), refresher)
        }
        Err(e) => {
            tracing::info!("OAuth keys unavailable ({}); running with clasp only", e);
            (None, TokenRefresher::new())
        }
    };

    let resolver = Arc::new(CredentialResolver::new(
        store.clone(),
        refresher,
        config.clasprc_path.clone(),
    ));
    let workspace = Arc::new(WorkspaceClient::new(resolver));

    let tool_handler = ToolHandler::new(
        workspace,
        flows,
        store,
        config.clasprc_path.clone(),
        config.oauth_keys_path.clone(),
    );

    tracing::info!(
        "starting Workspace MCP server v{}; authentication: clasp (recommended) or OAuth 2.0/2.1",
        env!("CARGO_PKG_VERSION")
    );

    let mut server = McpServer::new(tool_handler);
    server.run_stdio().await
}
