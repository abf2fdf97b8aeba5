//! Workspace MCP Server Library
//!
//! A Model Context Protocol (MCP) server for Google Workspace (Gmail,
//! Drive, Sheets, Calendar, Docs) with unified authentication across
//! clasp CLI-session delegation, OAuth 2.0, and OAuth 2.1/PKCE.

pub mod auth;
pub mod config;
pub mod error;
pub mod mcp;
pub mod workspace;

pub use config::Config;
pub use error::{Result, WorkspaceMcpError};
