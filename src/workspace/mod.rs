//! Google Workspace API clients.
//!
//! One HTTP client shared across Gmail, Drive, Sheets, Calendar, and
//! Docs; every call resolves its identity to a credential first.

pub mod calendar;
pub mod client;
pub mod docs;
pub mod drive;
pub mod gmail;
pub mod sheets;

pub use client::WorkspaceClient;
