//! aya-client - editor-side client for the Aya language server
//!
//! Manages the connection to `aya-lsp` over one of three transport
//! topologies, supervises the server process, and keeps a semantic
//! highlight overlay in sync with what the server reports.

pub mod app;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod highlight;
pub mod infra;
pub mod models;
pub mod services;

#[cfg(test)]
mod testing;

pub use error::{AyaError, AyaResult};
