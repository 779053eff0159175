//! Data models for aya-client
//!
//! Contains core type definitions used throughout the application.

pub mod compute;
pub mod config;
pub mod highlight;
pub mod lsp;
pub mod session;

// Re-export commonly used types
pub use compute::{ComputeTermParams, ComputeTermResult};
pub use config::{ClientConfig, TransportMode};
pub use highlight::{HighlightResult, Symbol, SymbolKind};
pub use lsp::{Position, Range};
pub use session::SessionState;
