//! Semantic highlight overlay
//!
//! Caches the server's symbol annotations per document and keeps the
//! editor's decorations in step with the cache.

mod engine;
pub mod style;

pub use engine::HighlightEngine;
pub use style::{DecorationStyle, style_for};
