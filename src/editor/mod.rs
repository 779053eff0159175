//! Editor host capabilities
//!
//! The narrow surface the client needs from whatever editor it runs in.
//! Everything UI-specific stays behind [`EditorHost`].

mod headless;

pub use headless::{HeadlessEditor, RenderedDecoration};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::HostError;
use crate::highlight::style::DecorationStyle;
use crate::models::lsp::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EditorId(pub u32);

impl std::fmt::Display for EditorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "editor#{}", self.0)
    }
}

/// A visible editor and the document it shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorRef {
    pub id: EditorId,
    pub uri: String,
}

/// Ownership token for one decoration instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DecorationHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
}

/// A directed selection: `anchor` stays put, `active` is the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn new(anchor: Position, active: Position) -> Self {
        Self { anchor, active }
    }

    /// Empty selection with the cursor at `position`
    pub fn caret(position: Position) -> Self {
        Self::new(position, position)
    }

    /// The covered range, start before end whatever the direction
    pub fn range(&self) -> Range {
        Range {
            start: self.anchor.min(self.active),
            end: self.anchor.max(self.active),
        }
    }
}

/// Forward selection over `range`, cursor at its end
impl From<Range> for Selection {
    fn from(range: Range) -> Self {
        Self::new(range.start, range.end)
    }
}

/// Editor notifications the client reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    ActiveEditorChanged(Option<EditorRef>),
    DocumentChanged { uri: String, content_changed: bool },
    DocumentClosed { uri: String },
}

#[async_trait]
pub trait EditorHost: Send + Sync {
    fn active_editor(&self) -> Option<EditorRef>;

    fn visible_editors(&self) -> Vec<EditorRef>;

    fn is_document_open(&self, uri: &str) -> bool;

    fn document_text(&self, uri: &str) -> Option<String>;

    /// Paint `ranges` in `editor`; the decoration lives until disposed
    fn create_decoration(
        &self,
        editor: EditorId,
        style: &DecorationStyle,
        ranges: &[Range],
        hover: Option<&str>,
    ) -> DecorationHandle;

    fn dispose_decoration(&self, handle: DecorationHandle);

    fn selection(&self, editor: EditorId) -> Option<Selection>;

    fn set_selection(&self, editor: EditorId, selection: Selection);

    /// Persist unsaved changes
    async fn save(&self, uri: &str) -> Result<(), HostError>;

    fn show_message(&self, level: MessageLevel, text: &str);
}
