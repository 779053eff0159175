//! In-memory editor host
//!
//! Backs the CLI and the tests: documents, visible editors and decorations
//! are plain data that can be inspected afterwards.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use super::{
    DecorationHandle, EditorEvent, EditorHost, EditorId, EditorRef, MessageLevel, Selection,
};
use crate::error::HostError;
use crate::highlight::style::DecorationStyle;
use crate::models::lsp::{Range, path_to_uri};

/// A live decoration as the host sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDecoration {
    pub handle: DecorationHandle,
    pub editor: EditorId,
    pub style: DecorationStyle,
    pub ranges: Vec<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover: Option<String>,
}

#[derive(Debug)]
struct Document {
    text: String,
    path: Option<PathBuf>,
    dirty: bool,
}

#[derive(Debug)]
struct View {
    id: EditorId,
    uri: String,
    selection: Selection,
}

impl View {
    fn as_ref(&self) -> EditorRef {
        EditorRef {
            id: self.id,
            uri: self.uri.clone(),
        }
    }
}

#[derive(Default)]
struct HeadlessState {
    documents: HashMap<String, Document>,
    views: Vec<View>,
    active: Option<EditorId>,
    decorations: BTreeMap<DecorationHandle, RenderedDecoration>,
    disposed: Vec<DecorationHandle>,
    next_editor: u32,
    next_handle: u64,
    messages: Vec<(MessageLevel, String)>,
    saves: Vec<String>,
}

impl HeadlessState {
    fn view(&self, id: EditorId) -> Option<&View> {
        self.views.iter().find(|v| v.id == id)
    }
}

#[derive(Default)]
pub struct HeadlessEditor {
    state: Mutex<HeadlessState>,
}

impl HeadlessEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open an unsaved, in-memory document
    pub fn open_document(&self, uri: impl Into<String>, text: impl Into<String>) {
        self.state().documents.insert(
            uri.into(),
            Document {
                text: text.into(),
                path: None,
                dirty: false,
            },
        );
    }

    /// Open a file from disk, returning its URI
    pub async fn open_file(&self, path: &Path) -> std::io::Result<String> {
        let path = tokio::fs::canonicalize(path).await?;
        let text = tokio::fs::read_to_string(&path).await?;
        let uri = path_to_uri(&path);
        self.state().documents.insert(
            uri.clone(),
            Document {
                text,
                path: Some(path),
                dirty: false,
            },
        );
        Ok(uri)
    }

    /// Show an open document in an editor and focus it
    pub fn show(&self, uri: &str) -> Result<EditorEvent, HostError> {
        let mut state = self.state();
        if !state.documents.contains_key(uri) {
            return Err(HostError::UnknownDocument(uri.to_string()));
        }

        let id = match state.views.iter().find(|v| v.uri == uri) {
            Some(view) => view.id,
            None => {
                state.next_editor += 1;
                let id = EditorId(state.next_editor);
                state.views.push(View {
                    id,
                    uri: uri.to_string(),
                    selection: Selection::default(),
                });
                id
            }
        };
        state.active = Some(id);
        Ok(EditorEvent::ActiveEditorChanged(
            state.view(id).map(View::as_ref),
        ))
    }

    /// Replace a document's text as if the user typed it
    pub fn edit(&self, uri: &str, text: impl Into<String>) -> Result<EditorEvent, HostError> {
        let mut state = self.state();
        let document = state
            .documents
            .get_mut(uri)
            .ok_or_else(|| HostError::UnknownDocument(uri.to_string()))?;

        let text = text.into();
        let content_changed = document.text != text;
        if content_changed {
            document.text = text;
            document.dirty = true;
        }
        Ok(EditorEvent::DocumentChanged {
            uri: uri.to_string(),
            content_changed,
        })
    }

    /// Close a document and every editor showing it
    pub fn close(&self, uri: &str) -> EditorEvent {
        let mut state = self.state();
        state.documents.remove(uri);
        state.views.retain(|v| v.uri != uri);
        if let Some(active) = state.active
            && state.view(active).is_none()
        {
            state.active = None;
        }
        EditorEvent::DocumentClosed {
            uri: uri.to_string(),
        }
    }

    pub fn decorations(&self, editor: EditorId) -> Vec<RenderedDecoration> {
        self.state()
            .decorations
            .values()
            .filter(|d| d.editor == editor)
            .cloned()
            .collect()
    }

    pub fn all_decorations(&self) -> Vec<RenderedDecoration> {
        self.state().decorations.values().cloned().collect()
    }

    pub fn disposed(&self) -> Vec<DecorationHandle> {
        self.state().disposed.clone()
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.state().messages.clone()
    }

    pub fn saves(&self) -> Vec<String> {
        self.state().saves.clone()
    }
}

#[async_trait]
impl EditorHost for HeadlessEditor {
    fn active_editor(&self) -> Option<EditorRef> {
        let state = self.state();
        state.active.and_then(|id| state.view(id)).map(View::as_ref)
    }

    fn visible_editors(&self) -> Vec<EditorRef> {
        self.state().views.iter().map(View::as_ref).collect()
    }

    fn is_document_open(&self, uri: &str) -> bool {
        self.state().documents.contains_key(uri)
    }

    fn document_text(&self, uri: &str) -> Option<String> {
        self.state().documents.get(uri).map(|d| d.text.clone())
    }

    fn create_decoration(
        &self,
        editor: EditorId,
        style: &DecorationStyle,
        ranges: &[Range],
        hover: Option<&str>,
    ) -> DecorationHandle {
        let mut state = self.state();
        state.next_handle += 1;
        let handle = DecorationHandle(state.next_handle);
        state.decorations.insert(
            handle,
            RenderedDecoration {
                handle,
                editor,
                style: style.clone(),
                ranges: ranges.to_vec(),
                hover: hover.map(str::to_string),
            },
        );
        handle
    }

    fn dispose_decoration(&self, handle: DecorationHandle) {
        let mut state = self.state();
        if state.decorations.remove(&handle).is_some() {
            state.disposed.push(handle);
        }
    }

    fn selection(&self, editor: EditorId) -> Option<Selection> {
        self.state().view(editor).map(|v| v.selection)
    }

    fn set_selection(&self, editor: EditorId, selection: Selection) {
        if let Some(view) = self.state().views.iter_mut().find(|v| v.id == editor) {
            view.selection = selection;
        }
    }

    async fn save(&self, uri: &str) -> Result<(), HostError> {
        let pending = {
            let state = self.state();
            let document = state
                .documents
                .get(uri)
                .ok_or_else(|| HostError::UnknownDocument(uri.to_string()))?;
            match (&document.path, document.dirty) {
                (Some(path), true) => Some((path.clone(), document.text.clone())),
                _ => None,
            }
        };

        if let Some((path, text)) = pending {
            tokio::fs::write(&path, text)
                .await
                .map_err(|e| HostError::Save {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;
        }

        let mut state = self.state();
        if let Some(document) = state.documents.get_mut(uri) {
            document.dirty = false;
        }
        state.saves.push(uri.to_string());
        Ok(())
    }

    fn show_message(&self, level: MessageLevel, text: &str) {
        match level {
            MessageLevel::Info => tracing::info!("{}", text),
            MessageLevel::Warning => tracing::warn!("{}", text),
        }
        self.state().messages.push((level, text.to_string()));
    }
}
