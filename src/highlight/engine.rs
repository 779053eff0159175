use std::collections::HashMap;

use super::style::{DecorationStyle, style_for};
use crate::editor::{DecorationHandle, EditorEvent, EditorHost, EditorId, EditorRef};
use crate::models::compute::ComputeTermResult;
use crate::models::highlight::{HighlightResult, Symbol, SymbolKind};
use crate::models::lsp::Range;

/// Decorations this engine currently owns in one editor
#[derive(Debug, Default)]
struct EditorDecorations {
    uri: String,
    highlights: Vec<DecorationHandle>,
    computed: Option<DecorationHandle>,
}

impl EditorDecorations {
    fn dispose_highlights(&mut self, host: &dyn EditorHost) {
        for handle in self.highlights.drain(..) {
            host.dispose_decoration(handle);
        }
    }

    fn dispose_all(&mut self, host: &dyn EditorHost) {
        self.dispose_highlights(host);
        if let Some(handle) = self.computed.take() {
            host.dispose_decoration(handle);
        }
    }
}

/// Per-document highlight cache plus the decorations rendered from it
///
/// Every handle the engine creates is recorded and disposed before it is
/// replaced, so a document never shows the union of two highlight sets.
#[derive(Debug, Default)]
pub struct HighlightEngine {
    cache: HashMap<String, Vec<Symbol>>,
    rendered: HashMap<EditorId, EditorDecorations>,
}

impl HighlightEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, uri: &str) -> Option<&[Symbol]> {
        self.cache.get(uri).map(Vec::as_slice)
    }

    /// Number of live decorations the engine owns in `editor`
    pub fn live_handles(&self, editor: EditorId) -> usize {
        self.rendered.get(&editor).map_or(0, |r| {
            r.highlights.len() + usize::from(r.computed.is_some())
        })
    }

    /// Replace the highlight set for a document and repaint it
    ///
    /// Payloads for documents the editor no longer has open are dropped.
    /// Returns whether the payload was accepted.
    pub fn apply_highlights(&mut self, host: &dyn EditorHost, result: HighlightResult) -> bool {
        let HighlightResult { uri, symbols } = result;
        if !host.is_document_open(&uri) {
            tracing::debug!("Dropping highlights for {} (not open)", uri);
            return false;
        }

        for decorations in self.rendered.values_mut().filter(|r| r.uri == uri) {
            decorations.dispose_highlights(host);
        }
        tracing::debug!("Caching {} symbols for {}", symbols.len(), uri);
        self.cache.insert(uri.clone(), symbols);

        let visible: Vec<_> = host
            .visible_editors()
            .into_iter()
            .filter(|e| e.uri == uri)
            .collect();
        for editor in &visible {
            self.render(host, editor);
        }
        true
    }

    /// Repaint `editor` from the cache; safe to call repeatedly
    pub fn show_for_visible_editor(&mut self, host: &dyn EditorHost, editor: &EditorRef) {
        let decorations = self.rendered.entry(editor.id).or_default();
        if decorations.uri != editor.uri {
            decorations.dispose_all(host);
            decorations.uri = editor.uri.clone();
        } else {
            decorations.dispose_highlights(host);
        }
        self.render(host, editor);
    }

    /// Remove every decoration from `editor`; the cache is kept
    pub fn clear(&mut self, host: &dyn EditorHost, editor: EditorId) {
        if let Some(decorations) = self.rendered.get_mut(&editor) {
            decorations.dispose_all(host);
        }
    }

    pub fn handle_event(&mut self, host: &dyn EditorHost, event: &EditorEvent) {
        match event {
            EditorEvent::ActiveEditorChanged(Some(editor)) => {
                self.show_for_visible_editor(host, editor);
            }
            EditorEvent::ActiveEditorChanged(None) => {}
            EditorEvent::DocumentChanged {
                uri,
                content_changed,
            } => {
                if !content_changed {
                    return;
                }
                match host.active_editor() {
                    Some(active) if active.uri == *uri => self.clear(host, active.id),
                    _ => tracing::debug!("Ignoring edit to inactive document {}", uri),
                }
            }
            EditorEvent::DocumentClosed { uri } => {
                self.rendered.retain(|_, decorations| {
                    if decorations.uri == *uri {
                        decorations.dispose_all(host);
                        false
                    } else {
                        true
                    }
                });
                self.cache.remove(uri);
            }
        }
    }

    /// Mark a computed type or normal form and select its range
    pub fn show_computed(
        &mut self,
        host: &dyn EditorHost,
        editor: &EditorRef,
        result: &ComputeTermResult,
    ) -> bool {
        if editor.uri != result.uri {
            tracing::debug!(
                "Ignoring computed term for {} in {}",
                result.uri,
                editor.uri
            );
            return false;
        }

        let decorations = self.rendered.entry(editor.id).or_default();
        if decorations.uri != editor.uri {
            decorations.dispose_all(host);
            decorations.uri = editor.uri.clone();
        }
        if let Some(old) = decorations.computed.take() {
            host.dispose_decoration(old);
        }
        decorations.computed = Some(host.create_decoration(
            editor.id,
            &DecorationStyle::computed(),
            &[result.range],
            Some(&result.computed),
        ));
        host.set_selection(editor.id, result.range.into());
        true
    }

    /// One decoration per style, in kind order
    fn render(&mut self, host: &dyn EditorHost, editor: &EditorRef) {
        let Some(symbols) = self.cache.get(&editor.uri) else {
            return;
        };

        let mut groups: HashMap<SymbolKind, Vec<Range>> = HashMap::new();
        for symbol in symbols {
            if !symbol.range.is_well_formed() {
                tracing::debug!("Skipping inverted range {}", symbol.range);
                continue;
            }
            groups.entry(symbol.kind).or_default().push(symbol.range);
        }

        let decorations = self.rendered.entry(editor.id).or_default();
        decorations.uri = editor.uri.clone();
        for kind in SymbolKind::ALL {
            let (Some(ranges), Some(style)) = (groups.get(&kind), style_for(kind)) else {
                continue;
            };
            decorations
                .highlights
                .push(host.create_decoration(editor.id, &style, ranges, None));
        }
    }
}
