//! User-invoked actions against the active editor
//!
//! Every action follows the same steps: pick the active editor, save and
//! sync its document, issue one request and route the tagged result.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::session::SessionManager;
use crate::editor::{EditorHost, EditorRef};
use crate::error::{AyaError, AyaResult};
use crate::highlight::HighlightEngine;
use crate::models::compute::{ComputeTermParams, ComputeTermResult};
use crate::models::highlight::HighlightResult;

pub mod methods {
    pub const LOAD: &str = "aya/load";
    pub const COMPUTE_TYPE: &str = "aya/computeType";
    pub const COMPUTE_NF: &str = "aya/computeNF";
    pub const PUBLISH_HIGHLIGHT: &str = "aya/publishSyntaxHighlight";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Load,
    ComputeType,
    ComputeNf,
}

impl ActionKind {
    pub fn method(self) -> &'static str {
        match self {
            Self::Load => methods::LOAD,
            Self::ComputeType => methods::COMPUTE_TYPE,
            Self::ComputeNf => methods::COMPUTE_NF,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.method())
    }
}

/// Result of an action, tagged by shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionOutcome {
    Highlights(HighlightResult),
    Computed(ComputeTermResult),
}

pub struct ActionRunner {
    session: Arc<SessionManager>,
    host: Arc<dyn EditorHost>,
    engine: Arc<Mutex<HighlightEngine>>,
}

impl ActionRunner {
    pub fn new(
        session: Arc<SessionManager>,
        host: Arc<dyn EditorHost>,
        engine: Arc<Mutex<HighlightEngine>>,
    ) -> Self {
        Self {
            session,
            host,
            engine,
        }
    }

    /// Run `kind` and route its result; failures are logged and swallowed
    pub async fn run(&self, kind: ActionKind) -> Option<ActionOutcome> {
        match self.try_run(kind).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("{} failed: {}", kind, e);
                None
            }
        }
    }

    /// `Ok(None)` when there is no active editor or the server pushes
    /// highlights instead of returning them
    pub async fn try_run(&self, kind: ActionKind) -> AyaResult<Option<ActionOutcome>> {
        let Some(editor) = self.host.active_editor() else {
            tracing::debug!("{} ignored: no active editor", kind);
            return Ok(None);
        };

        self.host.save(&editor.uri).await?;
        let text = self.host.document_text(&editor.uri).unwrap_or_default();
        self.session.sync_document(&editor.uri, &text).await?;

        let outcome = match kind {
            ActionKind::Load => self
                .session
                .request::<Option<HighlightResult>>(kind.method(), Some(json!(editor.uri)))
                .await?
                .map(ActionOutcome::Highlights),
            ActionKind::ComputeType | ActionKind::ComputeNf => {
                let position = self
                    .host
                    .selection(editor.id)
                    .map(|selection| selection.active)
                    .unwrap_or_default();
                let params = ComputeTermParams {
                    uri: editor.uri.clone(),
                    position,
                };
                let params: Value = serde_json::to_value(&params)
                    .map_err(|e| AyaError::Session(e.into()))?;
                let result: ComputeTermResult =
                    self.session.request(kind.method(), Some(params)).await?;
                Some(ActionOutcome::Computed(result))
            }
        };

        if let Some(outcome) = &outcome {
            self.route(&editor, outcome).await;
        }
        Ok(outcome)
    }

    async fn route(&self, editor: &EditorRef, outcome: &ActionOutcome) {
        let mut engine = self.engine.lock().await;
        match outcome {
            ActionOutcome::Highlights(result) => {
                engine.apply_highlights(self.host.as_ref(), result.clone());
            }
            ActionOutcome::Computed(result) => {
                engine.show_computed(self.host.as_ref(), editor, result);
            }
        }
    }

    pub async fn restart(&self) -> bool {
        match self.session.restart().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Restart failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{HeadlessEditor, Selection};
    use crate::infra::lsp::process::MemorySink;
    use crate::infra::lsp::protocol::error_codes;
    use crate::models::highlight::{Symbol, SymbolKind};
    use crate::models::lsp::{Position, Range};
    use crate::testing::{FakeProvider, FakeServer, start_session};
    use tokio::sync::mpsc;

    const URI: &str = "file:///a.aya";

    struct Fixture {
        runner: Arc<ActionRunner>,
        host: Arc<HeadlessEditor>,
        engine: Arc<Mutex<HighlightEngine>>,
        server: FakeServer,
        _servers: mpsc::UnboundedReceiver<FakeServer>,
    }

    async fn fixture() -> Fixture {
        let (provider, mut servers) = FakeProvider::new();
        let session = Arc::new(SessionManager::new(provider, Arc::new(MemorySink::default())));
        let server = start_session(&session, &mut servers).await;

        let host = Arc::new(HeadlessEditor::new());
        host.open_document(URI, "def a => 1");
        host.show(URI).unwrap();
        let engine = Arc::new(Mutex::new(HighlightEngine::new()));
        let runner = Arc::new(ActionRunner::new(
            session,
            Arc::clone(&host) as Arc<dyn EditorHost>,
            Arc::clone(&engine),
        ));
        Fixture {
            runner,
            host,
            engine,
            server,
            _servers: servers,
        }
    }

    #[tokio::test]
    async fn test_load_routes_highlights() {
        let mut fx = fixture().await;
        let runner = Arc::clone(&fx.runner);
        let task = tokio::spawn(async move { runner.run(ActionKind::Load).await });

        let open = fx.server.expect_notification("textDocument/didOpen").await;
        assert_eq!(open.params.unwrap()["textDocument"]["text"], "def a => 1");
        let load = fx.server.expect_request(methods::LOAD).await;
        assert_eq!(load.params, Some(json!(URI)));
        fx.server
            .respond(
                load.id,
                json!({
                    "uri": URI,
                    "symbols": [{
                        "range": {"start": {"line": 0, "character": 4}, "end": {"line": 0, "character": 5}},
                        "kind": "FnDef"
                    }]
                }),
            )
            .await;

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, Some(ActionOutcome::Highlights(_))));
        assert_eq!(fx.host.all_decorations().len(), 1);
        assert_eq!(fx.host.saves(), vec![URI.to_string()]);
    }

    #[tokio::test]
    async fn test_load_with_pushed_highlights_returns_nothing() {
        let mut fx = fixture().await;
        let runner = Arc::clone(&fx.runner);
        let task = tokio::spawn(async move { runner.run(ActionKind::Load).await });

        let load = fx.server.expect_request(methods::LOAD).await;
        fx.server.respond(load.id, Value::Null).await;

        assert!(task.await.unwrap().is_none());
        assert!(fx.host.all_decorations().is_empty());
    }

    #[tokio::test]
    async fn test_compute_type_marks_and_selects() {
        let mut fx = fixture().await;
        let editor = fx.host.active_editor().unwrap();
        fx.host
            .set_selection(editor.id, Selection::caret(Position::new(0, 9)));

        let runner = Arc::clone(&fx.runner);
        let task = tokio::spawn(async move { runner.run(ActionKind::ComputeType).await });

        let request = fx.server.expect_request(methods::COMPUTE_TYPE).await;
        let params = request.params.unwrap();
        assert_eq!(params["uri"], URI);
        assert_eq!(params["position"], json!({"line": 0, "character": 9}));
        fx.server
            .respond(
                request.id,
                json!({
                    "uri": URI,
                    "computedType": "Nat",
                    "range": {"start": {"line": 0, "character": 9}, "end": {"line": 0, "character": 10}}
                }),
            )
            .await;

        let outcome = task.await.unwrap();
        assert!(matches!(
            outcome,
            Some(ActionOutcome::Computed(ref r)) if r.computed == "Nat"
        ));
        assert_eq!(
            fx.host.selection(editor.id),
            Some(Selection::from(Range::from_coords(0, 9, 0, 10)))
        );
        assert_eq!(fx.host.decorations(editor.id)[0].hover.as_deref(), Some("Nat"));
    }

    #[tokio::test]
    async fn test_compute_queries_the_cursor_end() {
        let mut fx = fixture().await;
        let editor = fx.host.active_editor().unwrap();
        fx.host.set_selection(
            editor.id,
            Selection::new(Position::new(0, 8), Position::new(0, 4)),
        );

        let runner = Arc::clone(&fx.runner);
        let task = tokio::spawn(async move { runner.run(ActionKind::ComputeNf).await });
        let request = fx.server.expect_request(methods::COMPUTE_NF).await;
        assert_eq!(
            request.params.unwrap()["position"],
            json!({"line": 0, "character": 4})
        );
        fx.server
            .respond(
                request.id,
                json!({
                    "uri": URI,
                    "computed": "zero",
                    "range": {"start": {"line": 0, "character": 4}, "end": {"line": 0, "character": 8}}
                }),
            )
            .await;
        task.await.unwrap();

        // The marked result leaves the cursor at its end
        let runner = Arc::clone(&fx.runner);
        let task = tokio::spawn(async move { runner.run(ActionKind::ComputeType).await });
        let request = fx.server.expect_request(methods::COMPUTE_TYPE).await;
        assert_eq!(
            request.params.unwrap()["position"],
            json!({"line": 0, "character": 8})
        );
        fx.server
            .respond_error(request.id, error_codes::INTERNAL_ERROR, "no term here")
            .await;
        assert!(task.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backend_error_changes_nothing() {
        let mut fx = fixture().await;
        let editor = fx.host.active_editor().unwrap();
        let selection = Selection::caret(Position::new(0, 2));
        fx.host.set_selection(editor.id, selection);
        let cached = HighlightResult {
            uri: URI.to_string(),
            symbols: vec![Symbol::new(
                Range::from_coords(0, 4, 0, 5),
                SymbolKind::FnDef,
            )],
        };
        fx.engine
            .lock()
            .await
            .apply_highlights(fx.host.as_ref(), cached.clone());
        let decorations = fx.host.all_decorations();

        let runner = Arc::clone(&fx.runner);
        let task = tokio::spawn(async move { runner.try_run(ActionKind::ComputeNf).await });
        let request = fx.server.expect_request(methods::COMPUTE_NF).await;
        fx.server
            .respond_error(request.id, error_codes::INTERNAL_ERROR, "no term here")
            .await;

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            AyaError::Session(crate::error::SessionError::Backend { .. })
        ));
        let engine = fx.engine.lock().await;
        assert_eq!(engine.cached(URI), Some(cached.symbols.as_slice()));
        assert_eq!(fx.host.selection(editor.id), Some(selection));
        assert_eq!(fx.host.all_decorations(), decorations);
    }

    #[tokio::test]
    async fn test_no_active_editor_is_a_no_op() {
        let (provider, _servers) = FakeProvider::new();
        let session = Arc::new(SessionManager::new(
            provider.clone(),
            Arc::new(MemorySink::default()),
        ));
        let runner = ActionRunner::new(
            session,
            Arc::new(HeadlessEditor::new()),
            Arc::new(Mutex::new(HighlightEngine::new())),
        );

        assert!(runner.try_run(ActionKind::Load).await.unwrap().is_none());
        assert_eq!(provider.opens(), 0);
    }

    #[tokio::test]
    async fn test_not_ready_session_is_logged_not_raised() {
        let (provider, _servers) = FakeProvider::new();
        let session = Arc::new(SessionManager::new(provider, Arc::new(MemorySink::default())));
        let host = Arc::new(HeadlessEditor::new());
        host.open_document(URI, "");
        host.show(URI).unwrap();
        let runner = ActionRunner::new(
            session,
            host,
            Arc::new(Mutex::new(HighlightEngine::new())),
        );

        assert!(runner.run(ActionKind::ComputeType).await.is_none());
        assert!(!runner.restart().await);
    }
}
