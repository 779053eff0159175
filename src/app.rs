//! Application container for aya-client
//!
//! Owns the session, the highlight engine and the editor host, and runs the
//! single dispatcher task that feeds editor events and pushed highlights to
//! the engine in arrival order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::cli::OutputContext;
use crate::config;
use crate::editor::{EditorEvent, EditorHost, HeadlessEditor, MessageLevel};
use crate::error::{AyaResult, DiscoveryError};
use crate::highlight::HighlightEngine;
use crate::infra::lsp::discovery::{SearchEnv, endpoint_for};
use crate::infra::lsp::{DefaultTransportProvider, LogSink, TracingLogSink, TransportProvider};
use crate::models::config::ClientConfig;
use crate::models::highlight::HighlightResult;
use crate::models::lsp::path_to_uri;
use crate::services::actions::{ActionKind, ActionOutcome, ActionRunner, methods};
use crate::services::config::{ConfigService, DefaultConfigService};
use crate::services::session::SessionManager;

/// Work for the dispatcher task
#[derive(Debug)]
pub enum AppEvent {
    Editor(EditorEvent),
    Highlights(HighlightResult),
    /// Resolved once every earlier event has been handled
    Barrier(oneshot::Sender<()>),
}

pub struct Dispatcher {
    tx: mpsc::UnboundedSender<AppEvent>,
    task: JoinHandle<()>,
}

impl Dispatcher {
    pub fn spawn(host: Arc<dyn EditorHost>, engine: Arc<Mutex<HighlightEngine>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    AppEvent::Editor(event) => {
                        engine.lock().await.handle_event(host.as_ref(), &event);
                    }
                    AppEvent::Highlights(result) => {
                        engine.lock().await.apply_highlights(host.as_ref(), result);
                    }
                    AppEvent::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx, task }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub fn send(&self, event: AppEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Dispatcher stopped; event dropped");
        }
    }

    /// Wait until everything sent so far has been handled
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(AppEvent::Barrier(done));
        let _ = wait.await;
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct App {
    root: PathBuf,
    pub(crate) output: OutputContext,
    pub(crate) config_service: Arc<dyn ConfigService>,
    pub(crate) config: ClientConfig,
    pub(crate) editor: Arc<HeadlessEditor>,
    pub(crate) session: Arc<SessionManager>,
    pub(crate) engine: Arc<Mutex<HighlightEngine>>,
    actions: ActionRunner,
    dispatcher: Dispatcher,
    announced: AtomicBool,
}

impl App {
    pub async fn new() -> anyhow::Result<Self> {
        let root = std::env::current_dir()?;

        tracing::debug!("Initializing aya-client at {:?}", root);

        let config_service = Arc::new(DefaultConfigService::new(&root));
        let config = config_service.load(false).await.unwrap_or_else(|e| {
            tracing::warn!("Using default configuration: {}", e);
            ClientConfig::default()
        });

        config::init(&config);

        let sink: Arc<dyn LogSink> = Arc::new(TracingLogSink);
        let provider = Arc::new(DefaultTransportProvider::new(
            Arc::clone(&sink),
            &config::runtime(),
        ));
        Ok(Self::with_parts(root, config, config_service, provider, sink).await)
    }

    pub async fn with_parts(
        root: PathBuf,
        config: ClientConfig,
        config_service: Arc<dyn ConfigService>,
        provider: Arc<dyn TransportProvider>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let session = Arc::new(
            SessionManager::new(provider, sink).with_root_uri(path_to_uri(&root)),
        );
        let editor = Arc::new(HeadlessEditor::new());
        let host: Arc<dyn EditorHost> = editor.clone();
        let engine = Arc::new(Mutex::new(HighlightEngine::new()));
        let dispatcher = Dispatcher::spawn(Arc::clone(&host), Arc::clone(&engine));

        let events = dispatcher.sender();
        session
            .on_notification(methods::PUBLISH_HIGHLIGHT, move |params: Value| {
                match serde_json::from_value::<HighlightResult>(params) {
                    Ok(result) => {
                        let _ = events.send(AppEvent::Highlights(result));
                    }
                    Err(e) => tracing::debug!("Malformed highlight notification: {}", e),
                }
            })
            .await;

        let actions = ActionRunner::new(Arc::clone(&session), host, Arc::clone(&engine));

        Self {
            output: OutputContext::new(root.clone()),
            root,
            config_service,
            config,
            editor,
            session,
            engine,
            actions,
            dispatcher,
            announced: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn editor(&self) -> &HeadlessEditor {
        &self.editor
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Resolve the configured endpoint and start the session
    ///
    /// Returns `false` when the server is disabled or cannot be found; the
    /// user is told once through the editor host.
    pub async fn start(&self) -> anyhow::Result<bool> {
        let endpoint = match endpoint_for(&self.config, &SearchEnv::from_process()) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                let level = match e {
                    DiscoveryError::Disabled => MessageLevel::Info,
                    DiscoveryError::NotFound => MessageLevel::Warning,
                };
                if !self.announced.swap(true, Ordering::SeqCst) {
                    self.editor.show_message(level, &e.to_string());
                }
                return Ok(false);
            }
        };

        tracing::info!("Starting Aya language server ({})", endpoint);
        self.session.start(endpoint).await?;
        Ok(true)
    }

    /// Open a file and make it the active editor
    pub async fn open(&self, path: &Path) -> anyhow::Result<String> {
        let uri = self.editor.open_file(path).await?;
        let event = self.editor.show(&uri)?;
        self.dispatcher.send(AppEvent::Editor(event));
        Ok(uri)
    }

    /// Forward an editor event to the engine
    pub fn notify_editor(&self, event: EditorEvent) {
        self.dispatcher.send(AppEvent::Editor(event));
    }

    pub async fn run(&self, kind: ActionKind) -> Option<ActionOutcome> {
        self.dispatcher.flush().await;
        let outcome = self.actions.run(kind).await;
        self.dispatcher.flush().await;
        outcome
    }

    /// Like [`App::run`] but reports the failure instead of logging it
    pub async fn try_run(&self, kind: ActionKind) -> AyaResult<Option<ActionOutcome>> {
        self.dispatcher.flush().await;
        let outcome = self.actions.try_run(kind).await;
        self.dispatcher.flush().await;
        outcome
    }

    pub async fn restart(&self) -> bool {
        self.actions.restart().await
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.session.stop().await {
            tracing::debug!("Stop failed: {}", e);
        }
    }
}
