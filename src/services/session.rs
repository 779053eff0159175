//! Language server session lifecycle
//!
//! Owns the single live connection to the Aya server and the state machine
//! around it. Every transition goes through the lifecycle lock, so start,
//! stop and restart never overlap.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::SessionError;
use crate::infra::lsp::client::{HandlerTable, NotificationHandler, RpcClient};
use crate::infra::lsp::connection::{Connection, Endpoint, TransportProvider};
use crate::infra::lsp::process::{LogSink, SupervisedProcess};
use crate::infra::lsp::protocol::InitializeResult;
use crate::models::session::SessionState;

pub const RESTART_BANNER: &str = " === Language Server Restart === ";

struct ActiveConnection {
    client: Arc<RpcClient>,
    process: Option<SupervisedProcess>,
    monitor: JoinHandle<()>,
    peer: String,
}

pub struct SessionManager {
    provider: Arc<dyn TransportProvider>,
    sink: Arc<dyn LogSink>,
    handlers: HandlerTable,
    state: Arc<watch::Sender<SessionState>>,
    active: Mutex<Option<ActiveConnection>>,
    /// Held across every transition; remembers the endpoint for restart
    lifecycle: Mutex<Option<Endpoint>>,
    generation: Arc<AtomicU64>,
    root_uri: Option<String>,
    shutdown_timeout: Duration,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn TransportProvider>, sink: Arc<dyn LogSink>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            provider,
            sink,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            state: Arc::new(state),
            active: Mutex::new(None),
            lifecycle: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            root_uri: None,
            shutdown_timeout: crate::config::runtime().shutdown_timeout,
        }
    }

    pub fn with_root_uri(mut self, root_uri: impl Into<String>) -> Self {
        self.root_uri = Some(root_uri.into());
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Peer description of the live connection
    pub async fn peer(&self) -> Option<String> {
        self.active.lock().await.as_ref().map(|a| a.peer.clone())
    }

    pub async fn capabilities(&self) -> Option<InitializeResult> {
        let client = self.ready_client().await.ok()?;
        client.capabilities().await
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!("Session state: {} -> {}", previous, next);
        }
    }

    /// Connect and handshake
    ///
    /// A no-op when already Ready; a second live transport is never created.
    pub async fn start(&self, endpoint: Endpoint) -> Result<(), SessionError> {
        let mut last = self.lifecycle.lock().await;
        let state = self.state();
        if state == SessionState::Ready {
            tracing::debug!("Language server already running");
            return Ok(());
        }
        if !state.can_start() {
            return Err(SessionError::InvalidState {
                action: "start",
                state,
            });
        }

        // A connection that died while Ready is still owned until disposed here
        self.teardown(false, "Replacing lost connection").await;

        *last = Some(endpoint.clone());
        self.connect(&endpoint).await
    }

    /// Orderly shutdown, dispose, then start again with the same endpoint
    pub async fn restart(&self) -> Result<(), SessionError> {
        let last = self.lifecycle.lock().await;
        let state = self.state();
        let endpoint = match (state.can_restart(), last.as_ref()) {
            (true, Some(endpoint)) => endpoint.clone(),
            _ => {
                return Err(SessionError::InvalidState {
                    action: "restart",
                    state,
                });
            }
        };

        tracing::info!("Restarting Aya language server");
        self.set_state(SessionState::Restarting);
        self.teardown(state == SessionState::Ready, "Language server restarting")
            .await;

        self.sink.append_line("");
        self.sink.append_line(RESTART_BANNER);
        self.sink.append_line("");

        self.connect(&endpoint).await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        let _last = self.lifecycle.lock().await;
        let state = self.state();
        if !matches!(state, SessionState::Idle | SessionState::Stopped) {
            self.teardown(state == SessionState::Ready, "Session stopped")
                .await;
            tracing::info!("Aya language server stopped");
        }
        self.set_state(SessionState::Stopped);
        Ok(())
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<(), SessionError> {
        self.set_state(SessionState::Connecting);
        tracing::info!(
            "Starting Aya language server ({} mode, {})",
            endpoint.mode(),
            endpoint
        );

        let Connection {
            reader,
            writer,
            mut process,
            peer,
        } = match self.provider.open(endpoint).await {
            Ok(connection) => connection,
            Err(e) => return Err(self.fail(e)),
        };

        let client = RpcClient::connect(reader, writer, Arc::clone(&self.handlers));
        if let Err(e) = client.initialize(self.root_uri.clone()).await {
            client.close("initialize failed").await;
            if let Some(process) = process.as_mut() {
                process.kill_and_wait().await;
            }
            return Err(self.fail(e));
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut active = self.active.lock().await;
        self.set_state(SessionState::Ready);
        let monitor = self.spawn_monitor(generation, &client, process.as_ref());
        *active = Some(ActiveConnection {
            client,
            process,
            monitor,
            peer,
        });

        tracing::info!("Aya language server ready");
        Ok(())
    }

    fn fail(&self, error: SessionError) -> SessionError {
        tracing::warn!("Aya language server failed to start: {}", error);
        self.set_state(SessionState::Failed);
        error
    }

    /// Flip Ready to Failed when this generation's stream or process dies
    fn spawn_monitor(
        &self,
        generation: u64,
        client: &RpcClient,
        process: Option<&SupervisedProcess>,
    ) -> JoinHandle<()> {
        let mut closed = client.closed();
        let exit = process.map(SupervisedProcess::exit_events);
        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);

        tokio::spawn(async move {
            let process_exit = async move {
                match exit {
                    Some(mut rx) => {
                        let _ = rx.wait_for(Option::is_some).await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            let reason = tokio::select! {
                _ = closed.wait_for(|c| *c) => "connection closed",
                _ = process_exit => "process exited",
            };

            let failed = state.send_if_modified(|s| {
                if *s == SessionState::Ready && current.load(Ordering::Acquire) == generation {
                    *s = SessionState::Failed;
                    true
                } else {
                    false
                }
            });
            if failed {
                tracing::warn!("Aya language server lost: {}", reason);
            }
        })
    }

    /// Dispose the current connection and any owned process
    async fn teardown(&self, graceful: bool, reason: &str) {
        let Some(mut active) = self.active.lock().await.take() else {
            return;
        };
        active.monitor.abort();

        if graceful {
            active.client.shutdown().await;
        } else {
            active.client.close(reason).await;
        }

        if let Some(mut process) = active.process.take() {
            if graceful && timeout(self.shutdown_timeout, process.wait()).await.is_err() {
                tracing::debug!("Language server ignored exit, killing");
            }
            process.kill_and_wait().await;
        }
    }

    async fn ready_client(&self) -> Result<Arc<RpcClient>, SessionError> {
        let state = self.state();
        if state != SessionState::Ready {
            return Err(SessionError::NotReady { state });
        }
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| Arc::clone(&a.client))
            .ok_or(SessionError::NotReady { state })
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, SessionError> {
        self.ready_client().await?.request(method, params).await
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SessionError> {
        self.ready_client().await?.notify(method, params).await
    }

    /// Send the document's current text before asking about it
    pub async fn sync_document(&self, uri: &str, text: &str) -> Result<(), SessionError> {
        self.ready_client().await?.sync_document(uri, text).await
    }

    pub async fn close_document(&self, uri: &str) -> Result<(), SessionError> {
        self.ready_client().await?.close_document(uri).await
    }

    /// Register the handler for a server notification
    ///
    /// One handler per method; registering again replaces the previous one.
    /// Handlers stay registered across restarts.
    pub async fn on_notification<F>(&self, method: &str, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let handler: NotificationHandler = Arc::new(handler);
        let previous = self
            .handlers
            .write()
            .await
            .insert(method.to_string(), handler);
        if previous.is_some() {
            tracing::debug!("Replaced notification handler for {}", method);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.active.try_lock()
            && let Some(active) = guard.take()
        {
            active.monitor.abort();
            active.client.abort_reader();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::lsp::process::MemorySink;
    use crate::testing::{FakeProvider, fake_endpoint, start_session};

    fn session() -> (
        Arc<SessionManager>,
        Arc<FakeProvider>,
        tokio::sync::mpsc::UnboundedReceiver<crate::testing::FakeServer>,
        Arc<MemorySink>,
    ) {
        let (provider, servers) = FakeProvider::new();
        let sink = Arc::new(MemorySink::default());
        let session = Arc::new(SessionManager::new(provider.clone(), sink.clone()));
        (session, provider, servers, sink)
    }

    async fn wait_for_state(session: &SessionManager, wanted: SessionState) {
        let mut states = session.subscribe();
        timeout(Duration::from_secs(5), states.wait_for(|s| *s == wanted))
            .await
            .expect("state not reached")
            .unwrap();
    }

    #[tokio::test]
    async fn test_ready_only_after_handshake() {
        let (session, _provider, mut servers, _sink) = session();

        let start = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start(fake_endpoint()).await }
        });
        let mut server = servers.recv().await.unwrap();
        let init = server.expect_request("initialize").await;
        assert_eq!(session.state(), SessionState::Connecting);

        server
            .respond(init.id, serde_json::json!({"capabilities": {}}))
            .await;
        server.expect_notification("initialized").await;
        start.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_start_while_ready_is_noop() {
        let (session, provider, mut servers, _sink) = session();
        let _server = start_session(&session, &mut servers).await;

        session.start(fake_endpoint()).await.unwrap();
        assert_eq!(provider.opens(), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_request_outside_ready_is_not_ready() {
        let (session, _provider, _servers, _sink) = session();
        let err = session
            .request::<Value>("aya/load", Some(serde_json::json!("file:///a.aya")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotReady {
                state: SessionState::Idle
            }
        ));
    }

    #[tokio::test]
    async fn test_restart_disposes_old_connection_first() {
        let (session, provider, mut servers, sink) = session();
        let mut old = start_session(&session, &mut servers).await;

        let outstanding = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.request::<Value>("aya/load", None).await }
        });
        old.expect_request("aya/load").await;

        let restart = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.restart().await }
        });
        old.accept_shutdown().await;
        assert!(old.is_closed().await);

        // The new handshake starts only after the old stream is gone
        let mut new = servers.recv().await.unwrap();
        assert!(sink.contents().contains(RESTART_BANNER));
        new.handshake().await;
        restart.await.unwrap().unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(provider.opens(), 2);
        assert!(matches!(
            outstanding.await.unwrap().unwrap_err(),
            SessionError::Cancelled(_)
        ));
    }

    #[tokio::test]
    async fn test_restart_from_idle_is_invalid() {
        let (session, _provider, _servers, _sink) = session();
        assert!(matches!(
            session.restart().await.unwrap_err(),
            SessionError::InvalidState {
                action: "restart",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_start_then_manual_restart() {
        let (session, provider, mut servers, _sink) = session();
        provider.fail_next();

        let err = session.start(fake_endpoint()).await.unwrap_err();
        assert!(matches!(err, SessionError::Connect { .. }));
        assert_eq!(session.state(), SessionState::Failed);

        let restart = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.restart().await }
        });
        let mut server = servers.recv().await.unwrap();
        server.handshake().await;
        restart.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_connection_drop_fails_session() {
        let (session, _provider, mut servers, _sink) = session();
        let server = start_session(&session, &mut servers).await;

        drop(server);
        wait_for_state(&session, SessionState::Failed).await;
        assert!(session.request::<Value>("aya/load", None).await.is_err());
    }

    #[tokio::test]
    async fn test_start_from_failed_disposes_lost_connection() {
        let (session, provider, mut servers, _sink) = session();
        let server = start_session(&session, &mut servers).await;

        drop(server);
        wait_for_state(&session, SessionState::Failed).await;
        assert!(session.peer().await.is_some());

        // Disposal happens before the new transport opens, even if that fails
        provider.fail_next();
        assert!(session.start(fake_endpoint()).await.is_err());
        assert!(session.peer().await.is_none());

        start_session(&session, &mut servers).await;
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(provider.opens(), 3);
    }

    #[tokio::test]
    async fn test_stop_shuts_down() {
        let (session, _provider, mut servers, _sink) = session();
        let mut server = start_session(&session, &mut servers).await;

        let stop = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.stop().await }
        });
        server.accept_shutdown().await;
        stop.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.peer().await.is_none());
    }

    #[tokio::test]
    async fn test_handlers_replace_and_survive_restart() {
        let (session, _provider, mut servers, _sink) = session();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let stale = tx.clone();
        session
            .on_notification("aya/publishSyntaxHighlight", move |_| {
                let _ = stale.send("old");
            })
            .await;
        session
            .on_notification("aya/publishSyntaxHighlight", move |_| {
                let _ = tx.send("new");
            })
            .await;

        let mut old = start_session(&session, &mut servers).await;
        let restart = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.restart().await }
        });
        old.accept_shutdown().await;
        let mut server = servers.recv().await.unwrap();
        server.handshake().await;
        restart.await.unwrap().unwrap();

        server
            .notify(
                "aya/publishSyntaxHighlight",
                serde_json::json!({"uri": "file:///a.aya", "symbols": []}),
            )
            .await;
        assert_eq!(rx.recv().await, Some("new"));
        assert!(rx.try_recv().is_err());
    }
}
