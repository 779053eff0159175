use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::protocol::{
    ClientInfo, InitializeParams, InitializeResult, LogMessageParams, Message, MessageType,
    Notification, Request, RequestId, Response, ResponseError, error_codes,
};
use super::transport::{BoxedReader, BoxedWriter, Transport, write_payload};
use crate::error::SessionError;

type PendingRequest = oneshot::Sender<Response>;

/// Callback for one server notification method
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Method → handler table, shared across reconnects
pub type HandlerTable = Arc<RwLock<HashMap<String, NotificationHandler>>>;

pub const LANGUAGE_ID: &str = "aya";

#[derive(Debug)]
struct DocumentState {
    version: u32,
    content_hash: u64,
}

impl DocumentState {
    fn new(content: &str) -> Self {
        Self {
            version: 1,
            content_hash: crate::infra::hash_content(content),
        }
    }

    fn needs_update(&self, new_content: &str) -> bool {
        crate::infra::hash_content(new_content) != self.content_hash
    }

    fn update(&mut self, new_content: &str) {
        self.version += 1;
        self.content_hash = crate::infra::hash_content(new_content);
    }
}

/// JSON-RPC client over one framed connection
///
/// Writes are serialized through a single writer lock, so requests reach
/// the wire in call order. A background task reads frames in wire order and
/// resolves pending requests by id, whatever order the server answers in.
pub struct RpcClient {
    writer: Mutex<Option<BoxedWriter>>,
    next_id: AtomicU64,
    pending: RwLock<HashMap<RequestId, PendingRequest>>,
    handlers: HandlerTable,
    documents: RwLock<HashMap<String, DocumentState>>,
    capabilities: RwLock<Option<InitializeResult>>,
    reader_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    closing: AtomicBool,
    terminated: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl RpcClient {
    /// Wire a client over an open stream and start reading
    pub fn connect(reader: BoxedReader, writer: BoxedWriter, handlers: HandlerTable) -> Arc<Self> {
        let (closed_tx, _) = watch::channel(false);
        let client = Arc::new(Self {
            writer: Mutex::new(Some(writer)),
            next_id: AtomicU64::new(1),
            pending: RwLock::new(HashMap::new()),
            handlers,
            documents: RwLock::new(HashMap::new()),
            capabilities: RwLock::new(None),
            reader_task: std::sync::Mutex::new(None),
            closing: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            closed_tx,
        });

        let reader_client = Arc::clone(&client);
        let task = tokio::spawn(async move {
            reader_client.read_messages(Transport::new(reader)).await;
        });
        if let Ok(mut slot) = client.reader_task.lock() {
            *slot = Some(task);
        }

        client
    }

    /// Watch that flips to `true` when the server side goes away
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// LSP initialize handshake
    pub async fn initialize(
        &self,
        root_uri: Option<String>,
    ) -> Result<InitializeResult, SessionError> {
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri,
            capabilities: Self::client_capabilities(),
            client_info: Some(ClientInfo {
                name: "aya-client".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            initialization_options: None,
        };

        let result: InitializeResult = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        if let Some(info) = &result.server_info {
            tracing::info!(
                "Connected to {} {}",
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        }
        *self.capabilities.write().await = Some(result.clone());

        self.notify("initialized", Some(serde_json::json!({})))
            .await?;
        Ok(result)
    }

    /// Only what this client actually does: full-text sync, no dynamic features
    fn client_capabilities() -> Value {
        serde_json::json!({
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "didSave": false
                }
            },
            "window": {
                "workDoneProgress": true,
                "showMessage": {}
            },
            "workspace": {
                "configuration": true
            }
        })
    }

    pub async fn capabilities(&self) -> Option<InitializeResult> {
        self.capabilities.read().await.clone()
    }

    /// Send a request and wait for the matching response
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, SessionError> {
        if self.is_terminated() {
            return Err(SessionError::Terminated);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(RequestId::Number(id), tx);

        tracing::trace!("LSP request {}: {}", id, method);
        let request = Request::new(id, method, params);
        if let Err(e) = self.send(&request).await {
            self.pending.write().await.remove(&RequestId::Number(id));
            return Err(e);
        }

        let response = match crate::config::runtime().timeout_for(method) {
            Some(limit) => match timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.write().await.remove(&RequestId::Number(id));
                    return Err(SessionError::Timeout(format!(
                        "'{}' timed out after {}s",
                        method,
                        limit.as_secs()
                    )));
                }
            },
            None => rx.await,
        };

        let response =
            response.map_err(|_| SessionError::Cancelled(format!("{method} was abandoned")))?;
        let value = response.into_result()?;
        serde_json::from_value(value).map_err(|e| SessionError::Protocol(e.to_string()))
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SessionError> {
        let notification = Notification::new(method, params);
        self.send(&notification).await
    }

    /// Write one framed payload under the writer lock
    async fn send<T: Serialize>(&self, payload: &T) -> Result<(), SessionError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::Terminated)?;
        write_payload(writer, payload).await.map_err(SessionError::from)
    }

    /// Open or refresh a document on the server
    ///
    /// Sends `didOpen` the first time and `didChange` (full text) when the
    /// content hash moved. Unchanged text sends nothing.
    pub async fn sync_document(&self, uri: &str, content: &str) -> Result<(), SessionError> {
        let mut documents = self.documents.write().await;

        if let Some(state) = documents.get_mut(uri) {
            if state.needs_update(content) {
                state.update(content);
                self.notify(
                    "textDocument/didChange",
                    Some(serde_json::json!({
                        "textDocument": { "uri": uri, "version": state.version },
                        "contentChanges": [{ "text": content }]
                    })),
                )
                .await?;
            }
            return Ok(());
        }

        let state = DocumentState::new(content);
        self.notify(
            "textDocument/didOpen",
            Some(serde_json::json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": LANGUAGE_ID,
                    "version": state.version,
                    "text": content
                }
            })),
        )
        .await?;
        documents.insert(uri.to_string(), state);
        Ok(())
    }

    pub async fn close_document(&self, uri: &str) -> Result<(), SessionError> {
        if self.documents.write().await.remove(uri).is_none() {
            return Ok(());
        }
        self.notify(
            "textDocument/didClose",
            Some(serde_json::json!({ "textDocument": { "uri": uri } })),
        )
        .await
    }

    /// Orderly LSP shutdown: `shutdown` then `exit`, then close
    pub async fn shutdown(&self) {
        match self.request::<Value>("shutdown", None).await {
            Ok(_) => {
                if let Err(e) = self.notify("exit", None).await {
                    tracing::debug!("LSP exit notification failed: {}", e);
                }
            }
            Err(e) => tracing::debug!("LSP shutdown request failed: {}", e),
        }
        self.close("Server shutdown").await;
    }

    /// Drop the connection and reject everything still outstanding
    pub async fn close(&self, reason: &str) {
        self.closing.store(true, Ordering::Release);
        self.abort_reader();
        self.writer.lock().await.take();
        self.cancel_pending_requests(error_codes::REQUEST_CANCELLED, reason)
            .await;
    }

    /// Stop the reader task without touching async state
    pub fn abort_reader(&self) {
        self.closing.store(true, Ordering::Release);
        if let Ok(mut slot) = self.reader_task.lock()
            && let Some(task) = slot.take()
        {
            task.abort();
        }
    }

    /// Background task that reads and dispatches messages
    async fn read_messages(self: Arc<Self>, mut transport: Transport) {
        let mut guard = ReaderGuard {
            client: self.as_ref(),
            armed: true,
        };
        loop {
            match transport.read_message().await {
                Ok(message) => self.handle_message(message).await,
                Err(e) => {
                    if !self.closing.load(Ordering::Acquire) {
                        tracing::error!("LSP read error: {}", e);
                        self.terminated.store(true, Ordering::Release);
                        self.writer.lock().await.take();
                        self.cancel_pending_requests(
                            error_codes::SERVER_TERMINATED,
                            "Aya language server terminated unexpectedly",
                        )
                        .await;
                        self.closed_tx.send_replace(true);
                    }
                    break;
                }
            }
        }
        guard.armed = false;
    }

    /// Synchronous teardown for a reader that stopped without reaching EOF
    fn fail_reader(&self) {
        tracing::error!("LSP reader task stopped abnormally");
        self.terminated.store(true, Ordering::Release);
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        match self.pending.try_write() {
            Ok(mut pending) => {
                for (id, sender) in pending.drain() {
                    let _ = sender.send(Response::failure(
                        id,
                        ResponseError::new(
                            error_codes::SERVER_TERMINATED,
                            "Aya language server reader failed",
                        ),
                    ));
                }
            }
            Err(_) => tracing::warn!("Pending requests locked while reader unwound"),
        }
        self.closed_tx.send_replace(true);
    }

    async fn cancel_pending_requests(&self, code: i32, reason: &str) {
        let mut pending = self.pending.write().await;
        if !pending.is_empty() {
            tracing::debug!("Cancelling {} pending requests: {}", pending.len(), reason);
        }
        for (id, sender) in pending.drain() {
            let _ = sender.send(Response::failure(id, ResponseError::new(code, reason)));
        }
    }

    async fn handle_message(self: &Arc<Self>, message: Message) {
        match message {
            Message::Response(response) => {
                let Some(id) = response.id.clone() else {
                    tracing::debug!("Dropping response without id: {:?}", response.error);
                    return;
                };
                let mut pending = self.pending.write().await;
                // Some servers echo numeric ids back as strings
                let sender = pending.remove(&id).or_else(|| match &id {
                    RequestId::String(s) => s
                        .parse::<u64>()
                        .ok()
                        .and_then(|n| pending.remove(&RequestId::Number(n))),
                    RequestId::Number(_) => None,
                });
                match sender {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!("Response for unknown request ID {:?}", id),
                }
            }
            Message::Request(request) => self.handle_server_request(request),
            Message::Notification(notification) => self.dispatch_notification(notification).await,
        }
    }

    async fn dispatch_notification(&self, notification: Notification) {
        let method = notification.method.as_str();
        let params = notification.params.unwrap_or(Value::Null);

        if matches!(method, "window/logMessage" | "window/showMessage") {
            Self::log_server_message(&params);
        }

        let handler = self.handlers.read().await.get(method).cloned();
        match handler {
            Some(handler) => handler(params),
            None if method.starts_with("window/") => {}
            None => tracing::trace!("Unhandled notification: {}", method),
        }
    }

    fn log_server_message(params: &Value) {
        let Ok(params) = serde_json::from_value::<LogMessageParams>(params.clone()) else {
            return;
        };
        let message = params.message.trim_end();
        match params.kind {
            MessageType::Error => tracing::error!("LSP: {}", message),
            MessageType::Warning => tracing::warn!("LSP: {}", message),
            MessageType::Info => tracing::info!("LSP: {}", message),
            MessageType::Log => tracing::debug!("LSP: {}", message),
        }
    }

    /// Answer a server request off the reader task
    fn handle_server_request(self: &Arc<Self>, request: Request) {
        let result = match request.method.as_str() {
            "workspace/configuration" => Ok(Self::empty_configuration(&request.params)),
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create" => Ok(Value::Null),
            _ => {
                tracing::debug!("Unhandled server request: {}", request.method);
                Err(ResponseError::new(
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                ))
            }
        };

        let response = match result {
            Ok(value) => Response::success(request.id, value),
            Err(error) => Response::failure(request.id, error),
        };
        let client = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = client.send(&response).await {
                tracing::debug!("Failed to answer server request: {}", e);
            }
        });
    }

    /// One empty settings object per requested item
    fn empty_configuration(params: &Option<Value>) -> Value {
        let items = params
            .as_ref()
            .and_then(|p| p.get("items"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        Value::Array(vec![Value::Object(serde_json::Map::new()); items])
    }
}

/// Fails the connection if the reader unwinds or is dropped mid-loop
struct ReaderGuard<'a> {
    client: &'a RpcClient,
    armed: bool,
}

impl Drop for ReaderGuard<'_> {
    fn drop(&mut self) {
        if self.armed && !self.client.closing.load(Ordering::Acquire) {
            self.client.fail_reader();
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.abort_reader();
    }
}
