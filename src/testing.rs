//! In-memory language server for tests
//!
//! A [`FakeServer`] speaks the same framing as the real backend over a
//! `tokio::io::duplex` pipe; [`FakeProvider`] hands one out per connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::error::SessionError;
use crate::infra::lsp::connection::{Connection, Endpoint, TransportProvider};
use crate::infra::lsp::protocol::{
    Message, Notification, Request, RequestId, Response, ResponseError,
};
use crate::infra::lsp::transport::{
    BoxedReader, BoxedWriter, Transport, write_notification, write_request, write_response,
};
use crate::services::session::SessionManager;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FakeServer {
    transport: Transport,
    writer: BoxedWriter,
}

impl FakeServer {
    /// Client-side stream halves plus the server end
    pub fn pair() -> (BoxedReader, BoxedWriter, FakeServer) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);
        let server = FakeServer {
            transport: Transport::new(Box::new(server_read)),
            writer: Box::new(server_write),
        };
        (Box::new(client_read), Box::new(client_write), server)
    }

    pub async fn recv(&mut self) -> Message {
        timeout(RECV_TIMEOUT, self.transport.read_message())
            .await
            .expect("timed out waiting for client message")
            .expect("client stream closed")
    }

    /// True once the client has dropped its side of the stream
    pub async fn is_closed(&mut self) -> bool {
        matches!(
            timeout(RECV_TIMEOUT, self.transport.read_message()).await,
            Ok(Err(_))
        )
    }

    /// Next request with `method`, skipping anything else
    pub async fn expect_request(&mut self, method: &str) -> Request {
        loop {
            if let Message::Request(request) = self.recv().await
                && request.method == method
            {
                return request;
            }
        }
    }

    pub async fn expect_notification(&mut self, method: &str) -> Notification {
        loop {
            if let Message::Notification(notification) = self.recv().await
                && notification.method == method
            {
                return notification;
            }
        }
    }

    pub async fn expect_response(&mut self) -> Response {
        loop {
            if let Message::Response(response) = self.recv().await {
                return response;
            }
        }
    }

    pub async fn respond(&mut self, id: RequestId, result: Value) {
        write_response(&mut self.writer, &Response::success(id, result))
            .await
            .expect("write response");
    }

    pub async fn respond_error(&mut self, id: RequestId, code: i32, message: &str) {
        write_response(
            &mut self.writer,
            &Response::failure(id, ResponseError::new(code, message)),
        )
        .await
        .expect("write error response");
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        write_notification(&mut self.writer, &Notification::new(method, Some(params)))
            .await
            .expect("write notification");
    }

    pub async fn send_request(&mut self, id: u64, method: &str, params: Value) {
        write_request(&mut self.writer, &Request::new(id, method, Some(params)))
            .await
            .expect("write request");
    }

    /// Write bytes to the client unframed
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write raw bytes");
        self.writer.flush().await.expect("flush raw bytes");
    }

    /// Answer `initialize` and wait for `initialized`
    pub async fn handshake(&mut self) {
        let init = self.expect_request("initialize").await;
        self.respond(
            init.id,
            json!({
                "capabilities": {},
                "serverInfo": { "name": "fake-aya", "version": "0.0.0" }
            }),
        )
        .await;
        self.expect_notification("initialized").await;
    }

    /// Answer `shutdown` and wait for `exit`
    pub async fn accept_shutdown(&mut self) {
        let shutdown = self.expect_request("shutdown").await;
        self.respond(shutdown.id, Value::Null).await;
        self.expect_notification("exit").await;
    }
}

/// Transport provider that opens in-memory connections
pub struct FakeProvider {
    servers: mpsc::UnboundedSender<FakeServer>,
    opens: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeProvider {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            servers: tx,
            opens: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        });
        (provider, rx)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Make the next `open` fail like a refused connection
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportProvider for FakeProvider {
    async fn open(&self, endpoint: &Endpoint) -> Result<Connection, SessionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SessionError::connect(endpoint.to_string(), "connection refused"));
        }
        let (reader, writer, server) = FakeServer::pair();
        let _ = self.servers.send(server);
        Ok(Connection {
            reader,
            writer,
            process: None,
            peer: endpoint.to_string(),
        })
    }
}

pub fn fake_endpoint() -> Endpoint {
    Endpoint::TcpClient {
        host: "fake".to_string(),
        port: 11451,
    }
}

/// Start `session` against the next fake server and complete the handshake
pub async fn start_session(
    session: &Arc<SessionManager>,
    servers: &mut mpsc::UnboundedReceiver<FakeServer>,
) -> FakeServer {
    let start = tokio::spawn({
        let session = Arc::clone(session);
        async move { session.start(fake_endpoint()).await }
    });
    let mut server = servers.recv().await.expect("provider opened no connection");
    server.handshake().await;
    start.await.expect("start task panicked").expect("start failed");
    server
}
