//! Transport topologies
//!
//! Turns an [`Endpoint`] into a duplex byte stream to the language server:
//! a spawned child's stdio, an outbound TCP socket, or a single accepted
//! inbound socket from a child told where to dial back.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::process::{LogSink, ProcessSpec, ProcessSupervisor, StdioRouting, SupervisedProcess};
use super::transport::{BoxedReader, BoxedWriter};
use crate::config::RuntimeConfig;
use crate::error::SessionError;
use crate::models::config::TransportMode;

/// Where and how to reach the language server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Spawn the server and talk over its stdin/stdout
    Stdio { launch: ProcessSpec },
    /// Connect to an already running server
    TcpClient { host: String, port: u16 },
    /// Listen, spawn the server with the bound port, accept its connection
    TcpServer {
        host: String,
        port: u16,
        launch: ProcessSpec,
    },
}

impl Endpoint {
    pub fn mode(&self) -> TransportMode {
        match self {
            Self::Stdio { .. } => TransportMode::StdioSpawn,
            Self::TcpClient { .. } => TransportMode::TcpClient,
            Self::TcpServer { .. } => TransportMode::TcpServer,
        }
    }

    /// Process this endpoint launches, if any
    pub fn launch(&self) -> Option<&ProcessSpec> {
        match self {
            Self::Stdio { launch } | Self::TcpServer { launch, .. } => Some(launch),
            Self::TcpClient { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio { launch } => write!(f, "stdio:{}", launch.program().display()),
            Self::TcpClient { host, port } => write!(f, "{host}:{port}"),
            Self::TcpServer { host, port, .. } => write!(f, "listen:{host}:{port}"),
        }
    }
}

/// A live stream to the server plus the child that backs it, if owned
pub struct Connection {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    pub process: Option<SupervisedProcess>,
    pub peer: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("owns_process", &self.process.is_some())
            .finish()
    }
}

#[async_trait]
pub trait TransportProvider: Send + Sync {
    /// Open exactly one connection for the endpoint
    async fn open(&self, endpoint: &Endpoint) -> Result<Connection, SessionError>;
}

pub struct DefaultTransportProvider {
    supervisor: ProcessSupervisor,
    connect_timeout: Duration,
    accept_timeout: Duration,
}

impl DefaultTransportProvider {
    pub fn new(sink: Arc<dyn LogSink>, runtime: &RuntimeConfig) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(sink),
            connect_timeout: runtime.connect_timeout,
            accept_timeout: runtime.accept_timeout,
        }
    }

    fn spawn(
        &self,
        launch: &ProcessSpec,
        args: Vec<String>,
        routing: StdioRouting,
    ) -> Result<SupervisedProcess, SessionError> {
        let spec = launch.clone().args(args);
        self.supervisor
            .sink()
            .append_line(&format!("Aya Language Server: {}", spec.program().display()));
        self.supervisor.spawn(&spec, routing)
    }

    fn open_stdio(&self, launch: &ProcessSpec) -> Result<Connection, SessionError> {
        let mut process = self.spawn(
            launch,
            mode_args(TransportMode::StdioSpawn, None),
            StdioRouting::Transport,
        )?;
        let program = launch.program().display().to_string();
        let (stdout, stdin) = process
            .take_stdio()
            .ok_or_else(|| SessionError::spawn(&program, "stdio not captured"))?;

        Ok(Connection {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            process: Some(process),
            peer: format!("stdio:{program}"),
        })
    }

    async fn open_tcp_client(&self, host: &str, port: u16) -> Result<Connection, SessionError> {
        let endpoint = format!("{host}:{port}");
        tracing::debug!("Connecting to language server at {}", endpoint);

        let stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(SessionError::connect(&endpoint, e)),
            Err(_) => {
                return Err(SessionError::connect(
                    &endpoint,
                    format!("timed out after {}s", self.connect_timeout.as_secs()),
                ));
            }
        };

        let (read_half, write_half) = stream.into_split();
        Ok(Connection {
            reader: Box::new(read_half),
            writer: Box::new(write_half),
            process: None,
            peer: endpoint,
        })
    }

    async fn open_tcp_server(
        &self,
        host: &str,
        port: u16,
        launch: &ProcessSpec,
    ) -> Result<Connection, SessionError> {
        let requested = format!("{host}:{port}");
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| SessionError::connect(&requested, e))?;
        let bound = listener
            .local_addr()
            .map_err(|e| SessionError::connect(&requested, e))?;
        tracing::debug!("Waiting for language server on {}", bound);

        let mut process = self.spawn(
            launch,
            mode_args(TransportMode::TcpServer, Some((host, bound.port()))),
            StdioRouting::Log,
        )?;

        let mut exited = process.exit_events();
        let accepted = tokio::select! {
            result = accept_one(listener, self.accept_timeout) => result,
            _ = exited.wait_for(Option::is_some) => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "language server exited before connecting",
            )),
        };

        match accepted {
            Ok((stream, peer)) => {
                let (read_half, write_half) = stream.into_split();
                Ok(Connection {
                    reader: Box::new(read_half),
                    writer: Box::new(write_half),
                    process: Some(process),
                    peer: peer.to_string(),
                })
            }
            Err(e) => {
                process.kill_and_wait().await;
                Err(SessionError::connect(bound.to_string(), e))
            }
        }
    }
}

#[async_trait]
impl TransportProvider for DefaultTransportProvider {
    async fn open(&self, endpoint: &Endpoint) -> Result<Connection, SessionError> {
        match endpoint {
            Endpoint::Stdio { launch } => self.open_stdio(launch),
            Endpoint::TcpClient { host, port } => self.open_tcp_client(host, *port).await,
            Endpoint::TcpServer { host, port, launch } => {
                self.open_tcp_server(host, *port, launch).await
            }
        }
    }
}

/// Command line the server expects for each topology
pub fn mode_args(mode: TransportMode, dial_back: Option<(&str, u16)>) -> Vec<String> {
    // The server's own names are from its point of view
    let server_mode = match mode {
        TransportMode::StdioSpawn => "debug",
        TransportMode::TcpServer => "client",
        TransportMode::TcpClient => "server",
    };
    let mut args = vec!["--mode".to_string(), server_mode.to_string()];
    if let Some((host, port)) = dial_back {
        args.extend(["--host".to_string(), host.to_string()]);
        args.extend(["--port".to_string(), port.to_string()]);
    }
    args
}

/// Accept a single connection within `wait`, then close the listener
pub async fn accept_one(
    listener: TcpListener,
    wait: Duration,
) -> io::Result<(TcpStream, SocketAddr)> {
    let result = match timeout(wait, listener.accept()).await {
        Ok(accepted) => accepted,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no connection within {}s", wait.as_secs()),
        )),
    };
    drop(listener);
    result
}
