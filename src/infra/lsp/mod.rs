//! LSP Infrastructure for aya-client
//!
//! Everything between the session and the bytes on the wire:
//! - JSON-RPC 2.0 protocol types and Content-Length framing
//! - Transport topologies (stdio, TCP client, TCP server with dial-back)
//! - Process supervision with log draining
//! - A JSON-RPC client with id correlation and notification dispatch
//! - Server and Java discovery

pub mod client;
pub mod connection;
pub mod discovery;
pub mod process;
pub mod protocol;
pub mod transport;

pub use client::{HandlerTable, NotificationHandler, RpcClient};
pub use connection::{Connection, DefaultTransportProvider, Endpoint, TransportProvider};
pub use discovery::{Discovery, SearchEnv};
pub use process::{ExitEvent, LogSink, ProcessSpec, ProcessSupervisor, TracingLogSink};
