//! Configuration model for aya-client
//!
//! Mirrors the editor-side settings surface: enable flag, transport mode,
//! host/port, backend path override and the Java home override.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// aya-client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub lsp: LspSettings,

    #[serde(default)]
    pub java: JavaSettings,

    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

/// Transport topology between the editor and the language server
///
/// Config names follow the editor's point of view:
/// `client` dials a running server, `server` listens and lets the
/// spawned server dial back, `debug` talks over the child's stdio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    #[serde(rename = "debug")]
    StdioSpawn,
    #[serde(rename = "client")]
    TcpClient,
    #[serde(rename = "server")]
    TcpServer,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StdioSpawn => "debug",
            Self::TcpClient => "client",
            Self::TcpServer => "server",
        }
    }

    /// Whether this topology spawns and owns the server process
    pub fn owns_process(self) -> bool {
        !matches!(self, Self::TcpClient)
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "stdio" => Ok(Self::StdioSpawn),
            "client" => Ok(Self::TcpClient),
            "server" => Ok(Self::TcpServer),
            other => Err(format!(
                "unknown transport mode '{other}' (expected: server, client, debug)"
            )),
        }
    }
}

/// Language server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LspSettings {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::mode")]
    pub mode: TransportMode,

    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Explicit path to the `aya-lsp` launcher
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for LspSettings {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            mode: defaults::mode(),
            host: defaults::host(),
            port: defaults::port(),
            path: None,
        }
    }
}

/// Java runtime used by the server launcher
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JavaSettings {
    #[serde(default)]
    pub home: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutSettings {
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// How long `server` mode waits for the spawned server to dial back
    #[serde(default = "defaults::accept_secs")]
    pub accept_secs: u64,

    #[serde(default = "defaults::initialize_secs")]
    pub initialize_secs: u64,

    #[serde(default = "defaults::shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            accept_secs: defaults::accept_secs(),
            initialize_secs: defaults::initialize_secs(),
            shutdown_secs: defaults::shutdown_secs(),
        }
    }
}

mod defaults {
    use super::TransportMode;

    // LSP
    pub fn enabled() -> bool {
        true
    }
    pub fn mode() -> TransportMode {
        TransportMode::TcpClient
    }
    pub fn host() -> String {
        "localhost".to_string()
    }
    pub fn port() -> u16 {
        11451
    }

    // Timeouts
    pub fn connect_secs() -> u64 {
        10
    }
    pub fn accept_secs() -> u64 {
        30
    }
    pub fn initialize_secs() -> u64 {
        60
    }
    pub fn shutdown_secs() -> u64 {
        2
    }
}
