//! Locating the Aya language server and the Java runtime it runs on

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::connection::Endpoint;
use super::process::ProcessSpec;
use crate::error::DiscoveryError;
use crate::models::config::{ClientConfig, JavaSettings, LspSettings, TransportMode};

pub fn server_binary_name() -> &'static str {
    if cfg!(windows) { "aya-lsp.bat" } else { "aya-lsp" }
}

pub fn java_binary_name() -> &'static str {
    if cfg!(windows) { "java.exe" } else { "java" }
}

/// Environment consulted by discovery, captured once so lookups are testable
#[derive(Debug, Clone, Default)]
pub struct SearchEnv {
    pub path: Option<OsString>,
    pub java_home: Option<OsString>,
}

impl SearchEnv {
    pub fn from_process() -> Self {
        Self {
            path: std::env::var_os("PATH"),
            java_home: std::env::var_os("JAVA_HOME"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JavaLocation {
    pub executable: PathBuf,
    /// The home directory the executable was found under, if any
    pub home: Option<PathBuf>,
}

/// Everything needed to launch the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discovery {
    pub server: PathBuf,
    pub java: JavaLocation,
}

impl Discovery {
    pub fn launch(&self) -> ProcessSpec {
        let spec = ProcessSpec::new(&self.server);
        match &self.java.home {
            Some(home) => spec.env("JAVA_HOME", home.display().to_string()),
            None => spec,
        }
    }
}

/// `lsp.path` when it exists, otherwise the first `aya-lsp` on `PATH`
pub fn find_server(settings: &LspSettings, env: &SearchEnv) -> Result<PathBuf, DiscoveryError> {
    if !settings.enabled {
        return Err(DiscoveryError::Disabled);
    }

    if let Some(path) = settings.path.as_deref().map(Path::new)
        && path.is_file()
    {
        return Ok(path.to_path_buf());
    }

    search_path(env.path.as_ref(), server_binary_name()).ok_or(DiscoveryError::NotFound)
}

/// `java.home`, then each `JAVA_HOME` entry, then `PATH`; bare `java` last
pub fn find_java(settings: &JavaSettings, env: &SearchEnv) -> JavaLocation {
    let binary = java_binary_name();

    let homes = settings
        .home
        .as_deref()
        .map(OsString::from)
        .into_iter()
        .chain(env.java_home.clone());
    for home in homes {
        for root in std::env::split_paths(&home) {
            let candidate = root.join("bin").join(binary);
            if candidate.is_file() {
                return JavaLocation {
                    executable: candidate,
                    home: Some(root),
                };
            }
        }
    }

    JavaLocation {
        executable: search_path(env.path.as_ref(), binary)
            .unwrap_or_else(|| PathBuf::from(binary)),
        home: None,
    }
}

fn search_path(path: Option<&OsString>, binary: &str) -> Option<PathBuf> {
    std::env::split_paths(path?)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

pub fn discover(config: &ClientConfig, env: &SearchEnv) -> Result<Discovery, DiscoveryError> {
    let server = find_server(&config.lsp, env)?;
    let java = find_java(&config.java, env);
    tracing::debug!("Found Aya language server at {}", server.display());
    Ok(Discovery { server, java })
}

/// Endpoint for the configured transport mode
///
/// Connecting to a running server needs no local executable.
pub fn endpoint_for(config: &ClientConfig, env: &SearchEnv) -> Result<Endpoint, DiscoveryError> {
    let lsp = &config.lsp;
    match lsp.mode {
        TransportMode::TcpClient => {
            if !lsp.enabled {
                return Err(DiscoveryError::Disabled);
            }
            Ok(Endpoint::TcpClient {
                host: lsp.host.clone(),
                port: lsp.port,
            })
        }
        TransportMode::StdioSpawn => Ok(Endpoint::Stdio {
            launch: discover(config, env)?.launch(),
        }),
        TransportMode::TcpServer => Ok(Endpoint::TcpServer {
            host: lsp.host.clone(),
            port: lsp.port,
            launch: discover(config, env)?.launch(),
        }),
    }
}
