//! Global Runtime Configuration
//!
//! Timeouts for the bounded parts of a session. Ordinary requests are
//! deliberately unbounded: the server may spend a long time type-checking,
//! and there is no mid-flight cancellation.

use std::sync::OnceLock;
use std::time::Duration;

use crate::models::config::ClientConfig;

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Request,
    Initialization,
    Shutdown,
}

impl OperationType {
    pub fn from_method(method: &str) -> Self {
        match method {
            "initialize" => Self::Initialization,
            "shutdown" => Self::Shutdown,
            _ => Self::Request,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub connect_timeout: Duration,
    pub accept_timeout: Duration,
    pub initialize_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for RuntimeConfig {
    fn from(config: &ClientConfig) -> Self {
        let t = &config.timeouts;
        Self {
            connect_timeout: Duration::from_secs(t.connect_secs),
            accept_timeout: Duration::from_secs(t.accept_secs),
            initialize_timeout: Duration::from_secs(t.initialize_secs),
            shutdown_timeout: Duration::from_secs(t.shutdown_secs),
        }
    }
}

impl RuntimeConfig {
    /// Upper bound for a JSON-RPC round trip, `None` when unbounded
    pub fn timeout_for(&self, method: &str) -> Option<Duration> {
        match OperationType::from_method(method) {
            OperationType::Initialization => Some(self.initialize_timeout),
            OperationType::Shutdown => Some(self.shutdown_timeout),
            OperationType::Request => None,
        }
    }
}

pub fn init(config: &ClientConfig) {
    let _ = CONFIG.set(RuntimeConfig::from(config));
}

pub fn runtime() -> RuntimeConfig {
    CONFIG.get().copied().unwrap_or_default()
}
