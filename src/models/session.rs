//! Session lifecycle states

use serde::Serialize;

/// Lifecycle of the single logical connection to the language server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Ready,
    Restarting,
    Failed,
    Stopped,
}

impl SessionState {
    /// States from which `start` may open a new connection
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Failed | Self::Stopped)
    }

    pub fn can_restart(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Connecting | Self::Restarting)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Restarting => "restarting",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_guards() {
        assert!(SessionState::Idle.can_start());
        assert!(SessionState::Stopped.can_start());
        assert!(!SessionState::Ready.can_start());
        assert!(SessionState::Failed.can_restart());
        assert!(!SessionState::Idle.can_restart());
        assert!(SessionState::Restarting.is_transitional());
    }
}
