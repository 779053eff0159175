//! Service layer for aya-client

pub mod actions;
pub mod config;
pub mod session;

pub use actions::{ActionKind, ActionOutcome, ActionRunner};
pub use config::{ConfigService, DefaultConfigService};
pub use session::SessionManager;
