//! Command implementations for aya-client
//!
//! Each command is implemented in its own module.

pub mod compute;
pub mod config;
pub mod doctor;
pub mod load;

use std::path::Path;

use anyhow::{Result, bail};

use crate::app::App;

/// Start the session and make `file` the active editor
pub(crate) async fn open_in_session(app: &App, file: &Path) -> Result<String> {
    if !app.start().await? {
        let reason = app
            .editor()
            .messages()
            .pop()
            .map(|(_, text)| text)
            .unwrap_or_else(|| "Aya language server is unavailable".to_string());
        bail!(reason);
    }
    app.open(file).await
}
