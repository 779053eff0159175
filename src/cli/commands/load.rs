//! Load command implementation
//!
//! Runs `aya/load` on a file and prints the decorations an editor would
//! paint for it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::time::Instant;

use crate::app::App;
use crate::cli::response::{DecorationOutput, LoadResponse};
use crate::editor::EditorHost;
use crate::models::lsp::uri_to_path;
use crate::services::actions::ActionKind;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Aya source file
    pub file: PathBuf,

    /// How long to wait for pushed highlights when the server sends them
    /// as a notification (milliseconds)
    #[arg(long, default_value_t = 3000)]
    pub wait_ms: u64,
}

pub async fn execute(args: LoadArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let uri = super::open_in_session(app, &args.file).await?;
    let editor = app
        .editor()
        .active_editor()
        .context("No active editor after opening the file")?;

    let delivery = match app.try_run(ActionKind::Load).await? {
        Some(_) => "response",
        None => {
            let deadline = Instant::now() + Duration::from_millis(args.wait_ms);
            while app.editor().decorations(editor.id).is_empty() && Instant::now() < deadline {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            "notification"
        }
    };

    let symbols = app
        .engine
        .lock()
        .await
        .cached(&uri)
        .map_or(0, <[_]>::len);
    let decorations = app
        .editor()
        .decorations(editor.id)
        .into_iter()
        .map(DecorationOutput::from)
        .collect();

    ctx.print_success_flat(LoadResponse {
        file: ctx.relative_path(&uri_to_path(&uri)),
        mode: delivery,
        symbols,
        decorations,
    });
    Ok(())
}
