//! compute-type / compute-nf implementation

use anyhow::{Context, Result};
use clap::Args;

use crate::app::App;
use crate::cli::ParsedLocation;
use crate::cli::response::ComputeResponse;
use crate::editor::{EditorHost, Selection};
use crate::services::actions::{ActionKind, ActionOutcome};

#[derive(Args, Debug)]
pub struct ComputeArgs {
    /// File path with position (file:line[:column])
    pub location: String,
}

pub async fn execute(args: ComputeArgs, kind: ActionKind, app: &App) -> Result<()> {
    let ctx = &app.output;
    let loc = ParsedLocation::parse(&args.location)?.to_absolute()?;

    super::open_in_session(app, &loc.file).await?;
    let editor = app
        .editor()
        .active_editor()
        .context("No active editor after opening the file")?;
    app.editor()
        .set_selection(editor.id, Selection::caret(loc.position()));

    let label = match kind {
        ActionKind::ComputeNf => "normal-form",
        _ => "type",
    };
    match app.try_run(kind).await? {
        Some(ActionOutcome::Computed(result)) => {
            ctx.print_success_flat(ComputeResponse::new(
                ctx.relative_path(&loc.file),
                label,
                result,
            ));
        }
        _ => ctx.print_error(&format!("No {} at {}", label, loc)),
    }
    Ok(())
}
