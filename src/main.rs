//! aya-client - headless editor client for the Aya language server

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aya_client::app::App;
use aya_client::cli::{Cli, Commands};
use aya_client::services::actions::ActionKind;

fn main() {
    let cli = Cli::parse();

    // Quiet by default so stdout stays machine-readable
    // Use RUST_LOG=aya_client=debug (or --verbose) for more
    let default_filter = if cli.verbose {
        "aya_client=debug"
    } else {
        "aya_client=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!(
                r#"{{"success":false,"error":"Failed to create runtime: {}"}}"#,
                e
            );
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(async_main(cli));

    if let Err(e) = result {
        let response = serde_json::json!({
            "success": false,
            "error": e.to_string()
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .unwrap_or_else(|_| format!(r#"{{"success":false,"error":"{}"}}"#, e))
        );
        std::process::exit(2);
    }
}

async fn async_main(cli: Cli) -> anyhow::Result<()> {
    let app = App::new()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize: {}", e))?;

    let needs_session = cli.command.needs_session();
    let result = execute_command(cli.command, &app).await;
    if needs_session {
        app.shutdown().await;
    }
    result
}

async fn execute_command(command: Commands, app: &App) -> anyhow::Result<()> {
    use aya_client::cli::commands;

    match command {
        Commands::Load(args) => commands::load::execute(args, app).await,
        Commands::ComputeType(args) => {
            commands::compute::execute(args, ActionKind::ComputeType, app).await
        }
        Commands::ComputeNf(args) => {
            commands::compute::execute(args, ActionKind::ComputeNf, app).await
        }
        Commands::Doctor(args) => commands::doctor::execute(args, app).await,
        Commands::Config(args) => commands::config::execute(args, app).await,
    }
}
