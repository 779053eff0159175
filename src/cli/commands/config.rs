//! Config command implementation

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::App;
use crate::models::config::ClientConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Initialize configuration file
    Init {
        /// Initialize global config (~/.config/aya-client)
        #[arg(long)]
        global: bool,

        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    Show {
        /// Show global config only
        #[arg(long)]
        global: bool,
    },

    /// Show config file path
    Path {
        /// Show global config path
        #[arg(long)]
        global: bool,
    },
}

#[derive(Serialize)]
struct ConfigInitResponse {
    status: &'static str,
    path: String,
    level: &'static str,
}

#[derive(Serialize)]
struct ConfigShowResponse<'a> {
    level: &'static str,
    config: &'a ClientConfig,
}

#[derive(Serialize)]
struct ConfigPathResponse {
    level: &'static str,
    path: String,
    exists: bool,
}

pub async fn execute(args: ConfigArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let display = |path: &std::path::Path, global: bool| {
        if global {
            path.display().to_string()
        } else {
            ctx.relative_path(path)
        }
    };

    match args.command {
        ConfigCommand::Init { global, force } => {
            let level = if global { "global" } else { "project" };
            match app.config_service.init(global, force).await {
                Ok(path) => ctx.print_success_flat(ConfigInitResponse {
                    status: "created",
                    path: display(&path, global),
                    level,
                }),
                Err(e) => ctx.print_error(&e.to_string()),
            }
        }

        ConfigCommand::Show { global } => {
            let level = if global { "global" } else { "merged" };
            match app.config_service.load(global).await {
                Ok(config) => ctx.print_success_flat(ConfigShowResponse {
                    level,
                    config: &config,
                }),
                Err(e) => ctx.print_error(&e.to_string()),
            }
        }

        ConfigCommand::Path { global } => {
            let path = app.config_service.config_path(global);
            ctx.print_success_flat(ConfigPathResponse {
                level: if global { "global" } else { "project" },
                path: display(&path, global),
                exists: path.exists(),
            });
        }
    }

    Ok(())
}
