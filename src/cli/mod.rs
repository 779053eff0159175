//! CLI module for aya-client
//!
//! A headless front end over the editor client: open a file, run one action
//! against the Aya language server and print what an editor would show.

pub mod commands;
pub mod location;
pub mod output;
pub mod response;

pub use location::ParsedLocation;
pub use output::OutputContext;

use clap::{Parser, Subcommand};

use commands::{
    compute::ComputeArgs, config::ConfigArgs, doctor::DoctorArgs, load::LoadArgs,
};

const LONG_ABOUT: &str = r#"
aya-client - headless editor client for the Aya language server

Connects to (or launches) aya-lsp the way an editor would, runs one action
and prints the resulting decorations as JSON.

TRANSPORT MODES (lsp.mode / AYA_LSP_MODE):
  client   connect to a running server at lsp.host:lsp.port (default)
  server   listen on lsp.host:lsp.port and let the spawned server dial back
  debug    spawn the server and talk over its stdio

EXAMPLES:
  aya-client load src/Nat.aya
  aya-client compute-type src/Nat.aya:12:9
  aya-client compute-nf src/Nat.aya:12:9
  aya-client doctor
"#;

/// aya-client - headless editor client for the Aya language server
#[derive(Parser, Debug)]
#[command(name = "aya-client")]
#[command(author, version, about, long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
#[command(after_help = "Use 'aya-client <COMMAND> --help' for more information about a command.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (show debug info)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a file and print its semantic highlights
    Load(LoadArgs),

    /// Show the type of the expression at a position
    ComputeType(ComputeArgs),

    /// Show the normal form of the expression at a position
    ComputeNf(ComputeArgs),

    /// Locate the language server and Java runtime
    Doctor(DoctorArgs),

    /// Configuration management
    Config(ConfigArgs),
}

impl Commands {
    /// Whether the command talks to the language server
    pub fn needs_session(&self) -> bool {
        matches!(self, Self::Load(_) | Self::ComputeType(_) | Self::ComputeNf(_))
    }
}
