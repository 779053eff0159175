//! Doctor command - language server and Java runtime discovery report

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::infra::lsp::discovery::{JavaLocation, SearchEnv, endpoint_for, find_java, find_server};

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Also start a session and report the server's handshake
    #[arg(long)]
    pub connect: bool,
}

#[derive(Serialize)]
struct DoctorResponse {
    enabled: bool,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    server: ServerEntry,
    java: JavaLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    handshake: Option<HandshakeEntry>,
}

#[derive(Serialize)]
struct ServerEntry {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HandshakeEntry {
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handshake(app: &App) -> HandshakeEntry {
    let failed = |error: String| HandshakeEntry {
        connected: false,
        server: None,
        peer: None,
        error: Some(error),
    };

    match app.start().await {
        Ok(true) => {
            let info = app
                .session()
                .capabilities()
                .await
                .and_then(|caps| caps.server_info)
                .map(|info| match info.version {
                    Some(version) => format!("{} {}", info.name, version),
                    None => info.name,
                });
            HandshakeEntry {
                connected: true,
                server: info,
                peer: app.session().peer().await,
                error: None,
            }
        }
        Ok(false) => failed("language server unavailable".to_string()),
        Err(e) => failed(e.to_string()),
    }
}

pub async fn execute(args: DoctorArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let config = app.config();
    let env = SearchEnv::from_process();

    let server = match find_server(&config.lsp, &env) {
        Ok(path) => ServerEntry {
            found: true,
            path: Some(path.display().to_string()),
            error: None,
        },
        Err(e) => ServerEntry {
            found: false,
            path: None,
            error: Some(e.to_string()),
        },
    };

    let handshake = if args.connect {
        let entry = handshake(app).await;
        app.shutdown().await;
        Some(entry)
    } else {
        None
    };

    ctx.print_success_flat(DoctorResponse {
        enabled: config.lsp.enabled,
        mode: config.lsp.mode.as_str(),
        endpoint: endpoint_for(config, &env).ok().map(|e| e.to_string()),
        server,
        java: find_java(&config.java, &env),
        handshake,
    });
    Ok(())
}
