use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use terminal_bridge::Orchestrator;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::prelude::*;

use kube_terminal::{
    AppState, CliOverrides, FileConfig, KubeExecTransport, KubeconfigResolver, ServerConfig,
    load_config, router,
};

#[derive(Parser)]
#[command(name = "kube-terminal")]
#[command(about = "Browser terminal sessions into Kubernetes pods")]
struct Args {
    /// Config file (TOML); KUBE_TERMINAL_* env vars override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the web server
    #[arg(short, long)]
    port: Option<u16>,

    /// Kubeconfig file (defaults to ~/.kube/config or in-cluster config)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_directive = if args.debug {
        "kube_terminal=debug,terminal_bridge=debug,tower_http=debug,info"
    } else {
        "kube_terminal=info,terminal_bridge=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let mut file_config: FileConfig = load_config(args.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;
    file_config.apply(CliOverrides {
        host: args.host,
        port: args.port,
        kubeconfig: args.kubeconfig,
    });
    let config = ServerConfig::from_file(&file_config)?;

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        Orchestrator::new(
            KubeconfigResolver,
            KubeExecTransport,
            config.orchestrator.clone(),
        ),
        config.commands.clone(),
        config.bridge.clone(),
        config.close.clone(),
        shutdown.clone(),
    );
    let app = router(state.clone(), &config.path);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Kube Terminal listening on http://{}", actual_addr);
    info!(
        "  GET {}?namespace=..&pod=..[&container=..][&context=..] - terminal WebSocket",
        config.path
    );
    info!("  GET /health - liveness");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        info!("Received shutdown signal, closing sessions...");
        signal_token.cancel();
    });

    let server_token = shutdown.clone();
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await
        .context("Server error");

    // Upgraded sockets outlive the HTTP server; wait for their sessions to close.
    shutdown.cancel();
    let sessions = state.sessions();
    sessions.close();
    sessions.wait().await;
    info!("All terminal sessions closed");

    server_result
}
