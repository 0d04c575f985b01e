//! Ghostrun Server
//!
//! HTTP API that runs whitelisted Claude Code slash commands in a project
//! directory and relays their progress as JSON or server-sent events.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use ghostrun_core::config::load_config;
use ghostrun_core::tracing_init::{LogFormat, init_tracing};
use ghostrun_server::executor::Executor;
use ghostrun_server::notify::{DesktopNotifier, NtfyNotifier};
use ghostrun_server::server::{AppState, build_router};

#[derive(Parser, Debug)]
#[command(name = "ghostrun-server")]
#[command(version, about = "Ghostrun server - remote control for Claude Code")]
struct Args {
    /// Config file (default: <config dir>/ghostrun/config.toml)
    #[arg(long, env = "GHOSTRUN_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long)]
    bind: Option<String>,

    /// Path to the `claude` CLI binary, overrides the config file
    #[arg(long)]
    claude_bin: Option<PathBuf>,

    /// Execution timeout in seconds, overrides the config file
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Directory whose subdirectories are listed as projects
    #[arg(long)]
    projects_dir: Option<PathBuf>,

    /// ntfy.sh topic for completion notifications
    #[arg(long)]
    ntfy_topic: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "GHOSTRUN_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(
        "ghostrun_server=info,ghostrun_core=info,tower_http=info",
        LogFormat::from_json_flag(args.log_json),
    );

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(claude_bin) = args.claude_bin {
        config.executor.claude_bin = claude_bin;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.executor.timeout_secs = timeout_secs;
    }
    if let Some(dir) = args.projects_dir {
        config.server.projects_dir = Some(dir);
    }
    if let Some(topic) = args.ntfy_topic {
        config.notifications.ntfy_topic = Some(topic);
    }
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.server.bind,
        claude_bin = %config.executor.claude_bin.display(),
        timeout_secs = config.executor.timeout_secs,
        "Starting ghostrun-server"
    );

    let mut executor = Executor::new(&config.executor);
    if let Some(notifier) = NtfyNotifier::from_config(&config.notifications)? {
        executor = executor.with_observer(Arc::new(notifier));
    }
    if let Some(notifier) = DesktopNotifier::from_config(&config.notifications) {
        executor = executor.with_observer(Arc::new(notifier));
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    let app = build_router(AppState::new(config, executor));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Received shutdown signal");
}
