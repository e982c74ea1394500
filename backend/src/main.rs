//! Tether MCP server.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tether::{config::Config, create_app_with_config, session, state::AppState};

/// Tether - session-addressed MCP Streamable HTTP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides config files and TETHER_SERVER__PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Extra TOML config file, merged after the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PostgreSQL URL for the database listing tool
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(args.config, args.port, args.database_url)?;
    let _log_guard = init_logging(&config)?;
    info!("Configuration loaded");

    if config.capabilities.database_url.is_none() {
        info!("No database URL configured; the database listing tool will fail when called");
    }
    if config.session.sliding_expiry {
        info!("Sessions expire {}s after their last request", config.session.ttl_secs);
    } else {
        info!("Sessions expire {}s after creation", config.session.ttl_secs);
    }

    let state = AppState::from_config(&config);
    let reaper = session::spawn_reaper(state.sessions(), config.session.reap_interval());

    let app = create_app_with_config(state.clone(), config.cors_allowed_origins.clone()).await;

    // Bind to 0.0.0.0 so the server is reachable from containers; Host checks still apply
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let sessions = state.sessions();
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, shutting down gracefully...");

        // Open SSE streams would otherwise hold the server open forever
        session::close_all(sessions.as_ref()).await;
        info!("Server shutting down");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    reaper.abort();
    Ok(())
}

/// Initialize logging: stdout always, plus a log file when configured.
///
/// `RUST_LOG` wins over the configured level; the default is `info`.
fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_level.as_deref().unwrap_or("info"))
    });
    let stdout_layer = fmt::layer().with_target(false).compact();

    let Some(ref path) = config.log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(dir)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}
