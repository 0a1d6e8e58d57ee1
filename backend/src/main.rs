//! camtuner server.

use clap::Parser;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use camtuner::{
    config::Config,
    create_app_with_state,
    server::{self, wait_for_shutdown_signal},
    state::AppState,
};

/// camtuner - IP cameras as a network TV tuner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind (default 0.0.0.0)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (default 8000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the persisted lineup
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Explicit path of the lineup file
    #[arg(long)]
    channels_path: Option<PathBuf>,
}

/// RUST_LOG wins, then the configured level, then `info`.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).compact();

    match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path.file_name().unwrap_or(OsStr::new("camtuner.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));

            tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(false),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stdout).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(args.host, args.port, args.data_dir, args.channels_path)?;
    let _log_guard = init_logging(&config);
    info!("Starting camtuner...");
    info!("Lineup file: {}", config.channels_path.display());
    if let Some(log_file) = &config.log_file {
        info!("Logging to {}", log_file.display());
    }

    let state = AppState::from_config(&config);
    state.load_from_storage().await?;
    info!("Device ID: {}", state.device_id());

    let listener = server::bind(&config.server.host, config.server.port).await?;
    let app = create_app_with_state(state.clone());

    // Streams are open-ended, so they must be stopped before the server can
    // finish draining connections.
    let shutdown_state = state.clone();
    let shutdown_signal = async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!("Failed to listen for shutdown signals: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping streams...");
        shutdown_state.shutdown().await;
    };

    server::serve(listener, app, shutdown_signal).await?;
    state.shutdown().await;

    info!("Server stopped");
    Ok(())
}
