use std::process::ExitCode;

use blobsync::config::{CliArgs, Config, LoggingConfig};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = CliArgs::parse();
    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging);

    let (addr, metrics_addr) = match (config.listen_addr(), config.metrics_addr()) {
        (Ok(addr), Ok(metrics_addr)) => (addr, metrics_addr),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(metrics_addr) = metrics_addr {
        if let Err(e) = PrometheusBuilder::new().with_http_listener(metrics_addr).install() {
            tracing::error!("Failed to start metrics exporter: {}", e);
            return ExitCode::FAILURE;
        }
        tracing::info!("Metrics exporter listening on {}", metrics_addr);
    }

    tracing::info!(
        backend = ?config.storage.backend,
        data_dir = %config.storage.data_dir.display(),
        databases = config.databases.len(),
        "Opening databases"
    );
    let app = match blobsync::build_app(&config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to open databases: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Sync server listening on {}", addr);

    let server = match axum::Server::try_bind(&addr) {
        Ok(builder) => builder.serve(app.into_make_service()),
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("Sync server stopped");
    ExitCode::SUCCESS
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
