//! pgreport service - PostgreSQL log reports with pgBadger

use anyhow::{Context, Result};
use clap::Parser;
use pgreport_core::{ServerRegistry, ServiceConfig};
use pgreport_db::PgLogLister;
use pgreport_jobs::ReportService;
use pgreport_runtime::{PgBadgerTools, ReportTools};
use pgreport_web::AppState;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (level, http_level) = match cli.verbose {
        0 => ("info", "warn"),
        1 => ("debug", "debug"),
        _ => ("trace", "trace"),
    };
    let default_filter = format!(
        "pgreportd={0},pgreport_core={0},pgreport_db={0},pgreport_runtime={0},pgreport_jobs={0},pgreport_web={0},tower_http={1}",
        level, http_level
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let (mut config, path) = load_config(cli.config.as_deref())?;
    info!("Loaded config from {}", path.display());

    if let Some(port) = cli.port {
        config.this_service_port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    config.validate()?;

    config.provision_report_dirs()?;
    info!(
        "Report directory {} ready for {} servers",
        config.report_dir.display(),
        config.servers.len()
    );

    let tools = PgBadgerTools::new(config.tools.clone());
    for program in tools.missing_programs() {
        warn!("{} not found on PATH; report generation will fail", program);
    }

    let listen_addr = config.listen_addr();
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", listen_addr))?;

    let service = Arc::new(ReportService::new(
        ServerRegistry::new(config.servers.clone()),
        config.report_dir.clone(),
        Arc::new(tools),
    ));
    let state = AppState::new(service.clone(), Arc::new(PgLogLister::new()));

    pgreport_web::start_server(addr, state, cli.cors_origin, shutdown_signal())
        .await
        .with_context(|| format!("Failed to serve on {}", addr))?;

    // Pipelines run in their own process groups and would outlive us
    let stopped = service.stop_all();
    if stopped > 0 {
        info!("Stopped {} running report jobs", stopped);
    }

    info!("Shutdown complete");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<(ServiceConfig, PathBuf)> {
    match path {
        Some(path) => {
            let config = ServiceConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            Ok((config, path.to_path_buf()))
        }
        None => Ok(ServiceConfig::find_and_load(Path::new("."))?),
    }
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            return std::future::pending().await;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to install SIGINT handler: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }
}
