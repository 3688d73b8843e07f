//! prompt-router HTTP server
//!
//! Starts an Axum web server that routes prompt requests to backend services.

use clap::Parser;
use prompt_router::{
    cli::{Cli, Command, DEFAULT_CONFIG_PATH, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    simulate::{PromptSource, TrafficGenerator},
    telemetry,
};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => {
            let template = generate_config_template();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)?;
                    eprintln!("Wrote configuration template to {}", path);
                }
                None => print!("{}", template),
            }
            Ok(())
        }
        Some(Command::Simulate(args)) => {
            telemetry::init("info");

            let options = args.options()?;
            let source = PromptSource::from_file(&args.prompts)?;
            let generator = TrafficGenerator::new(source, options)?;

            tokio::select! {
                report = generator.run() => {
                    tracing::info!(?report, "Simulation complete");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Simulation interrupted");
                }
            }
            Ok(())
        }
        None => serve(cli.config.as_deref()).await,
    }
}

async fn serve(config_path: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    // Explicit path must exist; the default path is optional
    let path = match config_path {
        Some(path) => Some(Path::new(path)),
        None => Some(Path::new(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };

    // Route table errors are fatal here, before any listener is bound
    let config = Arc::new(Config::load(path)?);

    telemetry::init(&config.observability.log_level);

    let state = AppState::new(config.clone())?;

    tracing::info!(
        service = %config.service.name,
        config_file = ?path,
        timeout_seconds = config.server.request_timeout_seconds,
        "Starting prompt-router on {}:{}",
        config.server.host,
        config.server.port
    );
    for (route, address) in state.router().registry().iter() {
        tracing::info!(route = %route, address = %address, "Registered route");
    }

    let host = config
        .server
        .host
        .parse::<IpAddr>()
        .unwrap_or_else(|_| IpAddr::from([0, 0, 0, 0]));
    let addr = SocketAddr::from((host, config.server.port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    if let Some(metrics_port) = config.observability.metrics_port {
        let metrics_addr = SocketAddr::from((host, metrics_port));
        let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
        let metrics_app = handlers::metrics_app(state.clone());
        tracing::info!("Metrics available at http://{}/metrics", metrics_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
                tracing::error!(error = %e, "Metrics listener stopped");
            }
        });
    }

    axum::serve(listener, handlers::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
