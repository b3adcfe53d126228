// Copyright (c) 2026 Ballot Contributors. MIT License.
// See LICENSE for details.

//! # Ballot Election Server
//!
//! Entry point for the `ballot-server` binary. Parses CLI arguments,
//! initializes logging and metrics, and serves the society-election REST
//! API alongside a Prometheus metrics endpoint.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the election server
//! - `version` — print build version information

mod api;
mod cli;
mod limit;
mod logging;
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use ballot_core::config::ElectionConfig;

use cli::{BallotCli, Commands};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BallotCli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the election server: API router, metrics endpoint, shutdown
/// handling.
async fn run_server(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "ballot_server=info,ballot_core=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let mut config = ElectionConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(metrics_port) = args.metrics_port {
        config.metrics_port = metrics_port;
    }

    tracing::info!(
        port = config.port,
        metrics_port = config.metrics_port,
        rate_limit_max = config.rate_limit_max,
        rate_limit_window_ms = config.rate_limit_window_ms,
        fraud_threshold = config.fraud_threshold,
        fraud_block_minutes = config.fraud_block_minutes,
        "starting ballot-server"
    );

    // --- Application state ---
    let state = api::AppState::from_config(&config);
    let shared_metrics = Arc::clone(&state.metrics);

    // --- API server ---
    let api_router = api::create_router(state);
    let api_addr = format!("0.0.0.0:{}", config.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(shared_metrics);
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    // The API server needs peer addresses for origin attribution when no
    // forwarding header is present.
    tokio::select! {
        res = axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        ) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("ballot-server stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("ballot-server {}", env!("CARGO_PKG_VERSION"));
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
