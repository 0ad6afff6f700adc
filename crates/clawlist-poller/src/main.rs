//! Clawlist poller binary: watches the market room and wakes buyer agents.
//!
//! Runs the poll loop with structured logging and stops cleanly on
//! SIGTERM/SIGINT.

use std::process::ExitCode;
use std::time::Duration;

use clawlist_matrix::MatrixClient;
use clawlist_poller::config::{self, Config};
use clawlist_poller::{CommandDispatcher, MatrixTimeline, Poller};
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (String, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (path, "cli-arg");
    }

    if let Ok(path) = std::env::var("CLAWLIST_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (path, "env-var");
        }
    }

    ("poller.toml".to_string(), "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let (config_path, config_source) = resolve_config_path();

    let config = match config::load_config(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration from {config_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = %config_path,
        "resolved startup configuration path"
    );

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "the poller cannot start without valid config");
        return ExitCode::FAILURE;
    }

    // Room reads use the first buyer's credential.
    let reader_token = config
        .buyers
        .first()
        .map(|buyer| buyer.access_token.clone())
        .unwrap_or_default();
    let client = match MatrixClient::new(&config.matrix.homeserver, reader_token) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build homeserver client");
            return ExitCode::FAILURE;
        }
    };

    let source = MatrixTimeline::new(
        client,
        config.matrix.market_room_id.clone(),
        config.poller.timeline_limit,
    );
    let dispatcher = CommandDispatcher::new(
        &config.dispatch.program,
        Duration::from_secs(config.dispatch.timeout_secs),
    );

    let mut poller = Poller::new(
        source,
        dispatcher,
        config.buyers.clone(),
        config.poller_settings(),
    );
    poller.load_state();
    let stop = poller.stop_handle();

    let running = tokio::spawn(poller.run());

    shutdown_signal().await;
    stop.stop();

    let in_flight = match running.await {
        Ok(in_flight) => in_flight,
        Err(e) => {
            tracing::error!(error = %e, "poll loop task failed");
            return ExitCode::FAILURE;
        }
    };

    // Returning drops the runtime, which would cancel detached triggers.
    if in_flight.count() > 0 {
        tracing::info!(
            pending = in_flight.count(),
            "waiting for scheduled triggers, signal again to exit now"
        );
        tokio::select! {
            () = in_flight.wait_idle() => {}
            () = shutdown_signal() => {
                tracing::warn!(dropped = in_flight.count(), "exiting with triggers pending");
            }
        }
    }

    tracing::info!("clawlist poller shut down");
    ExitCode::SUCCESS
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, stopping poller"); }
        () = terminate => { tracing::info!("received SIGTERM, stopping poller"); }
    }
}
