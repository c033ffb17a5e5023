//! # Broker API Server
//!
//! ```text
//! broker.toml + env ──► BrokerConfig ──► AppState ──► Router ──► :8080
//!                                            │
//!                                            └──► settle scheduler
//! ```
//!
//! `broker-api [config.toml]` serves. `broker-api token <actor-id>` prints a
//! bearer token for an `[[actors]]` entry and exits.

use std::time::Duration;

use broker_api::auth::JwtManager;
use broker_api::config::DEV_JWT_SECRET;
use broker_api::{create_router, scheduler, seed, telemetry, AppState, BrokerConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let first = args.next();
    if first.as_deref() == Some("token") {
        let actor = args.next().ok_or("usage: broker-api token <actor-id>")?;
        let config = BrokerConfig::load(args.next().map(Into::into))?;
        if !config.actors.iter().any(|a| a.id == actor) {
            return Err(format!("unknown actor {}", actor).into());
        }
        println!("{}", JwtManager::from_settings(&config.auth).issue(&actor)?);
        return Ok(());
    }

    let config = BrokerConfig::load(first.map(Into::into))?;
    telemetry::init(&config.telemetry.log_level);
    if config.auth.jwt_secret == DEV_JWT_SECRET {
        warn!("auth.jwt_secret is the development default; set BROKER_JWT_SECRET");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        actors = config.actors.len(),
        "Starting broker-api"
    );

    let state = AppState::from_config(&config);
    if config.server.seed_demo {
        let seeded = seed::seed_demo(&state, &config.commission.currency)?;
        info!(orders = seeded, "Demo data loaded");
    }

    let settle = scheduler::spawn(
        state.clone(),
        Duration::from_secs(config.commission.settle_interval_secs),
    );

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(%address, "Listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = settle {
        handle.abort();
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
