//! # broker-api
//!
//! HTTP host for broker-core: wires concrete adapters into the core's
//! ports and exposes the dashboard, commission and voucher workflows.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           broker-api                                    │
//! │                                                                         │
//! │  config ──► telemetry ──► AppState ──► routes ──► axum::serve           │
//! │                             │                                           │
//! │                             ├── adapters   (ports: clock, random, ...)  │
//! │                             ├── retry      (Conflict → backoff)         │
//! │                             ├── scheduler  (settle tick)                │
//! │                             └── seed       (demo data)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]. Environment variables override the TOML file:
//! - `BROKER_CONFIG` - path of the TOML file
//! - `BROKER_HOST` / `BROKER_PORT` - bind address
//! - `BROKER_SEED_DEMO` - seed demo data on start
//! - `BROKER_LOG_LEVEL` - default filter when `RUST_LOG` is unset
//! - `BROKER_BASE_URL` - prefix of voucher verification URLs
//! - `BROKER_JWT_SECRET` - HS256 key for actor bearer tokens

pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod retry;
pub mod routes;
pub mod scheduler;
pub mod seed;
pub mod state;
pub mod telemetry;

pub use config::BrokerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
