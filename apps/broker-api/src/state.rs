//! Shared application state and the caller extractor.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use broker_core::{MemoryStore, Ports, VoucherSettings};
use tracing::debug;

use crate::adapters::{ActorDirectory, Caller, LoggingJournal, OsRandom, SystemClock, TracingNotifier};
use crate::auth::{extract_bearer_token, JwtManager};
use crate::config::BrokerConfig;
use crate::error::ApiError;
use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct AppState {
    pub ports: Ports,
    pub store: Arc<MemoryStore>,
    pub directory: Arc<ActorDirectory>,
    pub jwt: Arc<JwtManager>,
    pub vouchers: Arc<VoucherSettings>,
    pub retry: RetryPolicy,
    pub ranking_top_n: usize,
    /// Currency for voucher requests that name none.
    pub payment_currency: String,
}

impl AppState {
    /// Wires the production adapters around a fresh in-memory store.
    pub fn from_config(config: &BrokerConfig) -> Self {
        let store = Arc::new(MemoryStore::with_columns(config.schema.order_columns.iter().cloned()));
        let ports = Ports::new(
            store.clone(),
            Arc::new(SystemClock),
            Arc::new(OsRandom),
            Arc::new(TracingNotifier),
            Arc::new(LoggingJournal),
        );
        Self {
            ports,
            store,
            directory: Arc::new(ActorDirectory::from_entries(&config.actors)),
            jwt: Arc::new(JwtManager::from_settings(&config.auth)),
            vouchers: Arc::new(config.voucher_settings()),
            retry: RetryPolicy::new(&config.retry),
            ranking_top_n: config.dashboard.ranking_top_n,
            payment_currency: config.payments.currency.clone(),
        }
    }

    pub fn caller(&self, actor_id: Option<String>) -> Caller {
        Caller::new(actor_id, self.directory.clone())
    }
}

/// No `Authorization` header yields an anonymous caller. A header that is
/// not a verifiable bearer token is rejected with 401.
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(state.caller(None));
        };
        let token = header
            .to_str()
            .ok()
            .and_then(extract_bearer_token)
            .ok_or_else(|| ApiError::unauthenticated("expected a bearer token"))?;
        let claims = state.jwt.verify(token).inspect_err(|e| {
            debug!(error = %e, "Rejected bearer token");
        })?;
        Ok(state.caller(Some(claims.sub)))
    }
}
