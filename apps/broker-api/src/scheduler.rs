//! Periodic commission settlement.
//!
//! Every tick moves confirmed orders whose payouts are all posted to paid.

use std::time::Duration;

use broker_core::{CommissionWorkflow, OrderId};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::adapters::SchedulerIdentity;
use crate::error::ApiResult;
use crate::retry::run_blocking;
use crate::state::AppState;

/// Runs one settlement pass.
pub async fn settle_once(state: &AppState) -> ApiResult<Vec<OrderId>> {
    let state = state.clone();
    run_blocking(state.retry, move || {
        CommissionWorkflow::new(&state.ports, &SchedulerIdentity::default()).advance_settled()
    })
    .await
}

/// Spawns the settle loop. `None` when `interval` is zero.
pub fn spawn(state: AppState, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("Commission settle scheduler disabled");
        return None;
    }

    info!(interval_secs = interval.as_secs(), "Commission settle scheduler started");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match settle_once(&state).await {
                Ok(settled) if settled.is_empty() => debug!("Nothing to settle"),
                Ok(settled) => info!(count = settled.len(), "Settle tick advanced orders"),
                Err(e) => warn!(error = %e, "Settle tick failed"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;

    #[tokio::test]
    async fn test_zero_interval_disables() {
        let state = AppState::from_config(&BrokerConfig::default());
        assert!(spawn(state, Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_settle_once_on_empty_store() {
        let state = AppState::from_config(&BrokerConfig::default());
        assert!(settle_once(&state).await.unwrap().is_empty());
    }
}
