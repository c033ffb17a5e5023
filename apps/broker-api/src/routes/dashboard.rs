//! Sales dashboard.

use axum::extract::State;
use axum::Json;
use broker_core::{DashboardComposer, DashboardPayload, DashboardQuery};

use crate::error::ApiResult;
use crate::retry::run_blocking;
use crate::state::AppState;

/// `POST /api/dashboard`.
pub async fn compose_dashboard(
    State(state): State<AppState>,
    Json(query): Json<DashboardQuery>,
) -> ApiResult<Json<DashboardPayload>> {
    let payload = run_blocking(state.retry, move || {
        DashboardComposer::new(&state.ports)
            .with_top_n(state.ranking_top_n)
            .compose(&query)
    })
    .await?;
    Ok(Json(payload))
}
