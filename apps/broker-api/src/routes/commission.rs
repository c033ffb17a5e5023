//! Commission workflow routes.

use axum::extract::{Path, State};
use axum::Json;
use broker_core::commission::CommissionReport;
use broker_core::order::{CalcType, RecipientConfig};
use broker_core::{CommissionVerb, CommissionWorkflow, EntityRef, Money, Order, Rate, Slot};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::Caller;
use crate::error::{ApiError, ApiResult};
use crate::retry::run_blocking;
use crate::state::AppState;

/// Body of `PUT /api/orders/{id}/recipients/{slot}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientBody {
    /// `None` keeps the slot configured but disabled.
    #[serde(default)]
    pub party: Option<EntityRef>,
    pub calc_type: CalcType,
    /// Percentage in [0, 100] for percent variants, at most two decimals.
    #[serde(default)]
    pub rate_percent: f64,
    /// Cents, for `FIXED`.
    #[serde(default)]
    pub fixed_amount: Option<Money>,
}

impl RecipientBody {
    fn into_config(self, slot: Slot) -> Result<RecipientConfig, ApiError> {
        Ok(match self.calc_type {
            CalcType::Fixed => {
                RecipientConfig::fixed(slot, self.party, self.fixed_amount.unwrap_or_default())
            }
            calc_type => {
                let rate = Rate::try_from_percent(self.rate_percent)?;
                RecipientConfig::percent(slot, self.party, calc_type, rate)
            }
        })
    }
}

fn parse_slot(raw: &str) -> ApiResult<Slot> {
    raw.parse::<Slot>().map_err(|e| ApiError::invalid_input(e.to_string()))
}

/// `GET /api/orders/{id}/commission`.
pub async fn commission_report(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<CommissionReport>> {
    let report = run_blocking(state.retry, move || {
        CommissionWorkflow::new(&state.ports, &caller).report(&id)
    })
    .await?;
    Ok(Json(report))
}

/// `PUT /api/orders/{id}/recipients/{slot}`.
pub async fn set_recipient(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, slot)): Path<(String, String)>,
    Json(body): Json<RecipientBody>,
) -> ApiResult<Json<Order>> {
    let config = body.into_config(parse_slot(&slot)?)?;
    let order = run_blocking(state.retry, move || {
        CommissionWorkflow::new(&state.ports, &caller).set_recipient(&id, config.clone())
    })
    .await?;
    Ok(Json(order))
}

/// `DELETE /api/orders/{id}/recipients/{slot}`.
pub async fn clear_recipient(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, slot)): Path<(String, String)>,
) -> ApiResult<Json<Order>> {
    let slot = parse_slot(&slot)?;
    let order = run_blocking(state.retry, move || {
        CommissionWorkflow::new(&state.ports, &caller).clear_recipient(&id, slot)
    })
    .await?;
    Ok(Json(order))
}

/// `POST /api/orders/{id}/commission/{verb}`.
pub async fn run_verb(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, verb)): Path<(String, String)>,
) -> ApiResult<Json<Order>> {
    let verb = verb
        .parse::<CommissionVerb>()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;
    let order = run_blocking(state.retry, move || {
        CommissionWorkflow::new(&state.ports, &caller).run(&id, verb)
    })
    .await?;
    Ok(Json(order))
}

/// `POST /api/orders/{id}/payouts/{payout_id}/posted`.
///
/// Payout ids contain slashes and arrive percent-encoded.
pub async fn mark_payout_posted(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, payout_id)): Path<(String, String)>,
) -> ApiResult<Json<Order>> {
    let order = run_blocking(state.retry, move || {
        CommissionWorkflow::new(&state.ports, &caller).mark_payout_posted(&id, &payout_id)
    })
    .await?;
    Ok(Json(order))
}

/// `POST /api/commission/settle`.
pub async fn settle(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Value>> {
    let settled = run_blocking(state.retry, move || {
        CommissionWorkflow::new(&state.ports, &caller).advance_settled()
    })
    .await?;
    Ok(Json(json!({ "settled": settled })))
}
