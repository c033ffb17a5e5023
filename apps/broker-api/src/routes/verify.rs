//! Public voucher verification, reached from the QR code.

use axum::extract::{Path, State};
use axum::Json;
use broker_core::voucher::VerificationView;
use broker_core::VoucherWorkflow;

use crate::error::ApiResult;
use crate::retry::run_blocking;
use crate::state::AppState;

/// `GET /payment/verify/{token}`. No caller identity is needed.
pub async fn verify_voucher(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<VerificationView>> {
    let view = run_blocking(state.retry, move || {
        let anonymous = state.caller(None);
        VoucherWorkflow::new(&state.ports, &anonymous, &state.vouchers).verify(&token)
    })
    .await?;
    Ok(Json(view))
}
