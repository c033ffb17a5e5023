//! Payment voucher routes.
//!
//! ```text
//! POST  /api/vouchers                 create (draft)
//! GET   /api/vouchers/{id}            read
//! PATCH /api/vouchers/{id}            edit while draft
//! POST  /api/vouchers/{id}/{verb}     submit · review · approve · authorize
//!                                     post · reject · reset
//! GET   /api/vouchers/{id}/qr         verification URL
//! ```

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use broker_core::voucher::{NewVoucher, VoucherEdit, VoucherKind};
use broker_core::{EntityRef, Money, Signature, Voucher, VoucherVerb, VoucherWorkflow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::Caller;
use crate::error::{ApiError, ApiResult};
use crate::retry::run_blocking;
use crate::state::AppState;

/// Body of `POST /api/vouchers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVoucherBody {
    pub kind: VoucherKind,
    pub partner: EntityRef,
    pub amount: Money,
    /// Defaults to `[payments] currency`.
    #[serde(default)]
    pub currency: Option<String>,
    pub journal: EntityRef,
    pub date: NaiveDate,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Optional body of `POST /api/vouchers/{id}/{verb}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerbBody {
    /// Base64 signature for review, approve and authorize.
    #[serde(default)]
    pub signature: Option<String>,
    /// Required by reject.
    #[serde(default)]
    pub reason: Option<String>,
}

impl VerbBody {
    fn parse(raw: &[u8]) -> ApiResult<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw).map_err(|e| ApiError::invalid_input(e.to_string()))
    }
}

/// `POST /api/vouchers`.
pub async fn create_voucher(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateVoucherBody>,
) -> ApiResult<Json<Voucher>> {
    let new = NewVoucher {
        kind: body.kind,
        partner: body.partner,
        amount: body.amount,
        currency: body.currency.unwrap_or_else(|| state.payment_currency.clone()),
        journal: body.journal,
        date: body.date,
        memo: body.memo,
    };
    let voucher = run_blocking(state.retry, move || {
        VoucherWorkflow::new(&state.ports, &caller, &state.vouchers).create(new.clone())
    })
    .await?;
    Ok(Json(voucher))
}

/// `GET /api/vouchers/{id}`.
pub async fn get_voucher(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Voucher>> {
    let voucher = run_blocking(state.retry, move || {
        VoucherWorkflow::new(&state.ports, &caller, &state.vouchers).get(&id)
    })
    .await?;
    Ok(Json(voucher))
}

/// `PATCH /api/vouchers/{id}`.
pub async fn edit_voucher(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(edit): Json<VoucherEdit>,
) -> ApiResult<Json<Voucher>> {
    let voucher = run_blocking(state.retry, move || {
        VoucherWorkflow::new(&state.ports, &caller, &state.vouchers).edit(&id, edit.clone())
    })
    .await?;
    Ok(Json(voucher))
}

/// `POST /api/vouchers/{id}/{verb}`.
pub async fn run_verb(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, verb)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<Voucher>> {
    let verb = verb
        .parse::<VoucherVerb>()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;
    let body = VerbBody::parse(&body)?;
    let signature = match (verb.role(), body.signature.as_deref()) {
        (Some(_), Some(encoded)) => Some(
            Signature::from_base64(encoded).map_err(|e| ApiError::invalid_input(e.to_string()))?,
        ),
        _ => None,
    };
    let reason = body.reason.unwrap_or_default();

    let voucher = run_blocking(state.retry, move || {
        let workflow = VoucherWorkflow::new(&state.ports, &caller, &state.vouchers);
        let signature = signature.clone().unwrap_or_default();
        match verb {
            VoucherVerb::Submit => workflow.submit(&id),
            VoucherVerb::Review => workflow.review(&id, signature),
            VoucherVerb::Approve => workflow.approve(&id, signature),
            VoucherVerb::Authorize => workflow.authorize(&id, signature),
            VoucherVerb::Post => workflow.post(&id),
            VoucherVerb::Reject => workflow.reject(&id, &reason),
            VoucherVerb::Reset => workflow.reset(&id),
        }
    })
    .await?;
    Ok(Json(voucher))
}

/// `GET /api/vouchers/{id}/qr`.
pub async fn qr_url(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let url = run_blocking(state.retry, move || {
        let workflow = VoucherWorkflow::new(&state.ports, &caller, &state.vouchers);
        let voucher = workflow.get(&id)?;
        Ok(workflow.verification_url(&voucher))
    })
    .await?;
    Ok(Json(json!({ "url": url })))
}
