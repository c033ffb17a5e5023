//! # HTTP Routes
//!
//! ```text
//! ┌─────────────────────────────────────────────┬───────────────────────────┐
//! │ Route                                       │ Handler                   │
//! ├─────────────────────────────────────────────┼───────────────────────────┤
//! │ GET    /health                              │ health::health_check      │
//! │ GET    /payment/verify/{token}              │ verify::verify_voucher    │
//! │ POST   /api/dashboard                       │ dashboard::compose        │
//! │ GET    /api/orders/{id}/commission          │ commission::report        │
//! │ PUT    /api/orders/{id}/recipients/{slot}   │ commission::set_recipient │
//! │ DELETE /api/orders/{id}/recipients/{slot}   │ commission::clear_...     │
//! │ POST   /api/orders/{id}/commission/{verb}   │ commission::run_verb      │
//! │ POST   /api/orders/{id}/payouts/{p}/posted  │ commission::mark_...      │
//! │ POST   /api/commission/settle               │ commission::settle        │
//! │ POST   /api/vouchers                        │ voucher::create_voucher   │
//! │ GET    /api/vouchers/{id}                   │ voucher::get_voucher      │
//! │ PATCH  /api/vouchers/{id}                   │ voucher::edit_voucher     │
//! │ POST   /api/vouchers/{id}/{verb}            │ voucher::run_verb         │
//! │ GET    /api/vouchers/{id}/qr                │ voucher::qr_url           │
//! └─────────────────────────────────────────────┴───────────────────────────┘
//! ```
//!
//! Workflow routes read the caller from an `Authorization: Bearer` token
//! (see [`crate::auth`]).

pub mod commission;
pub mod dashboard;
pub mod health;
pub mod verify;
pub mod voucher;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payment/verify/{token}", get(verify::verify_voucher))
        .route("/api/dashboard", post(dashboard::compose_dashboard))
        .route("/api/orders/{id}/commission", get(commission::commission_report))
        .route(
            "/api/orders/{id}/recipients/{slot}",
            put(commission::set_recipient).delete(commission::clear_recipient),
        )
        .route("/api/orders/{id}/commission/{verb}", post(commission::run_verb))
        .route(
            "/api/orders/{id}/payouts/{payout_id}/posted",
            post(commission::mark_payout_posted),
        )
        .route("/api/commission/settle", post(commission::settle))
        .route("/api/vouchers", post(voucher::create_voucher))
        .route(
            "/api/vouchers/{id}",
            get(voucher::get_voucher).patch(voucher::edit_voucher),
        )
        .route("/api/vouchers/{id}/qr", get(voucher::qr_url))
        .route("/api/vouchers/{id}/{verb}", post(voucher::run_verb))
        .with_state(state)
}
