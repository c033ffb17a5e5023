//! # Payment Vouchers
//!
//! ```text
//! ┌─────────────┐      ┌─────────────────────┐      ┌──────────────┐
//! │   token     │ ───► │       model         │ ◄─── │   workflow   │
//! │  QR token,  │      │  Voucher, sign-offs │      │  verbs,      │
//! │  voucher id │      │  approval policy    │      │  journal     │
//! └─────────────┘      └─────────────────────┘      └──────────────┘
//! ```

pub mod model;
pub mod token;
pub mod workflow;

pub use model::{
    ApprovalPolicy, ApprovalRole, NewVoucher, RoleSignoff, Voucher, VoucherEdit, VoucherId,
    VoucherKind, VoucherMutation, VoucherState,
};
pub use token::{new_voucher_id, VerificationToken, TOKEN_BYTES, TOKEN_LEN};
pub use workflow::{
    permitted_voucher_verbs, voucher_transition, VerificationView, VoucherSettings, VoucherVerb,
    VoucherWorkflow,
};
