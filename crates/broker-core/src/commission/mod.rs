//! # Commission Engine
//!
//! ```text
//! ┌──────────────┐  per recipient  ┌──────────────┐  totals  ┌──────────────┐
//! │  evaluator   │ ──────────────► │  allocation  │ ───────► │   workflow   │
//! │  amount of   │                 │  roll-up,    │          │  state       │
//! │  one slot    │                 │  scale       │          │  machine,    │
//! └──────────────┘                 └──────────────┘          │  payouts     │
//!                                                            └──────┬───────┘
//!                                                                   ▼
//!                                                            ┌──────────────┐
//!                                                            │   report     │
//!                                                            └──────────────┘
//! ```

pub mod allocation;
pub mod evaluator;
pub mod report;
pub mod workflow;

pub use allocation::{allocate, Allocation, AllocationStatus, CommissionTotals, PayoutScale};
pub use evaluator::{evaluate, evaluate_detailed, recipient_status, Evaluation};
pub use report::{build_report, CommissionReport, ReportHeader, ReportRecipient, ReportSubtotals};
pub use workflow::{
    commission_transition, permitted_commission_verbs, CommissionVerb, CommissionWorkflow,
    COMMISSION_SEQUENCE,
};
