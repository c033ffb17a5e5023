//! # broker-core: Commission, Analytics and Voucher Logic
//!
//! Pure business logic for a real-estate brokerage: multi-party sales
//! commissions, the sales dashboard and the payment voucher approval chain.
//! Every side effect goes through a port trait in [`ports`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      broker-api (axum host)                             │
//! │   config ─ telemetry ─ identity header ─ retry on conflict              │
//! └─────────────────────────────────┬───────────────────────────────────────┘
//!                                   │
//! ┌─────────────────────────────────▼───────────────────────────────────────┐
//! │                ★ broker-core (THIS CRATE) ★                             │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                 │
//! │  │  commission  │   │  dashboard   │   │   voucher    │                 │
//! │  │  evaluate    │   │  compose     │   │  submit ...  │                 │
//! │  │  allocate    │   │      │       │   │  post        │                 │
//! │  │  workflow    │   │      ▼       │   │  token       │                 │
//! │  └──────┬───────┘   │  analytics ◄─┼── schema probe   │                 │
//! │         │           └──────────────┘   └──────┬───────┘                 │
//! │         ▼                                     ▼                         │
//! │  ┌───────────────────────────────────────────────────────────────┐      │
//! │  │  order · money · types · validation · error   (domain model)  │      │
//! │  └───────────────────────────────────────────────────────────────┘      │
//! │                                                                         │
//! │  ports: Persistence · Identity · Clock · Random · Notifier · Journal    │
//! │  memory: MemoryStore (reference Persistence)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`order`] - Orders, lines, recipient slots, payouts
//! - [`commission`] - Evaluator, allocation, workflow, report dataset
//! - [`voucher`] - Payment vouchers, approval chain, verification tokens
//! - [`analytics`] - Filters, scorecards, time buckets, rankings
//! - [`dashboard`] - Chart-ready dashboard payload
//! - [`schema`] - Optional column probe
//! - [`ports`] - Side-effect boundaries
//! - [`memory`] - In-memory persistence
//!
//! ## Design Principles
//!
//! 1. **Integer Money**: cents in `i64`, rates in basis points
//! 2. **One Write Path**: entities change only through `apply` and workflow
//!    effects, and every write re-checks the invariants
//! 3. **Typed State Machines**: transitions are exhaustive matches
//! 4. **Explicit Errors**: every failure carries a stable [`ErrorKind`]
//!
//! ## Example Usage
//!
//! ```rust
//! use broker_core::{Money, Rate};
//!
//! let untaxed = Money::from_major(1000);
//! let broker_share = untaxed.percent(Rate::from_bps(500));
//! assert_eq!(broker_share, Money::from_major(50));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod commission;
pub mod dashboard;
pub mod error;
pub mod memory;
pub mod money;
pub mod order;
pub mod ports;
pub mod schema;
pub mod types;
pub mod validation;
pub mod voucher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

pub use commission::{CommissionVerb, CommissionWorkflow};
pub use dashboard::{DashboardComposer, DashboardPayload, DashboardQuery, DEFAULT_RANKING_TOP_N};
pub use memory::MemoryStore;
pub use order::{CommissionStatus, Order, OrderId, OrderMutation, Slot};
pub use ports::{Clock, Identity, Journal, Notifier, Persistence, PortError, Ports, RandomSource};
pub use voucher::{Voucher, VoucherSettings, VoucherVerb, VoucherWorkflow};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Currency assumed when an order arrives without one.
pub const DEFAULT_CURRENCY: &str = "PKR";
