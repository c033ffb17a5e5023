//! # Ports
//!
//! Every side effect the core needs enters through one of these traits.
//! The host wires concrete adapters; tests wire the fakes in
//! [`crate::testing`].
//!
//! ## Port Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          broker-core                                    │
//! │                                                                         │
//! │  CommissionWorkflow   VoucherWorkflow   DashboardComposer   SchemaProbe │
//! │        │   │               │   │   │           │                 │      │
//! └────────┼───┼───────────────┼───┼───┼───────────┼─────────────────┼──────┘
//!          │   │               │   │   │           │                 │
//!          ▼   ▼               ▼   ▼   ▼           ▼                 ▼
//!   ┌───────────┐ ┌──────────┐ ┌───────┐ ┌────────┐ ┌──────────┐ ┌─────────┐
//!   │Persistence│ │ Identity │ │ Clock │ │ Random │ │ Notifier │ │ Journal │
//!   │ sessions, │ │ actor +  │ │ now() │ │ bytes  │ │ best-    │ │ voucher │
//!   │ sequences,│ │ caps     │ │       │ │        │ │ effort   │ │ posting │
//!   │ columns   │ │          │ │       │ │        │ │          │ │         │
//!   └───────────┘ └──────────┘ └───────┘ └────────┘ └──────────┘ └─────────┘
//! ```
//!
//! ## Sessions
//! A [`Session`] is one serializable unit of work. Writes are staged and
//! become visible on [`Session::commit`]; a concurrent writer that committed
//! first makes the commit fail with `Conflict`. Dropping a session without
//! committing discards its writes. Sequence numbers are the exception: they
//! are consumed immediately and never handed out twice, so gaps are possible.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::order::Order;
use crate::schema::SchemaProbe;
use crate::types::{Actor, Capability};
use crate::voucher::Voucher;

// =============================================================================
// Persistence
// =============================================================================

pub trait Persistence: Send + Sync {
    /// Opens a unit of work.
    fn begin(&self) -> CoreResult<Box<dyn Session + '_>>;

    /// Read-only probe: does `entity` expose column `column`?
    fn has_column(&self, entity: &str, column: &str) -> bool;
}

pub trait Session {
    fn load_order(&mut self, id: &str) -> CoreResult<Order>;

    /// Snapshot of every order, for aggregation.
    fn orders(&mut self) -> CoreResult<Vec<Order>>;

    /// Inserts or replaces an order.
    fn save_order(&mut self, order: &Order) -> CoreResult<()>;

    fn load_voucher(&mut self, id: &str) -> CoreResult<Voucher>;

    fn find_voucher_by_token(&mut self, token: &str) -> CoreResult<Voucher>;

    /// Inserts or replaces a voucher.
    fn save_voucher(&mut self, voucher: &Voucher) -> CoreResult<()>;

    /// Next value of a named monotonic sequence. Starts at 1.
    fn next_sequence(&mut self, name: &str) -> CoreResult<u64>;

    fn commit(self: Box<Self>) -> CoreResult<()>;

    fn rollback(self: Box<Self>);
}

// =============================================================================
// Identity
// =============================================================================

pub trait Identity: Send + Sync {
    /// The caller. `NotAuthorized` when nobody is signed in.
    fn current_actor(&self) -> CoreResult<Actor>;

    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool;
}

/// Resolves the caller and checks one capability.
pub fn require_capability(identity: &dyn Identity, capability: Capability) -> CoreResult<Actor> {
    let actor = identity.current_actor()?;
    if !identity.has_capability(&actor, capability) {
        return Err(CoreError::NotAuthorized {
            reason: format!("{} lacks {}", actor.id, capability),
        });
    }
    Ok(actor)
}

// =============================================================================
// Clock & Randomness
// =============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Cryptographically strong bytes.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

// =============================================================================
// Notification & Journal
// =============================================================================

/// Failure reported by an outbound port.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PortError(pub String);

/// Best-effort event sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: &str, payload: &Value) -> Result<(), PortError>;
}

/// Accounting journal that receives posted vouchers.
pub trait Journal: Send + Sync {
    fn post_voucher(&self, voucher: &Voucher) -> Result<(), PortError>;
}

// =============================================================================
// Port Bundle
// =============================================================================

/// Process-wide adapters shared by every workflow.
///
/// Identity is per-request and passed to workflows separately.
#[derive(Clone)]
pub struct Ports {
    pub store: Arc<dyn Persistence>,
    pub clock: Arc<dyn Clock>,
    pub random: Arc<dyn RandomSource>,
    pub notifier: Arc<dyn Notifier>,
    pub journal: Arc<dyn Journal>,
    pub schema: SchemaProbe,
}

impl Ports {
    pub fn new(
        store: Arc<dyn Persistence>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        notifier: Arc<dyn Notifier>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        let schema = SchemaProbe::new(store.clone());
        Self {
            store,
            clock,
            random,
            notifier,
            journal,
            schema,
        }
    }

    /// Emits a notification, logging and swallowing failures.
    pub(crate) fn notify(&self, kind: &str, payload: Value) {
        if let Err(e) = self.notifier.notify(kind, &payload) {
            warn!(kind, error = %e, "Notification failed, continuing");
        }
    }
}
