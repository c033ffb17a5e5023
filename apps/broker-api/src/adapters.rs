//! # Port Adapters
//!
//! Concrete implementations of broker-core's ports for the host process.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ Port         │ Adapter                                      │
//! ├──────────────┼──────────────────────────────────────────────┤
//! │ Persistence  │ broker_core::MemoryStore                     │
//! │ Clock        │ SystemClock (chrono::Utc::now)               │
//! │ Random       │ OsRandom (rand::rngs::OsRng)                 │
//! │ Notifier     │ TracingNotifier (structured log line)        │
//! │ Journal      │ LoggingJournal (accepts, logs)               │
//! │ Identity     │ Caller (bearer token subject + [[actors]])   │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use broker_core::{
    Actor, Capability, Clock, CoreError, CoreResult, Identity, Journal, Notifier, PortError,
    RandomSource, Voucher,
};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use tracing::info;

use crate::config::ActorEntry;

// =============================================================================
// Clock & Randomness
// =============================================================================

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Emits every notification as a log line.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: &str, payload: &Value) -> Result<(), PortError> {
        info!(target: "broker::events", kind, %payload, "Event");
        Ok(())
    }
}

/// Journal that accepts every voucher.
pub struct LoggingJournal;

impl Journal for LoggingJournal {
    fn post_voucher(&self, voucher: &Voucher) -> Result<(), PortError> {
        info!(
            target: "broker::journal",
            voucher_id = %voucher.id(),
            reference = voucher.reference().unwrap_or("-"),
            amount = %voucher.amount(),
            journal = %voucher.journal().id,
            "Voucher posted to journal"
        );
        Ok(())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Known actors and their capabilities.
#[derive(Debug, Default)]
pub struct ActorDirectory {
    actors: HashMap<String, (Actor, HashSet<Capability>)>,
}

impl ActorDirectory {
    /// Builds the directory. Unknown capability names are skipped; config
    /// validation rejects them earlier.
    pub fn from_entries(entries: &[ActorEntry]) -> Self {
        let actors = entries
            .iter()
            .map(|entry| {
                let capabilities = entry
                    .capabilities
                    .iter()
                    .filter_map(|c| c.parse().ok())
                    .collect();
                (
                    entry.id.clone(),
                    (Actor::new(entry.id.clone(), entry.name.clone()), capabilities),
                )
            })
            .collect();
        Self { actors }
    }

    pub fn insert(&mut self, actor: Actor, capabilities: impl IntoIterator<Item = Capability>) {
        self.actors
            .insert(actor.id.clone(), (actor, capabilities.into_iter().collect()));
    }

    pub fn lookup(&self, id: &str) -> Option<&Actor> {
        self.actors.get(id).map(|(actor, _)| actor)
    }

    pub fn grants(&self, id: &str, capability: Capability) -> bool {
        self.actors
            .get(id)
            .is_some_and(|(_, caps)| caps.contains(&capability))
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

/// The caller of one request, as named by a verified bearer token.
#[derive(Clone)]
pub struct Caller {
    actor_id: Option<String>,
    directory: Arc<ActorDirectory>,
}

impl Caller {
    pub fn new(actor_id: Option<String>, directory: Arc<ActorDirectory>) -> Self {
        Self {
            actor_id,
            directory,
        }
    }
}

impl Identity for Caller {
    fn current_actor(&self) -> CoreResult<Actor> {
        let id = self.actor_id.as_deref().ok_or_else(|| CoreError::NotAuthorized {
            reason: "missing bearer token".to_string(),
        })?;
        self.directory
            .lookup(id)
            .cloned()
            .ok_or_else(|| CoreError::NotAuthorized {
                reason: format!("unknown actor {}", id),
            })
    }

    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool {
        self.directory.grants(&actor.id, capability)
    }
}

/// Identity of the settle scheduler.
pub struct SchedulerIdentity {
    actor: Actor,
}

impl Default for SchedulerIdentity {
    fn default() -> Self {
        Self {
            actor: Actor::new("system.scheduler", "Scheduler"),
        }
    }
}

impl Identity for SchedulerIdentity {
    fn current_actor(&self) -> CoreResult<Actor> {
        Ok(self.actor.clone())
    }

    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool {
        actor.id == self.actor.id && capability == Capability::CommissionPay
    }
}
