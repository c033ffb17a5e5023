//! Deterministic port fakes for tests.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature,
//! for downstream crates.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::memory::MemoryStore;
use crate::ports::{Clock, Identity, Journal, Notifier, PortError, Ports, RandomSource};
use crate::types::{Actor, Capability};
use crate::voucher::Voucher;

// =============================================================================
// Clock
// =============================================================================

/// Clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 2024-03-15 09:30 UTC.
    pub fn default_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Self::default_instant())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clock whose first `parties` reads block until all of them arrive.
///
/// Workflows read the clock after loading and before committing, so the
/// gate lines racing callers up on the same snapshot.
pub struct RendezvousClock {
    inner: FixedClock,
    gate: Barrier,
    parties: usize,
    reads: AtomicUsize,
}

impl RendezvousClock {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: FixedClock::default(),
            gate: Barrier::new(parties),
            parties,
            reads: AtomicUsize::new(0),
        }
    }
}

impl Clock for RendezvousClock {
    fn now(&self) -> DateTime<Utc> {
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.gate.wait();
        }
        self.inner.now()
    }
}

// =============================================================================
// Randomness
// =============================================================================

/// Reproducible byte stream: a counter mixed with a seed.
///
/// Two instances with the same seed produce the same bytes; successive
/// draws from one instance never repeat.
pub struct SequenceRandom {
    seed: u64,
    counter: AtomicU64,
}

impl SequenceRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        let draw = self.counter.fetch_add(1, Ordering::SeqCst);
        // splitmix64 over (seed, draw, block)
        for (block, chunk) in dest.chunks_mut(8).enumerate() {
            let mut z = self
                .seed
                .wrapping_add(draw.wrapping_mul(0x9E37_79B9_7F4A_7C15))
                .wrapping_add((block as u64 + 1).wrapping_mul(0xBF58_476D_1CE4_E5B9));
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            let bytes = z.to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// Records every notification; can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, Value)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(kind, _)| kind.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: &str, payload: &Value) -> Result<(), PortError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((kind.to_string(), payload.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError("notification channel down".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Accepts every voucher and remembers the ids.
#[derive(Default)]
pub struct AcceptingJournal {
    posted: Mutex<Vec<String>>,
}

impl AcceptingJournal {
    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Journal for AcceptingJournal {
    fn post_voucher(&self, voucher: &Voucher) -> Result<(), PortError> {
        self.posted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(voucher.id().to_string());
        Ok(())
    }
}

/// Refuses every voucher.
pub struct RefusingJournal {
    pub reason: String,
}

impl Default for RefusingJournal {
    fn default() -> Self {
        Self {
            reason: "period is locked".to_string(),
        }
    }
}

impl Journal for RefusingJournal {
    fn post_voucher(&self, _voucher: &Voucher) -> Result<(), PortError> {
        Err(PortError(self.reason.clone()))
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Fixed caller with a fixed capability set. Actors can be swapped to model
/// several users sharing one port bundle.
pub struct StaticIdentity {
    actor: Option<Actor>,
    grants: HashMap<String, HashSet<Capability>>,
}

impl StaticIdentity {
    /// `actor` holding every capability.
    pub fn all(actor: Actor) -> Self {
        Self::with(actor, Capability::ALL)
    }

    pub fn with(actor: Actor, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let mut grants = HashMap::new();
        grants.insert(actor.id.clone(), capabilities.into_iter().collect());
        Self {
            actor: Some(actor),
            grants,
        }
    }

    /// Nobody signed in.
    pub fn anonymous() -> Self {
        Self {
            actor: None,
            grants: HashMap::new(),
        }
    }
}

impl Identity for StaticIdentity {
    fn current_actor(&self) -> CoreResult<Actor> {
        self.actor.clone().ok_or_else(|| CoreError::NotAuthorized {
            reason: "no signed-in actor".to_string(),
        })
    }

    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool {
        self.grants
            .get(&actor.id)
            .is_some_and(|caps| caps.contains(&capability))
    }
}

// =============================================================================
// Bundles
// =============================================================================

/// Fakes wired together, with handles kept for assertions.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub journal: Arc<AcceptingJournal>,
    pub ports: Ports,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let clock = Arc::new(FixedClock::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let journal = Arc::new(AcceptingJournal::default());
        let ports = Ports::new(
            store.clone(),
            clock.clone(),
            Arc::new(SequenceRandom::new(42)),
            notifier.clone(),
            journal.clone(),
        );
        Self {
            store,
            clock,
            notifier,
            journal,
            ports,
        }
    }

    /// Same store and clock, different journal.
    pub fn with_journal(&self, journal: Arc<dyn Journal>) -> Ports {
        Ports {
            journal,
            ..self.ports.clone()
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
