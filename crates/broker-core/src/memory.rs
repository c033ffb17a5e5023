//! # In-Memory Store
//!
//! Reference implementation of [`Persistence`] with optimistic concurrency.
//!
//! ## Commit Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Session A                         Session B                            │
//! │  load_order("o-1")  → v3           load_order("o-1")  → v3              │
//! │  save_order(...)    (staged)       save_order(...)    (staged)          │
//! │  commit()                                                               │
//! │    check o-1 still v3 ✔                                                 │
//! │    write o-1 as v4                                                      │
//! │                                    commit()                             │
//! │                                      check o-1 still v3 ✘ (v4)          │
//! │                                      → Conflict, nothing written        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sequences bypass the protocol: `next_sequence` bumps the counter
//! immediately, so a rolled-back session leaves a gap instead of reusing a
//! number.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::order::Order;
use crate::ports::{Persistence, Session};
use crate::schema::{OptionalColumn, ORDER_ENTITY};
use crate::voucher::Voucher;

struct Versioned<T> {
    version: u64,
    value: T,
}

#[derive(Default)]
struct StoreState {
    orders: BTreeMap<String, Versioned<Order>>,
    vouchers: BTreeMap<String, Versioned<Voucher>>,
    /// verification token → voucher id
    tokens: HashMap<String, String>,
    sequences: HashMap<String, u64>,
}

/// Thread-safe in-memory store.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    columns: HashSet<String>,
}

impl MemoryStore {
    /// Store exposing every optional order column.
    pub fn new() -> Self {
        Self::with_columns(OptionalColumn::ALL.iter().map(|c| c.column_name()))
    }

    /// Store exposing only the given optional order columns.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: RwLock::new(StoreState::default()),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Inserts orders in one committed session.
    pub fn seed_orders(&self, orders: impl IntoIterator<Item = Order>) -> CoreResult<()> {
        let mut session = self.begin()?;
        for order in orders {
            session.save_order(&order)?;
        }
        session.commit()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for MemoryStore {
    fn begin(&self) -> CoreResult<Box<dyn Session + '_>> {
        Ok(Box::new(MemorySession {
            store: self,
            observed: HashMap::new(),
            staged_orders: BTreeMap::new(),
            staged_vouchers: BTreeMap::new(),
        }))
    }

    fn has_column(&self, entity: &str, column: &str) -> bool {
        entity == ORDER_ENTITY && self.columns.contains(column)
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Order(String),
    Voucher(String),
}

struct MemorySession<'a> {
    store: &'a MemoryStore,
    /// Version each touched entity had when first seen. `None` = absent.
    observed: HashMap<Key, Option<u64>>,
    staged_orders: BTreeMap<String, Order>,
    staged_vouchers: BTreeMap<String, Voucher>,
}

impl MemorySession<'_> {
    fn observe(&mut self, key: Key, version: Option<u64>) {
        self.observed.entry(key).or_insert(version);
    }

    fn check_unique(&self, state: &StoreState) -> CoreResult<()> {
        for voucher in self.staged_vouchers.values() {
            let token = voucher.verification_token().as_str();
            if let Some(owner) = state.tokens.get(token) {
                if owner != voucher.id() {
                    return Err(CoreError::invariant("voucher", "verification token already in use"));
                }
            }
            if let Some(reference) = voucher.reference() {
                let committed = state
                    .vouchers
                    .values()
                    .map(|v| &v.value)
                    .filter(|v| !self.staged_vouchers.contains_key(v.id()));
                let clash = committed
                    .chain(self.staged_vouchers.values())
                    .any(|other| {
                        other.id() != voucher.id()
                            && other.kind() == voucher.kind()
                            && other.reference() == Some(reference)
                    });
                if clash {
                    return Err(CoreError::invariant(
                        "voucher",
                        format!("reference {} already in use", reference),
                    ));
                }
            }
        }
        for order in self.staged_orders.values() {
            if let Some(reference) = order.commission_reference() {
                let committed = state
                    .orders
                    .values()
                    .map(|o| &o.value)
                    .filter(|o| !self.staged_orders.contains_key(o.id()));
                let clash = committed.chain(self.staged_orders.values()).any(|other| {
                    other.id() != order.id() && other.commission_reference() == Some(reference)
                });
                if clash {
                    return Err(CoreError::invariant(
                        "order",
                        format!("commission reference {} already in use", reference),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Session for MemorySession<'_> {
    fn load_order(&mut self, id: &str) -> CoreResult<Order> {
        if let Some(order) = self.staged_orders.get(id) {
            return Ok(order.clone());
        }
        let store = self.store;
        let state = store.read();
        let entry = state
            .orders
            .get(id)
            .ok_or_else(|| CoreError::not_found("order", id))?;
        let order = entry.value.clone();
        let version = entry.version;
        drop(state);
        self.observe(Key::Order(id.to_string()), Some(version));
        Ok(order)
    }

    fn orders(&mut self) -> CoreResult<Vec<Order>> {
        let state = self.store.read();
        let mut orders: BTreeMap<&str, &Order> = state
            .orders
            .iter()
            .map(|(id, v)| (id.as_str(), &v.value))
            .collect();
        for (id, order) in &self.staged_orders {
            orders.insert(id.as_str(), order);
        }
        Ok(orders.into_values().cloned().collect())
    }

    fn save_order(&mut self, order: &Order) -> CoreResult<()> {
        let key = Key::Order(order.id().to_string());
        if !self.observed.contains_key(&key) {
            let version = self.store.read().orders.get(order.id()).map(|v| v.version);
            self.observe(key, version);
        }
        self.staged_orders.insert(order.id().to_string(), order.clone());
        Ok(())
    }

    fn load_voucher(&mut self, id: &str) -> CoreResult<Voucher> {
        if let Some(voucher) = self.staged_vouchers.get(id) {
            return Ok(voucher.clone());
        }
        let store = self.store;
        let state = store.read();
        let entry = state
            .vouchers
            .get(id)
            .ok_or_else(|| CoreError::not_found("voucher", id))?;
        let voucher = entry.value.clone();
        let version = entry.version;
        drop(state);
        self.observe(Key::Voucher(id.to_string()), Some(version));
        Ok(voucher)
    }

    fn find_voucher_by_token(&mut self, token: &str) -> CoreResult<Voucher> {
        if let Some(voucher) = self
            .staged_vouchers
            .values()
            .find(|v| v.verification_token().as_str() == token)
        {
            return Ok(voucher.clone());
        }
        let state = self.store.read();
        state
            .tokens
            .get(token)
            .and_then(|id| state.vouchers.get(id))
            .map(|v| v.value.clone())
            .ok_or_else(|| CoreError::not_found("voucher", "token"))
    }

    fn save_voucher(&mut self, voucher: &Voucher) -> CoreResult<()> {
        let key = Key::Voucher(voucher.id().to_string());
        if !self.observed.contains_key(&key) {
            let version = self
                .store
                .read()
                .vouchers
                .get(voucher.id())
                .map(|v| v.version);
            self.observe(key, version);
        }
        self.staged_vouchers
            .insert(voucher.id().to_string(), voucher.clone());
        Ok(())
    }

    fn next_sequence(&mut self, name: &str) -> CoreResult<u64> {
        let mut state = self.store.write();
        let counter = state.sequences.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn commit(self: Box<Self>) -> CoreResult<()> {
        let store = self.store;
        let mut state = store.write();

        for (key, expected) in &self.observed {
            let (current, entity, id) = match key {
                Key::Order(id) => (state.orders.get(id).map(|v| v.version), "order", id),
                Key::Voucher(id) => (state.vouchers.get(id).map(|v| v.version), "voucher", id),
            };
            if current != *expected {
                debug!(entity, id = %id, ?expected, ?current, "Commit lost optimistic check");
                return Err(CoreError::conflict(entity, id.clone()));
            }
        }
        self.check_unique(&state)?;

        let session = *self;
        for (id, order) in session.staged_orders {
            let version = state.orders.get(&id).map_or(1, |v| v.version + 1);
            state.orders.insert(id, Versioned { version, value: order });
        }
        for (id, voucher) in session.staged_vouchers {
            let version = state.vouchers.get(&id).map_or(1, |v| v.version + 1);
            state
                .tokens
                .insert(voucher.verification_token().as_str().to_string(), id.clone());
            state.vouchers.insert(id, Versioned { version, value: voucher });
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!(
            orders = self.staged_orders.len(),
            vouchers = self.staged_vouchers.len(),
            "Session rolled back"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::money::Money;
    use crate::order::{NewOrder, OrderMutation, OrderState};
    use crate::testing::SequenceRandom;
    use crate::voucher::{ApprovalPolicy, NewVoucher, VerificationToken, VoucherKind};
    use crate::EntityRef;
    use chrono::NaiveDate;

    fn order(id: &str) -> Order {
        Order::create(
            id,
            NewOrder {
                reference: format!("S-{}", id),
                currency: "PKR".to_string(),
                untaxed_total: Money::from_major(100),
                amount_total: Money::from_major(100),
                ..NewOrder::default()
            },
        )
        .unwrap()
    }

    fn voucher(id: &str, random: &SequenceRandom) -> Voucher {
        Voucher::create(
            id,
            NewVoucher {
                kind: VoucherKind::Payment,
                partner: EntityRef::new("p", "Partner"),
                amount: Money::from_major(10),
                currency: "PKR".to_string(),
                journal: EntityRef::new("j", "Cash"),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                memo: None,
            },
            VerificationToken::generate(random),
            &ApprovalPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let store = MemoryStore::new();
        store.seed_orders([order("o-1")]).unwrap();
        let mut session = store.begin().unwrap();
        assert_eq!(session.load_order("o-1").unwrap().id(), "o-1");
        assert_eq!(session.orders().unwrap().len(), 1);
        assert_eq!(
            session.load_order("missing").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut session = store.begin().unwrap();
        session.save_order(&order("o-1")).unwrap();
        session.rollback();

        let mut session = store.begin().unwrap();
        assert!(session.orders().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_writers_conflict() {
        let store = MemoryStore::new();
        store.seed_orders([order("o-1")]).unwrap();

        let mut a = store.begin().unwrap();
        let mut b = store.begin().unwrap();
        let mut oa = a.load_order("o-1").unwrap();
        let mut ob = b.load_order("o-1").unwrap();
        oa.apply(OrderMutation::SetState(OrderState::Sale)).unwrap();
        ob.apply(OrderMutation::SetState(OrderState::Cancel)).unwrap();
        a.save_order(&oa).unwrap();
        b.save_order(&ob).unwrap();

        a.commit().unwrap();
        let err = b.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_retryable());

        let mut check = store.begin().unwrap();
        assert_eq!(check.load_order("o-1").unwrap().state(), OrderState::Sale);
    }

    #[test]
    fn test_double_insert_conflicts() {
        let store = MemoryStore::new();
        let mut a = store.begin().unwrap();
        let mut b = store.begin().unwrap();
        a.save_order(&order("o-1")).unwrap();
        b.save_order(&order("o-1")).unwrap();
        a.commit().unwrap();
        assert_eq!(b.commit().unwrap_err().kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_sequences_never_reused() {
        let store = MemoryStore::new();
        let mut s1 = store.begin().unwrap();
        assert_eq!(s1.next_sequence("voucher.payment").unwrap(), 1);
        s1.rollback();
        let mut s2 = store.begin().unwrap();
        assert_eq!(s2.next_sequence("voucher.payment").unwrap(), 2);
        assert_eq!(s2.next_sequence("voucher.receipt").unwrap(), 1);
    }

    #[test]
    fn test_token_lookup_and_uniqueness() {
        let store = MemoryStore::new();
        let random = SequenceRandom::new(5);
        let v1 = voucher("v-1", &random);
        let token = v1.verification_token().as_str().to_string();

        let mut session = store.begin().unwrap();
        session.save_voucher(&v1).unwrap();
        session.commit().unwrap();

        let mut session = store.begin().unwrap();
        assert_eq!(session.find_voucher_by_token(&token).unwrap().id(), "v-1");
        assert_eq!(
            session.find_voucher_by_token("nope").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        // same token under another id is refused
        let clone_random = SequenceRandom::new(5);
        let v2 = voucher("v-2", &clone_random);
        assert_eq!(v2.verification_token().as_str(), token);
        let mut session = store.begin().unwrap();
        session.save_voucher(&v2).unwrap();
        assert_eq!(
            session.commit().unwrap_err().kind(),
            ErrorKind::InvariantViolation
        );
    }

    #[test]
    fn test_column_probe_scoped_to_orders() {
        let store = MemoryStore::with_columns(["project_id"]);
        assert!(store.has_column(ORDER_ENTITY, "project_id"));
        assert!(!store.has_column(ORDER_ENTITY, "booking_date"));
        assert!(!store.has_column("account.payment", "project_id"));
    }
}
