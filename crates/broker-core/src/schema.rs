//! # Schema Probe
//!
//! Answers "does the backing store have this optional order column?" once
//! per column per process, then serves the answer from a cache.
//!
//! ## Degradation
//! ```text
//! ┌───────────────────┬────────────────────────────────────────────────────┐
//! │ Column missing    │ Query / dashboard behaviour                        │
//! ├───────────────────┼────────────────────────────────────────────────────┤
//! │ booking_date      │ date range and buckets use order_date              │
//! │ sale_order_type_id│ filter ignored, ranking section omitted            │
//! │ project_id        │ filter ignored, ranking section omitted            │
//! │ buyer_id          │ filter ignored, ranking section omitted            │
//! │ invoice_amount    │ invoiced segment sums amount_total                 │
//! │ sale_value        │ no sale value tile                                 │
//! └───────────────────┴────────────────────────────────────────────────────┘
//! ```
//!
//! Schema changes require a process restart, so the cache is never
//! invalidated.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;
use ts_rs::TS;

use crate::ports::Persistence;

/// Entity name the order columns are probed on.
pub const ORDER_ENTITY: &str = "sale.order";

/// Order columns that may or may not exist in a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OptionalColumn {
    BookingDate,
    SaleOrderTypeId,
    ProjectId,
    BuyerId,
    InvoiceAmount,
    SaleValue,
}

impl OptionalColumn {
    pub const ALL: [OptionalColumn; 6] = [
        OptionalColumn::BookingDate,
        OptionalColumn::SaleOrderTypeId,
        OptionalColumn::ProjectId,
        OptionalColumn::BuyerId,
        OptionalColumn::InvoiceAmount,
        OptionalColumn::SaleValue,
    ];

    pub const fn column_name(&self) -> &'static str {
        match self {
            OptionalColumn::BookingDate => "booking_date",
            OptionalColumn::SaleOrderTypeId => "sale_order_type_id",
            OptionalColumn::ProjectId => "project_id",
            OptionalColumn::BuyerId => "buyer_id",
            OptionalColumn::InvoiceAmount => "invoice_amount",
            OptionalColumn::SaleValue => "sale_value",
        }
    }
}

impl fmt::Display for OptionalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Cached, process-local column probe. Cloning shares the cache.
#[derive(Clone)]
pub struct SchemaProbe {
    store: Arc<dyn Persistence>,
    cache: Arc<RwLock<HashMap<OptionalColumn, bool>>>,
}

impl SchemaProbe {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn has(&self, column: OptionalColumn) -> bool {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(present) = cache.get(&column) {
                return *present;
            }
        }
        let present = self.store.has_column(ORDER_ENTITY, column.column_name());
        debug!(column = %column, present, "Probed optional column");
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(column, present);
        present
    }

    /// Probes every optional column.
    pub fn capabilities(&self) -> SchemaCapabilities {
        SchemaCapabilities {
            present: OptionalColumn::ALL
                .iter()
                .map(|c| (*c, self.has(*c)))
                .collect(),
        }
    }
}

/// Snapshot of which optional columns are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCapabilities {
    present: BTreeMap<OptionalColumn, bool>,
}

impl SchemaCapabilities {
    /// Every optional column present.
    pub fn full() -> Self {
        Self::from_present(OptionalColumn::ALL)
    }

    /// No optional column present.
    pub fn minimal() -> Self {
        Self::from_present([])
    }

    pub fn from_present(columns: impl IntoIterator<Item = OptionalColumn>) -> Self {
        let mut present: BTreeMap<OptionalColumn, bool> =
            OptionalColumn::ALL.iter().map(|c| (*c, false)).collect();
        for column in columns {
            present.insert(column, true);
        }
        Self { present }
    }

    pub fn has(&self, column: OptionalColumn) -> bool {
        self.present.get(&column).copied().unwrap_or(false)
    }

    /// `column name → available`, as exposed on the dashboard.
    pub fn integration_status(&self) -> BTreeMap<String, bool> {
        self.present
            .iter()
            .map(|(c, p)| (c.column_name().to_string(), *p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        inner: MemoryStore,
        probes: AtomicUsize,
    }

    impl Persistence for CountingStore {
        fn begin(&self) -> crate::CoreResult<Box<dyn crate::ports::Session + '_>> {
            self.inner.begin()
        }

        fn has_column(&self, entity: &str, column: &str) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.inner.has_column(entity, column)
        }
    }

    #[test]
    fn test_probe_is_cached() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::with_columns(["booking_date"]),
            probes: AtomicUsize::new(0),
        });
        let probe = SchemaProbe::new(store.clone());
        assert!(probe.has(OptionalColumn::BookingDate));
        assert!(probe.has(OptionalColumn::BookingDate));
        assert!(!probe.has(OptionalColumn::ProjectId));
        assert_eq!(store.probes.load(Ordering::SeqCst), 2);

        let shared = probe.clone();
        assert!(!shared.has(OptionalColumn::ProjectId));
        assert_eq!(store.probes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_integration_status_lists_every_column() {
        let caps = SchemaCapabilities::from_present([OptionalColumn::ProjectId]);
        let status = caps.integration_status();
        assert_eq!(status.len(), OptionalColumn::ALL.len());
        assert_eq!(status["project_id"], true);
        assert_eq!(status["booking_date"], false);
        assert_eq!(status["sale_order_type_id"], false);
    }
}
