//! # Dashboard Composer
//!
//! Turns one dashboard request into a chart-ready payload.
//!
//! ## Payload
//! ```text
//! DashboardPayload
//! ├── date_field            booking_date | order_date
//! ├── scorecard             quotations, sales_orders, invoiced (+ sale_value)
//! ├── state_distribution    {labels, datasets: [count, amount]}
//! ├── time_series           {labels, datasets: [quotations, sales_orders,
//! │                                             invoiced_sales, total_amount]}
//! ├── rankings[]            customer, salesperson, project?, sale_order_type?
//! └── integration_status    {column: available}
//! ```
//!
//! Sections that need a missing optional column are left out and the
//! status map says so. Composition never fails on a missing column.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use ts_rs::TS;

use crate::analytics::{
    format_money_compact, DateField, DateRange, OrderFilter, QueryEngine, RankingDimension,
    RankingEntry, StateBucket, Tally, TimeBucket,
};
use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::order::{InvoiceStatus, Order, OrderState};
use crate::ports::Ports;
use crate::schema::SchemaCapabilities;

/// Rows per ranking when the request does not say.
pub const DEFAULT_RANKING_TOP_N: usize = 10;

/// Dimensions shown on the dashboard, in display order.
const DASHBOARD_RANKINGS: [RankingDimension; 4] = [
    RankingDimension::Customer,
    RankingDimension::Salesperson,
    RankingDimension::Project,
    RankingDimension::SaleOrderType,
];

// =============================================================================
// Request
// =============================================================================

/// Dashboard request body. Amount bounds are in cents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardQuery {
    #[ts(type = "string")]
    pub date_from: NaiveDate,
    #[ts(type = "string")]
    pub date_to: NaiveDate,
    #[serde(default)]
    pub states: Option<Vec<OrderState>>,
    #[serde(default)]
    pub invoice_statuses: Option<Vec<InvoiceStatus>>,
    #[serde(default)]
    pub sale_order_type_ids: Option<Vec<String>>,
    #[serde(default)]
    pub project_ids: Option<Vec<String>>,
    #[serde(default)]
    pub buyer_ids: Option<Vec<String>>,
    #[serde(default)]
    pub customer_ids: Option<Vec<String>>,
    #[serde(default)]
    pub salesperson_ids: Option<Vec<String>>,
    #[serde(default)]
    pub user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub amount_min: Option<Money>,
    #[serde(default)]
    pub amount_max: Option<Money>,
    #[serde(default)]
    pub top_n: Option<u32>,
}

impl DashboardQuery {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            date_from,
            date_to,
            ..Self::default()
        }
    }

    pub fn to_filter(&self) -> CoreResult<OrderFilter> {
        let range = DateRange::new(self.date_from, self.date_to)?;
        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if min > max {
                return Err(ValidationError::InvalidFormat {
                    field: "amount_min".to_string(),
                    reason: format!("{} is above amount_max {}", min, max),
                }
                .into());
            }
        }
        Ok(OrderFilter {
            date_range: Some(range),
            states: self.states.clone().unwrap_or_default(),
            invoice_statuses: self.invoice_statuses.clone().unwrap_or_default(),
            sale_order_type_ids: self.sale_order_type_ids.clone().unwrap_or_default(),
            project_ids: self.project_ids.clone().unwrap_or_default(),
            buyer_ids: self.buyer_ids.clone().unwrap_or_default(),
            customer_ids: self.customer_ids.clone().unwrap_or_default(),
            salesperson_ids: self.salesperson_ids.clone().unwrap_or_default(),
            user_ids: self.user_ids.clone().unwrap_or_default(),
            amount_min: self.amount_min,
            amount_max: self.amount_max,
        })
    }
}

// =============================================================================
// Payload
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dataset {
    pub key: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl ChartData {
    fn dataset(&mut self, key: &str, values: Vec<f64>) {
        self.datasets.push(Dataset {
            key: key.to_string(),
            values,
        });
    }

    pub fn values(&self, key: &str) -> Option<&[f64]> {
        self.datasets
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.values.as_slice())
    }
}

/// A scorecard tile: raw numbers plus the compact display string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tile {
    pub count: u32,
    pub amount: Money,
    pub display: String,
}

impl From<Tally> for Tile {
    fn from(tally: Tally) -> Self {
        Self {
            count: tally.count,
            amount: tally.amount,
            display: format_money_compact(tally.amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScorecardTiles {
    pub quotations: Tile,
    pub sales_orders: Tile,
    pub invoiced: Tile,
    /// Present when the sale value column exists.
    pub sale_value: Option<Tile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RankingSection {
    pub dimension: RankingDimension,
    pub entries: Vec<RankingEntry>,
    pub chart: ChartData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardPayload {
    pub date_field: DateField,
    pub scorecard: ScorecardTiles,
    pub state_distribution: ChartData,
    pub time_series: ChartData,
    pub rankings: Vec<RankingSection>,
    pub integration_status: BTreeMap<String, bool>,
}

impl DashboardPayload {
    pub fn ranking(&self, dimension: RankingDimension) -> Option<&RankingSection> {
        self.rankings.iter().find(|r| r.dimension == dimension)
    }
}

// =============================================================================
// Composer
// =============================================================================

pub struct DashboardComposer<'a> {
    ports: &'a Ports,
    default_top_n: usize,
}

impl<'a> DashboardComposer<'a> {
    pub fn new(ports: &'a Ports) -> Self {
        Self {
            ports,
            default_top_n: DEFAULT_RANKING_TOP_N,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n;
        self
    }

    /// Reads one snapshot and builds the payload from it.
    pub fn compose(&self, query: &DashboardQuery) -> CoreResult<DashboardPayload> {
        let filter = query.to_filter()?;
        let top_n = query.top_n.map_or(self.default_top_n, |n| n as usize);
        let caps = self.ports.schema.capabilities();

        let mut session = self.ports.store.begin()?;
        let orders = session.orders()?;
        session.rollback();

        let payload = compose_payload(&caps, &orders, &filter, top_n);
        info!(
            orders = orders.len(),
            from = %query.date_from,
            to = %query.date_to,
            rankings = payload.rankings.len(),
            "Dashboard composed"
        );
        Ok(payload)
    }
}

/// Builds the payload from an already-loaded snapshot.
pub fn compose_payload(
    caps: &SchemaCapabilities,
    orders: &[Order],
    filter: &OrderFilter,
    top_n: usize,
) -> DashboardPayload {
    let engine = QueryEngine::new(caps.clone());
    let selected = engine.select(orders, filter);

    let card = engine.scorecard(&selected);
    let scorecard = ScorecardTiles {
        quotations: card.quotations.into(),
        sales_orders: card.sales_orders.into(),
        invoiced: card.invoiced.into(),
        sale_value: card.sale_value.map(|amount| Tile {
            count: 0,
            amount,
            display: format_money_compact(amount),
        }),
    };

    let rankings = DASHBOARD_RANKINGS
        .iter()
        .filter_map(|dimension| match engine.ranking(&selected, *dimension, top_n) {
            Ok(entries) => Some(RankingSection {
                dimension: *dimension,
                chart: ranking_chart(&entries),
                entries,
            }),
            Err(column) => {
                debug!(dimension = %dimension, column = %column, "Ranking omitted");
                None
            }
        })
        .collect();

    DashboardPayload {
        date_field: engine.date_field(),
        scorecard,
        state_distribution: state_chart(&engine.state_distribution(&selected)),
        time_series: time_chart(&engine.time_buckets(&selected, filter.date_range)),
        rankings,
        integration_status: caps.integration_status(),
    }
}

fn major(amount: Money) -> f64 {
    amount.to_major_f64()
}

fn state_chart(buckets: &[StateBucket]) -> ChartData {
    let mut chart = ChartData {
        labels: buckets.iter().map(|b| b.label.clone()).collect(),
        datasets: Vec::new(),
    };
    chart.dataset("count", buckets.iter().map(|b| b.count as f64).collect());
    chart.dataset("amount", buckets.iter().map(|b| major(b.amount)).collect());
    chart
}

fn time_chart(buckets: &[TimeBucket]) -> ChartData {
    let mut chart = ChartData {
        labels: buckets.iter().map(|b| b.label.clone()).collect(),
        datasets: Vec::new(),
    };
    chart.dataset("quotations", buckets.iter().map(|b| major(b.quotations.amount)).collect());
    chart.dataset("sales_orders", buckets.iter().map(|b| major(b.sales_orders.amount)).collect());
    chart.dataset(
        "invoiced_sales",
        buckets.iter().map(|b| major(b.invoiced_sales.amount)).collect(),
    );
    chart.dataset("total_amount", buckets.iter().map(|b| major(b.total_amount())).collect());
    chart
}

fn ranking_chart(entries: &[RankingEntry]) -> ChartData {
    let mut chart = ChartData {
        labels: entries.iter().map(|e| e.label.clone()).collect(),
        datasets: Vec::new(),
    };
    chart.dataset("amount", entries.iter().map(|e| major(e.amount)).collect());
    chart.dataset("count", entries.iter().map(|e| e.count as f64).collect());
    chart
}

// =============================================================================
// Unit Tests
// =============================================================================
