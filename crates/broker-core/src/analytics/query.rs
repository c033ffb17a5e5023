//! # Query & Aggregation Engine
//!
//! Filter first, then project. Every projection works on the same filtered
//! slice, so one snapshot of orders yields consistent sections.
//!
//! ## Segments
//! ```text
//! ┌────────────────┬──────────────────────────────────────┬──────────────────────┐
//! │ Segment        │ Membership                           │ Amount               │
//! ├────────────────┼──────────────────────────────────────┼──────────────────────┤
//! │ quotation      │ state ∈ {draft, sent}                │ amount_total         │
//! │ sales_order    │ state = sale, invoice ≠ invoiced     │ amount_total         │
//! │ invoiced       │ invoice_status = invoiced            │ invoice_amount if    │
//! │                │                                      │ available, else      │
//! │                │                                      │ amount_total         │
//! └────────────────┴──────────────────────────────────────┴──────────────────────┘
//! cancelled orders belong to no segment
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use ts_rs::TS;

use crate::analytics::filter::{DateField, DateRange, OrderFilter, ResolvedFilter};
use crate::error::CoreResult;
use crate::money::Money;
use crate::order::{InvoiceStatus, Order, OrderState};
use crate::ports::Ports;
use crate::schema::{OptionalColumn, SchemaCapabilities};
use crate::types::EntityRef;

/// Label for orders with no value on a ranking dimension.
pub const UNASSIGNED: &str = "Unassigned";

// =============================================================================
// Output Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Quotation,
    SalesOrder,
    Invoiced,
}

impl Segment {
    /// Segment of `order`, or `None` when it is cancelled or in none.
    pub fn of(order: &Order) -> Option<Segment> {
        match order.state() {
            OrderState::Cancel => None,
            OrderState::Draft | OrderState::Sent => Some(Segment::Quotation),
            _ if order.invoice_status() == InvoiceStatus::Invoiced => Some(Segment::Invoiced),
            OrderState::Sale => Some(Segment::SalesOrder),
            OrderState::Done => None,
        }
    }
}

/// Count and money sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tally {
    pub count: u32,
    pub amount: Money,
}

impl Tally {
    fn add(&mut self, amount: Money) {
        self.count += 1;
        self.amount += amount;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Scorecard {
    pub quotations: Tally,
    pub sales_orders: Tally,
    pub invoiced: Tally,
    /// Σ sale_value of non-cancelled orders; `None` without the column.
    pub sale_value: Option<Money>,
}

/// One calendar month of segment tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TimeBucket {
    /// `"Jan 2024"`.
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub quotations: Tally,
    pub sales_orders: Tally,
    pub invoiced_sales: Tally,
}

impl TimeBucket {
    pub fn total_amount(&self) -> Money {
        self.quotations.amount + self.sales_orders.amount + self.invoiced_sales.amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RankingDimension {
    Customer,
    Salesperson,
    Project,
    SaleOrderType,
    Buyer,
}

impl RankingDimension {
    pub const ALL: [RankingDimension; 5] = [
        RankingDimension::Customer,
        RankingDimension::Salesperson,
        RankingDimension::Project,
        RankingDimension::SaleOrderType,
        RankingDimension::Buyer,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            RankingDimension::Customer => "customer",
            RankingDimension::Salesperson => "salesperson",
            RankingDimension::Project => "project",
            RankingDimension::SaleOrderType => "sale_order_type",
            RankingDimension::Buyer => "buyer",
        }
    }

    /// Column the dimension needs, if it is optional.
    pub const fn required_column(&self) -> Option<OptionalColumn> {
        match self {
            RankingDimension::Customer | RankingDimension::Salesperson => None,
            RankingDimension::Project => Some(OptionalColumn::ProjectId),
            RankingDimension::SaleOrderType => Some(OptionalColumn::SaleOrderTypeId),
            RankingDimension::Buyer => Some(OptionalColumn::BuyerId),
        }
    }

    fn value<'o>(&self, order: &'o Order) -> Option<&'o EntityRef> {
        match self {
            RankingDimension::Customer => Some(order.customer()).filter(|r| !r.id.is_empty()),
            RankingDimension::Salesperson => Some(order.salesperson()).filter(|r| !r.id.is_empty()),
            RankingDimension::Project => order.project(),
            RankingDimension::SaleOrderType => order.sale_order_type(),
            RankingDimension::Buyer => order.buyer(),
        }
    }
}

impl fmt::Display for RankingDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RankingEntry {
    /// `None` for the unassigned group.
    pub id: Option<String>,
    pub label: String,
    pub amount: Money,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StateBucket {
    pub label: String,
    pub count: u32,
    pub amount: Money,
}

/// What to compute over the filtered orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Scorecard,
    TimeBuckets,
    Ranking {
        dimension: RankingDimension,
        top_n: usize,
    },
    StateDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Scorecard(Scorecard),
    TimeBuckets(Vec<TimeBucket>),
    Ranking(Vec<RankingEntry>),
    StateDistribution(Vec<StateBucket>),
    /// The projection needs a column this deployment lacks.
    Unavailable { column: OptionalColumn },
}

// =============================================================================
// Engine
// =============================================================================

/// Filter + aggregate over an order snapshot, bound to one set of schema
/// capabilities.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    caps: SchemaCapabilities,
}

impl QueryEngine {
    pub fn new(caps: SchemaCapabilities) -> Self {
        Self { caps }
    }

    pub fn capabilities(&self) -> &SchemaCapabilities {
        &self.caps
    }

    pub fn date_field(&self) -> DateField {
        DateField::resolve(&self.caps)
    }

    /// Orders passing `filter`.
    pub fn select<'o>(&self, orders: &'o [Order], filter: &OrderFilter) -> Vec<&'o Order> {
        let resolved = ResolvedFilter::new(filter, &self.caps);
        orders.iter().filter(|o| resolved.matches(o)).collect()
    }

    /// `query(filter, projection)` over a snapshot.
    pub fn query(&self, orders: &[Order], filter: &OrderFilter, projection: Projection) -> Aggregate {
        let selected = self.select(orders, filter);
        match projection {
            Projection::Scorecard => Aggregate::Scorecard(self.scorecard(&selected)),
            Projection::TimeBuckets => {
                Aggregate::TimeBuckets(self.time_buckets(&selected, filter.date_range))
            }
            Projection::Ranking { dimension, top_n } => {
                match self.ranking(&selected, dimension, top_n) {
                    Ok(entries) => Aggregate::Ranking(entries),
                    Err(column) => Aggregate::Unavailable { column },
                }
            }
            Projection::StateDistribution => {
                Aggregate::StateDistribution(self.state_distribution(&selected))
            }
        }
    }

    /// Amount an order contributes to its segment.
    pub fn segment_amount(&self, order: &Order, segment: Segment) -> Money {
        match segment {
            Segment::Invoiced if self.caps.has(OptionalColumn::InvoiceAmount) => {
                order.invoice_amount().unwrap_or(order.amount_total())
            }
            _ => order.amount_total(),
        }
    }

    pub fn scorecard(&self, orders: &[&Order]) -> Scorecard {
        let mut card = Scorecard::default();
        let with_sale_value = self.caps.has(OptionalColumn::SaleValue);
        let mut sale_value = Money::zero();
        for order in orders {
            let Some(segment) = Segment::of(order) else {
                continue;
            };
            let amount = self.segment_amount(order, segment);
            match segment {
                Segment::Quotation => card.quotations.add(amount),
                Segment::SalesOrder => card.sales_orders.add(amount),
                Segment::Invoiced => card.invoiced.add(amount),
            }
            sale_value += order.sale_value().unwrap_or_default();
        }
        card.sale_value = with_sale_value.then_some(sale_value);
        card
    }

    /// Monthly buckets over `range`, or over the span of the orders when no
    /// range is given.
    pub fn time_buckets(&self, orders: &[&Order], range: Option<DateRange>) -> Vec<TimeBucket> {
        let field = self.date_field();
        let Some(range) = range.or_else(|| span(orders, field)) else {
            return Vec::new();
        };

        let mut buckets: Vec<TimeBucket> = range
            .months()
            .into_iter()
            .map(|(year, month)| TimeBucket {
                label: month_label(year, month),
                year,
                month,
                quotations: Tally::default(),
                sales_orders: Tally::default(),
                invoiced_sales: Tally::default(),
            })
            .collect();

        for order in orders {
            let Some(segment) = Segment::of(order) else {
                continue;
            };
            let date = field.date_of(order);
            let Some(bucket) = buckets
                .iter_mut()
                .find(|b| b.year == date.year() && b.month == date.month())
            else {
                continue;
            };
            let amount = self.segment_amount(order, segment);
            match segment {
                Segment::Quotation => bucket.quotations.add(amount),
                Segment::SalesOrder => bucket.sales_orders.add(amount),
                Segment::Invoiced => bucket.invoiced_sales.add(amount),
            }
        }
        buckets
    }

    /// Top `top_n` groups by amount, or the missing column when the
    /// dimension is unavailable.
    pub fn ranking(
        &self,
        orders: &[&Order],
        dimension: RankingDimension,
        top_n: usize,
    ) -> Result<Vec<RankingEntry>, OptionalColumn> {
        if let Some(column) = dimension.required_column() {
            if !self.caps.has(column) {
                return Err(column);
            }
        }

        let mut groups: HashMap<Option<String>, RankingEntry> = HashMap::new();
        for order in orders {
            if order.state() == OrderState::Cancel {
                continue;
            }
            let value = dimension.value(order);
            let key = value.map(|r| r.id.clone());
            let entry = groups.entry(key.clone()).or_insert_with(|| RankingEntry {
                id: key,
                label: value
                    .map(|r| r.name.clone())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNASSIGNED.to_string()),
                amount: Money::zero(),
                count: 0,
            });
            entry.amount += order.amount_total();
            entry.count += 1;
        }

        let mut entries: Vec<RankingEntry> = groups.into_values().collect();
        entries.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then(b.count.cmp(&a.count))
                .then_with(|| a.label.cmp(&b.label))
        });
        entries.truncate(top_n);
        Ok(entries)
    }

    /// Quotations / Sales Orders / Completed / Cancelled.
    pub fn state_distribution(&self, orders: &[&Order]) -> Vec<StateBucket> {
        let labels = ["Quotations", "Sales Orders", "Completed", "Cancelled"];
        let mut buckets: Vec<StateBucket> = labels
            .iter()
            .map(|label| StateBucket {
                label: label.to_string(),
                count: 0,
                amount: Money::zero(),
            })
            .collect();
        for order in orders {
            let index = match order.state() {
                OrderState::Draft | OrderState::Sent => 0,
                OrderState::Sale => 1,
                OrderState::Done => 2,
                OrderState::Cancel => 3,
            };
            buckets[index].count += 1;
            buckets[index].amount += order.amount_total();
        }
        buckets
    }
}

/// Loads a snapshot through the persistence port and runs one projection.
pub fn run_query(ports: &Ports, filter: &OrderFilter, projection: Projection) -> CoreResult<Aggregate> {
    let engine = QueryEngine::new(ports.schema.capabilities());
    let mut session = ports.store.begin()?;
    let orders = session.orders()?;
    session.rollback();
    Ok(engine.query(&orders, filter, projection))
}

/// `"Jan 2024"`.
pub fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| format!("{}-{:02}", year, month))
}

fn span(orders: &[&Order], field: DateField) -> Option<DateRange> {
    let dates = orders.iter().map(|o| field.date_of(o));
    let start = dates.clone().min()?;
    let end = dates.max()?;
    DateRange::new(start, end).ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewOrder, Overlays};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(
        id: &str,
        state: OrderState,
        invoice: InvoiceStatus,
        amount: i64,
        on: NaiveDate,
        customer: &str,
    ) -> Order {
        Order::create(
            id,
            NewOrder {
                reference: id.to_uppercase(),
                currency: "PKR".to_string(),
                customer: EntityRef::new(customer, customer),
                salesperson: EntityRef::new("u-1", "Seller"),
                untaxed_total: Money::from_major(amount),
                amount_total: Money::from_major(amount),
                order_date: on,
                state,
                invoice_status: invoice,
                ..NewOrder::default()
            },
        )
        .unwrap()
    }

    fn refs(orders: &[Order]) -> Vec<&Order> {
        orders.iter().collect()
    }

    #[test]
    fn test_segments() {
        let engine = QueryEngine::new(SchemaCapabilities::minimal());
        let orders = vec![
            order("a", OrderState::Draft, InvoiceStatus::No, 10, date(2024, 1, 1), "c1"),
            order("b", OrderState::Sent, InvoiceStatus::No, 20, date(2024, 1, 1), "c1"),
            order("c", OrderState::Sale, InvoiceStatus::ToInvoice, 30, date(2024, 1, 1), "c1"),
            order("d", OrderState::Sale, InvoiceStatus::Invoiced, 40, date(2024, 1, 1), "c1"),
            order("e", OrderState::Cancel, InvoiceStatus::No, 50, date(2024, 1, 1), "c1"),
        ];
        let card = engine.scorecard(&refs(&orders));
        assert_eq!(card.quotations, Tally { count: 2, amount: Money::from_major(30) });
        assert_eq!(card.sales_orders, Tally { count: 1, amount: Money::from_major(30) });
        assert_eq!(card.invoiced, Tally { count: 1, amount: Money::from_major(40) });
        assert!(card.sale_value.is_none());
    }

    #[test]
    fn test_invoice_amount_preferred_when_available() {
        let mut invoiced = order("d", OrderState::Sale, InvoiceStatus::Invoiced, 40, date(2024, 1, 1), "c1");
        invoiced
            .apply(crate::order::OrderMutation::SetInvoiceStatus {
                status: InvoiceStatus::Invoiced,
                invoice_amount: Some(Money::from_major(25)),
            })
            .unwrap();
        let orders = vec![invoiced];
        let full = QueryEngine::new(SchemaCapabilities::full()).scorecard(&refs(&orders));
        assert_eq!(full.invoiced.amount, Money::from_major(25));
        let minimal = QueryEngine::new(SchemaCapabilities::minimal()).scorecard(&refs(&orders));
        assert_eq!(minimal.invoiced.amount, Money::from_major(40));
    }

    #[test]
    fn test_time_buckets_cover_empty_months() {
        let engine = QueryEngine::new(SchemaCapabilities::minimal());
        let orders = vec![
            order("a", OrderState::Sale, InvoiceStatus::No, 100, date(2024, 1, 5), "c1"),
            order("b", OrderState::Sale, InvoiceStatus::No, 200, date(2024, 3, 20), "c1"),
            order("c", OrderState::Cancel, InvoiceStatus::No, 999, date(2024, 3, 21), "c1"),
        ];
        let range = DateRange::new(date(2024, 1, 1), date(2024, 3, 31)).unwrap();
        let buckets = engine.time_buckets(&refs(&orders), Some(range));
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Jan 2024", "Feb 2024", "Mar 2024"]);
        let totals: Vec<Money> = buckets.iter().map(TimeBucket::total_amount).collect();
        assert_eq!(
            totals,
            vec![Money::from_major(100), Money::zero(), Money::from_major(200)]
        );
    }

    #[test]
    fn test_ranking_tie_break() {
        let engine = QueryEngine::new(SchemaCapabilities::minimal());
        let on = date(2024, 1, 1);
        let orders = vec![
            order("a", OrderState::Sale, InvoiceStatus::No, 100, on, "Zeta"),
            order("b", OrderState::Sale, InvoiceStatus::No, 50, on, "Alpha"),
            order("c", OrderState::Sale, InvoiceStatus::No, 50, on, "Alpha"),
            order("d", OrderState::Sale, InvoiceStatus::No, 100, on, "Beta"),
            order("e", OrderState::Sale, InvoiceStatus::No, 300, on, "Gamma"),
        ];
        let ranking = engine
            .ranking(&refs(&orders), RankingDimension::Customer, 10)
            .unwrap();
        let labels: Vec<&str> = ranking.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Gamma", "Alpha", "Beta", "Zeta"]);

        let top = engine
            .ranking(&refs(&orders), RankingDimension::Customer, 2)
            .unwrap();
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_ranking_unassigned_and_unavailable() {
        let mut with_project = order("a", OrderState::Sale, InvoiceStatus::No, 100, date(2024, 1, 1), "c1");
        with_project
            .apply(crate::order::OrderMutation::SetOverlays(Overlays {
                project: Some(EntityRef::new("prj-1", "Bahria Heights")),
                ..Overlays::default()
            }))
            .unwrap();
        let orders = vec![
            with_project,
            order("b", OrderState::Sale, InvoiceStatus::No, 70, date(2024, 1, 1), "c1"),
        ];

        let engine = QueryEngine::new(SchemaCapabilities::full());
        let ranking = engine
            .ranking(&refs(&orders), RankingDimension::Project, 10)
            .unwrap();
        assert_eq!(ranking[0].label, "Bahria Heights");
        assert_eq!(ranking[1].label, UNASSIGNED);
        assert!(ranking[1].id.is_none());

        let minimal = QueryEngine::new(SchemaCapabilities::minimal());
        let aggregate = minimal.query(
            &orders,
            &OrderFilter::default(),
            Projection::Ranking {
                dimension: RankingDimension::Project,
                top_n: 5,
            },
        );
        assert_eq!(
            aggregate,
            Aggregate::Unavailable {
                column: OptionalColumn::ProjectId
            }
        );
    }

    #[test]
    fn test_state_distribution_labels() {
        let engine = QueryEngine::new(SchemaCapabilities::minimal());
        let on = date(2024, 1, 1);
        let orders = vec![
            order("a", OrderState::Draft, InvoiceStatus::No, 10, on, "c1"),
            order("b", OrderState::Sent, InvoiceStatus::No, 10, on, "c1"),
            order("c", OrderState::Done, InvoiceStatus::Invoiced, 30, on, "c1"),
            order("d", OrderState::Cancel, InvoiceStatus::No, 5, on, "c1"),
        ];
        let dist = engine.state_distribution(&refs(&orders));
        assert_eq!(dist[0].label, "Quotations");
        assert_eq!(dist[0].count, 2);
        assert_eq!(dist[1].count, 0);
        assert_eq!(dist[2].amount, Money::from_major(30));
        assert_eq!(dist[3].label, "Cancelled");
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(2024, 2), "Feb 2024");
    }
}
