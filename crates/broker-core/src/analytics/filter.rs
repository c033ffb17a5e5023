//! Order filters and the schema-aware rules for applying them.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::order::{InvoiceStatus, Order, OrderState};
use crate::schema::{OptionalColumn, SchemaCapabilities};
use crate::types::EntityRef;
use crate::validation::validate_date_range;

/// Which order date the range and the buckets are evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    BookingDate,
    OrderDate,
}

impl DateField {
    /// `booking_date` when the column exists, else `order_date`.
    pub fn resolve(caps: &SchemaCapabilities) -> Self {
        if caps.has(OptionalColumn::BookingDate) {
            DateField::BookingDate
        } else {
            DateField::OrderDate
        }
    }

    /// The order's date on this field. Orders without a booking date fall
    /// back to their order date.
    pub fn date_of(&self, order: &Order) -> NaiveDate {
        match self {
            DateField::BookingDate => order.booking_date().unwrap_or(order.order_date()),
            DateField::OrderDate => order.order_date(),
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        validate_date_range(start, end)?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `(year, month)` for every month the range touches, in order.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let mut months = Vec::new();
        let (mut year, mut month) = (self.start.year(), self.start.month());
        let last = (self.end.year(), self.end.month());
        while (year, month) <= last {
            months.push((year, month));
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        months
    }
}

/// Conjunction of optional constraints. Empty lists mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub date_range: Option<DateRange>,
    pub states: Vec<OrderState>,
    pub invoice_statuses: Vec<InvoiceStatus>,
    /// Ignored when the sale order type column is absent.
    pub sale_order_type_ids: Vec<String>,
    /// Ignored when the project column is absent.
    pub project_ids: Vec<String>,
    /// Ignored when the buyer column is absent.
    pub buyer_ids: Vec<String>,
    pub customer_ids: Vec<String>,
    pub salesperson_ids: Vec<String>,
    /// Responsible users; matched against the salesperson.
    pub user_ids: Vec<String>,
    /// Inclusive bounds on `amount_total`.
    pub amount_min: Option<Money>,
    pub amount_max: Option<Money>,
}

/// A filter bound to the columns a deployment actually has.
pub struct ResolvedFilter<'a> {
    filter: &'a OrderFilter,
    date_field: DateField,
    sale_order_type: bool,
    project: bool,
    buyer: bool,
}

impl<'a> ResolvedFilter<'a> {
    pub fn new(filter: &'a OrderFilter, caps: &SchemaCapabilities) -> Self {
        let resolved = Self {
            filter,
            date_field: DateField::resolve(caps),
            sale_order_type: caps.has(OptionalColumn::SaleOrderTypeId),
            project: caps.has(OptionalColumn::ProjectId),
            buyer: caps.has(OptionalColumn::BuyerId),
        };
        if !resolved.sale_order_type && !filter.sale_order_type_ids.is_empty() {
            debug!("Ignoring sale order type filter, column absent");
        }
        if !resolved.project && !filter.project_ids.is_empty() {
            debug!("Ignoring project filter, column absent");
        }
        if !resolved.buyer && !filter.buyer_ids.is_empty() {
            debug!("Ignoring buyer filter, column absent");
        }
        resolved
    }

    pub fn date_field(&self) -> DateField {
        self.date_field
    }

    pub fn matches(&self, order: &Order) -> bool {
        let f = self.filter;
        if let Some(range) = f.date_range {
            if !range.contains(self.date_field.date_of(order)) {
                return false;
            }
        }
        if !f.states.is_empty() && !f.states.contains(&order.state()) {
            return false;
        }
        if !f.invoice_statuses.is_empty() && !f.invoice_statuses.contains(&order.invoice_status()) {
            return false;
        }
        if self.sale_order_type && !ref_in(order.sale_order_type(), &f.sale_order_type_ids) {
            return false;
        }
        if self.project && !ref_in(order.project(), &f.project_ids) {
            return false;
        }
        if self.buyer && !ref_in(order.buyer(), &f.buyer_ids) {
            return false;
        }
        if !ref_in(Some(order.customer()), &f.customer_ids)
            || !ref_in(Some(order.salesperson()), &f.salesperson_ids)
            || !ref_in(Some(order.salesperson()), &f.user_ids)
        {
            return false;
        }
        if f.amount_min.is_some_and(|min| order.amount_total() < min) {
            return false;
        }
        if f.amount_max.is_some_and(|max| order.amount_total() > max) {
            return false;
        }
        true
    }
}

/// True when `ids` is empty or the reference's id is listed.
fn ref_in(reference: Option<&EntityRef>, ids: &[String]) -> bool {
    ids.is_empty() || reference.is_some_and(|r| ids.iter().any(|id| *id == r.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewOrder, Overlays};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(order_date: NaiveDate, booking: Option<NaiveDate>, project: Option<&str>) -> Order {
        Order::create(
            "o-1",
            NewOrder {
                currency: "PKR".to_string(),
                customer: EntityRef::new("c-1", "Customer"),
                salesperson: EntityRef::new("u-1", "Seller"),
                untaxed_total: Money::from_major(100),
                amount_total: Money::from_major(100),
                order_date,
                overlays: Overlays {
                    booking_date: booking,
                    project: project.map(|p| EntityRef::new(p, p)),
                    ..Overlays::default()
                },
                ..NewOrder::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_months_span_year_end() {
        let range = DateRange::new(date(2023, 11, 15), date(2024, 2, 1)).unwrap();
        assert_eq!(range.months(), vec![(2023, 11), (2023, 12), (2024, 1), (2024, 2)]);
        assert!(DateRange::new(date(2024, 2, 1), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_booking_date_preferred_when_present() {
        let o = order(date(2024, 1, 10), Some(date(2024, 3, 5)), None);
        let filter = OrderFilter {
            date_range: Some(DateRange::new(date(2024, 3, 1), date(2024, 3, 31)).unwrap()),
            ..OrderFilter::default()
        };
        assert!(ResolvedFilter::new(&filter, &SchemaCapabilities::full()).matches(&o));
        assert!(!ResolvedFilter::new(&filter, &SchemaCapabilities::minimal()).matches(&o));

        let unbooked = order(date(2024, 3, 10), None, None);
        assert!(ResolvedFilter::new(&filter, &SchemaCapabilities::full()).matches(&unbooked));
    }

    #[test]
    fn test_absent_column_filter_is_ignored() {
        let o = order(date(2024, 1, 10), None, Some("prj-1"));
        let filter = OrderFilter {
            project_ids: vec!["prj-2".to_string()],
            ..OrderFilter::default()
        };
        assert!(!ResolvedFilter::new(&filter, &SchemaCapabilities::full()).matches(&o));
        assert!(ResolvedFilter::new(&filter, &SchemaCapabilities::minimal()).matches(&o));
    }

    #[test]
    fn test_amount_bounds_inclusive() {
        let o = order(date(2024, 1, 10), None, None);
        let caps = SchemaCapabilities::full();
        let filter = OrderFilter {
            amount_min: Some(Money::from_major(100)),
            amount_max: Some(Money::from_major(100)),
            ..OrderFilter::default()
        };
        assert!(ResolvedFilter::new(&filter, &caps).matches(&o));
        let filter = OrderFilter {
            amount_min: Some(Money::from_major(101)),
            ..OrderFilter::default()
        };
        assert!(!ResolvedFilter::new(&filter, &caps).matches(&o));
    }

    #[test]
    fn test_user_ids_match_salesperson() {
        let o = order(date(2024, 1, 10), None, None);
        let caps = SchemaCapabilities::full();
        let filter = OrderFilter {
            user_ids: vec!["u-1".to_string()],
            ..OrderFilter::default()
        };
        assert!(ResolvedFilter::new(&filter, &caps).matches(&o));
        let filter = OrderFilter {
            user_ids: vec!["u-9".to_string()],
            ..OrderFilter::default()
        };
        assert!(!ResolvedFilter::new(&filter, &caps).matches(&o));
    }
}
