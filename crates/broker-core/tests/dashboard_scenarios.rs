//! Dashboard composition over deployments with and without the optional
//! real-estate columns.

use chrono::NaiveDate;

use broker_core::analytics::{DateField, QueryEngine, RankingDimension, UNASSIGNED};
use broker_core::order::{InvoiceStatus, NewOrder, Order, OrderState, Overlays};
use broker_core::schema::{OptionalColumn, SchemaCapabilities};
use broker_core::testing::TestHarness;
use broker_core::{DashboardComposer, DashboardQuery, EntityRef, ErrorKind, MemoryStore, Money};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sale(id: &str, customer: &str, day: NaiveDate, amount: i64) -> Order {
    Order::create(
        id,
        NewOrder {
            reference: format!("S-{}", id),
            customer: EntityRef::new(format!("c-{}", customer), customer),
            salesperson: EntityRef::new("u-1", "Sana"),
            currency: "PKR".to_string(),
            untaxed_total: Money::from_major(amount),
            amount_total: Money::from_major(amount),
            order_date: day,
            state: OrderState::Sale,
            invoice_status: InvoiceStatus::ToInvoice,
            overlays: Overlays {
                project: Some(EntityRef::new("prj-1", "Canal View")),
                ..Overlays::default()
            },
            ..NewOrder::default()
        },
    )
    .unwrap()
}

fn winter_orders() -> Vec<Order> {
    vec![
        sale("o-1", "Ali", date(2024, 1, 10), 100),
        sale("o-2", "Bilal", date(2024, 1, 20), 200),
        sale("o-3", "Ali", date(2024, 2, 5), 300),
    ]
}

#[test]
fn test_dashboard_without_booking_date_or_sale_type() {
    let store = MemoryStore::with_columns(["project_id", "buyer_id", "invoice_amount", "sale_value"]);
    store.seed_orders(winter_orders()).unwrap();
    let harness = TestHarness::with_store(store);

    let payload = DashboardComposer::new(&harness.ports)
        .compose(&DashboardQuery::new(date(2024, 1, 1), date(2024, 2, 28)))
        .unwrap();

    assert_eq!(payload.date_field, DateField::OrderDate);
    assert_eq!(payload.scorecard.sales_orders.count, 3);
    assert_eq!(payload.scorecard.sales_orders.amount, Money::from_major(600));
    assert_eq!(payload.scorecard.quotations.count, 0);
    assert_eq!(payload.scorecard.invoiced.count, 0);

    assert_eq!(payload.time_series.labels, vec!["Jan 2024", "Feb 2024"]);
    assert_eq!(payload.time_series.values("total_amount"), Some(&[300.0, 300.0][..]));

    assert_eq!(payload.integration_status.get("booking_date"), Some(&false));
    assert_eq!(payload.integration_status.get("sale_order_type_id"), Some(&false));
    assert_eq!(payload.integration_status.get("project_id"), Some(&true));

    assert!(payload.ranking(RankingDimension::SaleOrderType).is_none());
    let customers = payload.ranking(RankingDimension::Customer).unwrap();
    assert_eq!(customers.entries[0].label, "Ali");
    assert_eq!(customers.entries[0].amount, Money::from_major(400));
    assert_eq!(customers.entries[0].count, 2);
    assert!(payload.ranking(RankingDimension::Project).is_some());
}

#[test]
fn test_booking_date_drives_buckets_when_present() {
    let mut orders = winter_orders();
    // Booked in February although ordered in January.
    orders[0] = Order::create(
        "o-1",
        NewOrder {
            reference: "S-o-1".to_string(),
            currency: "PKR".to_string(),
            untaxed_total: Money::from_major(100),
            amount_total: Money::from_major(100),
            order_date: date(2024, 1, 10),
            state: OrderState::Sale,
            overlays: Overlays {
                booking_date: Some(date(2024, 2, 1)),
                ..Overlays::default()
            },
            ..NewOrder::default()
        },
    )
    .unwrap();
    let store = MemoryStore::new();
    store.seed_orders(orders).unwrap();
    let harness = TestHarness::with_store(store);

    let payload = DashboardComposer::new(&harness.ports)
        .compose(&DashboardQuery::new(date(2024, 1, 1), date(2024, 2, 29)))
        .unwrap();
    assert_eq!(payload.date_field, DateField::BookingDate);
    assert_eq!(payload.time_series.values("total_amount"), Some(&[200.0, 400.0][..]));
}

#[test]
fn test_inverted_range_is_invalid_input() {
    let harness = TestHarness::new();
    let err = DashboardComposer::new(&harness.ports)
        .compose(&DashboardQuery::new(date(2024, 3, 1), date(2024, 1, 1)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_every_column_subset_composes() {
    for mask in 0u32..(1 << OptionalColumn::ALL.len()) {
        let present: Vec<OptionalColumn> = OptionalColumn::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, c)| *c)
            .collect();
        let store = MemoryStore::with_columns(present.iter().map(|c| c.column_name()));
        store.seed_orders(winter_orders()).unwrap();
        let harness = TestHarness::with_store(store);

        let payload = DashboardComposer::new(&harness.ports)
            .compose(&DashboardQuery::new(date(2024, 1, 1), date(2024, 12, 31)))
            .unwrap_or_else(|e| panic!("mask {:06b}: {}", mask, e));

        for column in OptionalColumn::ALL {
            assert_eq!(
                payload.integration_status.get(column.column_name()),
                Some(&present.contains(&column)),
                "mask {:06b}, column {}",
                mask,
                column
            );
        }
        assert_eq!(
            payload.ranking(RankingDimension::Project).is_some(),
            present.contains(&OptionalColumn::ProjectId)
        );
        assert_eq!(
            payload.scorecard.sale_value.is_some(),
            present.contains(&OptionalColumn::SaleValue)
        );
        assert_eq!(payload.time_series.labels.len(), 12);
    }
}

#[test]
fn test_ranking_tie_break() {
    let orders = vec![
        sale("o-1", "Zara", date(2024, 1, 1), 100),
        sale("o-2", "Bilal", date(2024, 1, 2), 50),
        sale("o-3", "Bilal", date(2024, 1, 3), 50),
        sale("o-4", "Amna", date(2024, 1, 4), 100),
        sale("o-5", "Kamran", date(2024, 1, 5), 150),
    ];
    let engine = QueryEngine::new(SchemaCapabilities::full());
    let selected: Vec<&Order> = orders.iter().collect();
    let entries = engine
        .ranking(&selected, RankingDimension::Customer, 10)
        .unwrap();
    let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["Kamran", "Bilal", "Amna", "Zara"]);

    let top = engine.ranking(&selected, RankingDimension::Customer, 2).unwrap();
    assert_eq!(top.len(), 2);
}

#[test]
fn test_missing_dimension_value_is_unassigned() {
    let orders = vec![sale("o-1", "Ali", date(2024, 1, 1), 100)];
    let engine = QueryEngine::new(SchemaCapabilities::full());
    let selected: Vec<&Order> = orders.iter().collect();
    let entries = engine.ranking(&selected, RankingDimension::Buyer, 5).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].label, UNASSIGNED);
    assert_eq!(entries[0].id, None);
}
