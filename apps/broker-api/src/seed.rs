//! Demo data for a fresh in-memory store.
//!
//! Orders land over the last three months so the default dashboard range
//! shows every tile. One payment voucher is submitted so the verification
//! endpoint has something to answer.

use broker_core::order::{
    CalcType, InvoiceStatus, NewOrder, Order, OrderState, Overlays, RecipientConfig,
};
use broker_core::voucher::{NewVoucher, VoucherKind};
use broker_core::{
    Actor, Capability, CoreResult, EntityRef, Identity, Money, Rate, Slot, VoucherWorkflow,
};
use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::state::AppState;

/// Identity used while seeding. Holds only `payment.submit`.
struct SeedIdentity(Actor);

impl Identity for SeedIdentity {
    fn current_actor(&self) -> CoreResult<Actor> {
        Ok(self.0.clone())
    }

    fn has_capability(&self, _actor: &Actor, capability: Capability) -> bool {
        capability == Capability::PaymentSubmit
    }
}

struct DemoOrder {
    customer: &'static str,
    project: &'static str,
    days_ago: i64,
    untaxed_major: i64,
    state: OrderState,
    invoice_status: InvoiceStatus,
}

const DEMO_ORDERS: [DemoOrder; 6] = [
    DemoOrder {
        customer: "Ali Raza",
        project: "Canal View",
        days_ago: 80,
        untaxed_major: 4_500_000,
        state: OrderState::Sale,
        invoice_status: InvoiceStatus::Invoiced,
    },
    DemoOrder {
        customer: "Bilal Ahmed",
        project: "Canal View",
        days_ago: 62,
        untaxed_major: 3_200_000,
        state: OrderState::Sale,
        invoice_status: InvoiceStatus::ToInvoice,
    },
    DemoOrder {
        customer: "Amna Khan",
        project: "Lake City",
        days_ago: 41,
        untaxed_major: 7_800_000,
        state: OrderState::Done,
        invoice_status: InvoiceStatus::Invoiced,
    },
    DemoOrder {
        customer: "Zara Malik",
        project: "Lake City",
        days_ago: 25,
        untaxed_major: 2_100_000,
        state: OrderState::Sent,
        invoice_status: InvoiceStatus::No,
    },
    DemoOrder {
        customer: "Ali Raza",
        project: "Bahria Heights",
        days_ago: 12,
        untaxed_major: 5_600_000,
        state: OrderState::Sale,
        invoice_status: InvoiceStatus::ToInvoice,
    },
    DemoOrder {
        customer: "Kamran Shah",
        project: "Bahria Heights",
        days_ago: 3,
        untaxed_major: 1_900_000,
        state: OrderState::Cancel,
        invoice_status: InvoiceStatus::No,
    },
];

fn demo_order(index: usize, demo: &DemoOrder, today: NaiveDate, currency: &str) -> CoreResult<Order> {
    let untaxed = Money::from_major(demo.untaxed_major);
    let day = today - Duration::days(demo.days_ago);
    let slug = |s: &str| s.to_lowercase().replace(' ', "-");

    Order::create(
        format!("demo-{}", index + 1),
        NewOrder {
            reference: format!("S{:05}", index + 1),
            customer: EntityRef::new(format!("c-{}", slug(demo.customer)), demo.customer),
            salesperson: EntityRef::new("u-sales", "Sana Iqbal"),
            currency: currency.to_string(),
            untaxed_total: untaxed,
            amount_total: untaxed + untaxed.percent(Rate::from_bps(1_600)),
            sale_value: Some(untaxed),
            order_date: day,
            state: demo.state,
            invoice_status: demo.invoice_status,
            invoice_amount: (demo.invoice_status == InvoiceStatus::Invoiced).then_some(untaxed),
            overlays: Overlays {
                booking_date: Some(day),
                project: Some(EntityRef::new(format!("prj-{}", slug(demo.project)), demo.project)),
                buyer: Some(EntityRef::new(format!("b-{}", slug(demo.customer)), demo.customer)),
                ..Overlays::default()
            },
            recipients: vec![
                RecipientConfig::percent(
                    Slot::Broker,
                    Some(EntityRef::new("p-broker", "Prime Realty")),
                    CalcType::PercentOfUntaxed,
                    Rate::from_bps(200),
                ),
                RecipientConfig::percent(
                    Slot::Agent1,
                    Some(EntityRef::new("p-agent", "Usman Tariq")),
                    CalcType::PercentOfSalesValue,
                    Rate::from_bps(100),
                ),
                RecipientConfig::fixed(
                    Slot::Referrer,
                    Some(EntityRef::new("p-ref", "Hina Javed")),
                    Money::from_major(25_000),
                ),
            ],
            ..NewOrder::default()
        },
    )
}

/// Seeds demo orders and one submitted payment voucher.
pub fn seed_demo(state: &AppState, currency: &str) -> CoreResult<usize> {
    let today = state.ports.clock.today();
    let orders = DEMO_ORDERS
        .iter()
        .enumerate()
        .map(|(i, demo)| demo_order(i, demo, today, currency))
        .collect::<CoreResult<Vec<_>>>()?;
    let count = orders.len();
    state.store.seed_orders(orders)?;

    let identity = SeedIdentity(Actor::new("system.seed", "Demo Seed"));
    let workflow = VoucherWorkflow::new(&state.ports, &identity, &state.vouchers);
    let voucher = workflow.create(NewVoucher {
        kind: VoucherKind::Payment,
        partner: EntityRef::new("p-broker", "Prime Realty"),
        amount: Money::from_major(90_000),
        currency: state.payment_currency.clone(),
        journal: EntityRef::new("j-bank", "Bank"),
        date: today,
        memo: Some("Broker commission advance".to_string()),
    })?;
    let voucher = workflow.submit(voucher.id())?;

    info!(
        orders = count,
        voucher = voucher.reference().unwrap_or("-"),
        verify_url = %workflow.verification_url(&voucher),
        "Demo data seeded"
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use broker_core::{CommissionWorkflow, DashboardComposer, DashboardQuery};

    #[test]
    fn test_seeded_store_feeds_dashboard_and_commission() {
        let state = AppState::from_config(&BrokerConfig::default());
        assert_eq!(seed_demo(&state, "PKR").unwrap(), DEMO_ORDERS.len());

        let today = state.ports.clock.today();
        let payload = DashboardComposer::new(&state.ports)
            .compose(&DashboardQuery::new(today - Duration::days(90), today))
            .unwrap();
        assert!(payload.scorecard.sales_orders.count > 0);

        let report = CommissionWorkflow::new(&state.ports, &SeedIdentity(Actor::new("t", "T")))
            .report("demo-1")
            .unwrap();
        assert_eq!(report.recipients.len(), 3);
    }
}
