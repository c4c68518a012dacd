//! Fee policy: pure derivation of per-order fees from explicit settings.
//! Same inputs, same output — no clock, no ambient configuration.

use domain::{FeeBreakdown, FeeSettings, MarketerKind, Order, PaymentMethod};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderFees {
    pub total: f64,
    pub breakdown: FeeBreakdown,
}

/// Fees for one order. The reconciled delivery outcome is part of the call
/// contract; none of the current fee rules branch on it.
///
/// - Gateway fee: percent of order value, prepaid orders only, when enabled.
/// - COD remittance: flat amount on cash-on-delivery orders.
/// - Marketer commission: percent of profit (not revenue) or flat, when
///   enabled.
pub fn compute_order_fees(
    order: &Order,
    _is_delivered: bool,
    settings: &FeeSettings,
) -> OrderFees {
    let mut breakdown = FeeBreakdown::default();

    if settings.payment_gateway.enabled && order.payment_method == PaymentMethod::Prepaid {
        breakdown.payment_gateway = order.order_value * settings.payment_gateway.fee / 100.0;
    }

    if order.payment_method == PaymentMethod::Cod {
        breakdown.cod_remittance = settings.cod_remittance.fee;
    }

    if settings.marketer.enabled {
        breakdown.marketer = match settings.marketer.kind {
            MarketerKind::Percentage => order.profit() * settings.marketer.value / 100.0,
            MarketerKind::Fixed => settings.marketer.value,
        };
    }

    OrderFees {
        total: breakdown.total(),
        breakdown,
    }
}

/// Fold fees over a whole order list. The breakdown always carries all
/// three keys so downstream summation never branches on presence.
pub fn total_fees(
    orders: &[Order],
    settings: &FeeSettings,
    is_delivered: impl Fn(&Order) -> bool,
) -> OrderFees {
    let mut breakdown = FeeBreakdown::default();
    for order in orders {
        let fees = compute_order_fees(order, is_delivered(order), settings);
        breakdown.accumulate(&fees.breakdown);
    }
    OrderFees {
        total: breakdown.total(),
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CodRemittanceFee, MarketerFee, PaymentGatewayFee};

    fn order(value: f64, cost: Option<f64>, method: PaymentMethod) -> Order {
        Order {
            order_id: "1".into(),
            order_number: "#1001".into(),
            customer_id: None,
            customer_name: None,
            email: None,
            phone: None,
            order_value: value,
            cost_price: cost,
            payment_method: method,
            financial_status: "paid".into(),
            fulfillment_status: None,
            city: None,
            state: None,
            country: None,
            product: None,
            quantity: 1,
            vendor: None,
            line_items: vec![],
            created_at: None,
        }
    }

    fn settings(gateway_enabled: bool, marketer: Option<(MarketerKind, f64)>) -> FeeSettings {
        FeeSettings {
            payment_gateway: PaymentGatewayFee {
                enabled: gateway_enabled,
                fee: 2.0,
            },
            marketer: match marketer {
                Some((kind, value)) => MarketerFee {
                    enabled: true,
                    kind,
                    value,
                },
                None => MarketerFee {
                    enabled: false,
                    kind: MarketerKind::Percentage,
                    value: 0.0,
                },
            },
            cod_remittance: CodRemittanceFee { fee: 0.49 },
        }
    }

    #[test]
    fn prepaid_gateway_fee_scenario() {
        // 1000 order value, 400 cost, 2% gateway, no marketer, not COD.
        let order = order(1000.0, Some(400.0), PaymentMethod::Prepaid);
        let fees = compute_order_fees(&order, true, &settings(true, None));
        assert_eq!(fees.breakdown.payment_gateway, 20.0);
        assert_eq!(fees.breakdown.cod_remittance, 0.0);
        assert_eq!(fees.breakdown.marketer, 0.0);
        assert_eq!(fees.total, 20.0);
        assert_eq!(order.profit(), 600.0);
        assert_eq!(order.profit() - fees.total, 580.0);
    }

    #[test]
    fn identical_inputs_identical_output() {
        let order = order(730.0, Some(200.0), PaymentMethod::Cod);
        let settings = settings(true, Some((MarketerKind::Percentage, 10.0)));
        let first = compute_order_fees(&order, false, &settings);
        let second = compute_order_fees(&order, false, &settings);
        assert_eq!(first, second);
    }

    #[test]
    fn disabling_gateway_leaves_other_fees_alone() {
        let order = order(1000.0, Some(500.0), PaymentMethod::Prepaid);
        let marketer = Some((MarketerKind::Percentage, 10.0));
        let enabled = compute_order_fees(&order, true, &settings(true, marketer));
        let disabled = compute_order_fees(&order, true, &settings(false, marketer));
        assert_eq!(enabled.breakdown.payment_gateway, 20.0);
        assert_eq!(disabled.breakdown.payment_gateway, 0.0);
        assert_eq!(enabled.breakdown.marketer, disabled.breakdown.marketer);
        assert_eq!(enabled.breakdown.cod_remittance, disabled.breakdown.cod_remittance);
    }

    #[test]
    fn cod_orders_pay_flat_remittance_not_gateway() {
        let order = order(500.0, None, PaymentMethod::Cod);
        let fees = compute_order_fees(&order, true, &settings(true, None));
        assert_eq!(fees.breakdown.payment_gateway, 0.0);
        assert_eq!(fees.breakdown.cod_remittance, 0.49);
        assert_eq!(fees.total, 0.49);
    }

    #[test]
    fn marketer_commission_follows_profit_not_revenue() {
        let order = order(1000.0, Some(800.0), PaymentMethod::Other);
        let percentage =
            compute_order_fees(&order, true, &settings(false, Some((MarketerKind::Percentage, 10.0))));
        // 10% of 200 profit, not of 1000 revenue.
        assert_eq!(percentage.breakdown.marketer, 20.0);

        let fixed =
            compute_order_fees(&order, true, &settings(false, Some((MarketerKind::Fixed, 35.0))));
        assert_eq!(fixed.breakdown.marketer, 35.0);
    }

    #[test]
    fn folding_reports_every_key_even_when_zero() {
        let orders = vec![
            order(100.0, None, PaymentMethod::Prepaid),
            order(200.0, None, PaymentMethod::Cod),
        ];
        let fees = total_fees(&orders, &settings(true, None), |_| false);
        assert_eq!(fees.breakdown.payment_gateway, 2.0);
        assert_eq!(fees.breakdown.cod_remittance, 0.49);
        assert_eq!(fees.breakdown.marketer, 0.0);
        assert!((fees.total - 2.49).abs() < 1e-9);
    }
}
