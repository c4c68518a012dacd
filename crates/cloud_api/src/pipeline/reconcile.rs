//! Reconciliation engine: best-effort joins between orders, shipments, and
//! campaigns (no shared primary key upstream), and every derived metric
//! computed from a snapshot.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use domain::{
    CustomerSummary, DailyProfit, DashboardMetrics, DashboardReport, FeeSettings, Order,
    ProductSales, Shipment, ShipmentMetrics, Snapshot, VendorPayable,
};

use super::fees;

/// Multi-key lookup from shipment join keys to orders, built once per
/// reconciliation pass. Order number is the preferred key, order id the
/// fallback; when duplicate keys occur upstream the first-encountered
/// order wins.
pub struct OrderIndex<'a> {
    orders: &'a [Order],
    by_number: HashMap<&'a str, usize>,
    by_id: HashMap<&'a str, usize>,
}

impl<'a> OrderIndex<'a> {
    pub fn build(orders: &'a [Order]) -> Self {
        let mut by_number = HashMap::new();
        let mut by_id = HashMap::new();
        for (i, order) in orders.iter().enumerate() {
            by_number.entry(order.order_number.as_str()).or_insert(i);
            by_id.entry(order.order_id.as_str()).or_insert(i);
        }
        Self {
            orders,
            by_number,
            by_id,
        }
    }

    /// Priority-ordered lookup: number first, id second, first match wins.
    pub fn lookup(&self, order_number: Option<&str>, order_id: Option<&str>) -> Option<&'a Order> {
        if let Some(number) = order_number {
            if let Some(&i) = self.by_number.get(number) {
                return Some(&self.orders[i]);
            }
        }
        if let Some(id) = order_id {
            if let Some(&i) = self.by_id.get(id) {
                return Some(&self.orders[i]);
            }
        }
        None
    }

    pub fn match_shipment(&self, shipment: &Shipment) -> Option<&'a Order> {
        self.lookup(
            shipment.order_number.as_deref(),
            shipment.order_id.as_deref(),
        )
    }
}

/// Join keys (both number and id) of every delivered shipment. An order
/// counts as delivered when either of its keys appears here.
pub struct DeliveredKeys(HashSet<String>);

impl DeliveredKeys {
    pub fn from_shipments(shipments: &[Shipment]) -> Self {
        let mut keys = HashSet::new();
        for shipment in shipments.iter().filter(|s| s.is_delivered()) {
            if let Some(number) = &shipment.order_number {
                keys.insert(number.clone());
            }
            if let Some(id) = &shipment.order_id {
                keys.insert(id.clone());
            }
        }
        Self(keys)
    }

    pub fn contains_order(&self, order: &Order) -> bool {
        self.0.contains(&order.order_id) || self.0.contains(&order.order_number)
    }
}

/// Operational shipment counters for the period.
pub fn shipment_metrics(shipments: &[Shipment]) -> ShipmentMetrics {
    let total_shipments = shipments.len();
    let rto_count = shipments.iter().filter(|s| s.is_rto()).count();
    let delivered_count = shipments.iter().filter(|s| s.is_delivered()).count();
    let ndr_count = shipments.iter().filter(|s| s.is_ndr()).count();

    // Returned volume is reported against what actually got delivered,
    // not against everything shipped.
    let rto_percentage = if delivered_count > 0 {
        rto_count as f64 / delivered_count as f64 * 100.0
    } else {
        0.0
    };
    let delivered_percentage = if total_shipments > 0 {
        delivered_count as f64 / total_shipments as f64 * 100.0
    } else {
        0.0
    };

    ShipmentMetrics {
        total_shipments,
        rto_count,
        rto_percentage,
        delivered_count,
        delivered_percentage,
        ndr_count,
        out_for_delivery_count: shipments.iter().filter(|s| s.is_out_for_delivery()).count(),
        out_for_pickup_count: shipments.iter().filter(|s| s.is_pickup_stage()).count(),
        remaining_count: shipments.iter().filter(|s| s.is_in_flight()).count(),
        total_shipping_cost: shipments.iter().map(|s| s.shipping_charge).sum(),
    }
}

/// Order value lost to returns. Only RTO shipments that match an order can
/// be attributed; unmatched ones contribute nothing.
pub fn rto_revenue_loss(index: &OrderIndex<'_>, shipments: &[Shipment]) -> f64 {
    shipments
        .iter()
        .filter(|s| s.is_rto())
        .filter_map(|s| index.match_shipment(s))
        .map(|order| order.order_value)
        .sum()
}

/// What is owed per vendor. Payment only follows confirmed delivery:
/// orders without a delivered shipment (RTO included) are excluded even
/// when their cost is known.
pub fn vendor_payables(orders: &[Order], delivered: &DeliveredKeys) -> Vec<VendorPayable> {
    let mut rows: Vec<VendorPayable> = Vec::new();
    let mut by_vendor: HashMap<String, usize> = HashMap::new();

    for order in orders.iter().filter(|o| delivered.contains_order(o)) {
        let vendor = order
            .vendor
            .clone()
            .unwrap_or_else(|| "Unknown Vendor".to_string());
        let i = *by_vendor.entry(vendor.clone()).or_insert_with(|| {
            rows.push(VendorPayable {
                vendor,
                delivered_orders: 0,
                total_cost: 0.0,
                revenue: 0.0,
                margin: 0.0,
            });
            rows.len() - 1
        });
        rows[i].delivered_orders += 1;
        rows[i].total_cost += order.cost_price.unwrap_or(0.0);
        rows[i].revenue += order.order_value;
    }

    for row in &mut rows {
        row.margin = row.revenue - row.total_cost;
    }
    rows.sort_by(|a, b| {
        b.total_cost
            .partial_cmp(&a.total_cost)
            .unwrap_or(Ordering::Equal)
    });
    rows
}

/// Top products by revenue. Grouping key is the literal product name;
/// ties keep input order (stable sort, no secondary key).
pub fn best_sellers(orders: &[Order]) -> Vec<ProductSales> {
    let mut rows: Vec<ProductSales> = Vec::new();
    let mut by_product: HashMap<String, usize> = HashMap::new();

    for order in orders {
        let Some(product) = order.product.clone() else {
            continue;
        };
        let i = *by_product.entry(product.clone()).or_insert_with(|| {
            rows.push(ProductSales {
                product,
                quantity: 0,
                revenue: 0.0,
                cost: 0.0,
                profit: 0.0,
                orders: 0,
            });
            rows.len() - 1
        });
        rows[i].quantity += order.quantity;
        rows[i].revenue += order.order_value;
        rows[i].cost += order.cost_price.unwrap_or(0.0);
        rows[i].orders += 1;
    }

    for row in &mut rows {
        row.profit = row.revenue - row.cost;
    }
    rows.sort_by(|a, b| b.revenue.partial_cmp(&a.revenue).unwrap_or(Ordering::Equal));
    rows.truncate(10);
    rows
}

/// Top customers by spend, grouped by the identity fallback key
/// (id → email → phone → name).
pub fn top_customers(orders: &[Order]) -> Vec<CustomerSummary> {
    let mut rows: Vec<CustomerSummary> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for order in orders {
        let Some(key) = order.customer_key().map(str::to_string) else {
            continue;
        };
        let i = *by_key.entry(key).or_insert_with(|| {
            rows.push(CustomerSummary {
                customer_id: order.customer_id.clone(),
                customer_name: order.customer_name.clone(),
                email: order.email.clone(),
                phone: order.phone.clone(),
                orders: 0,
                quantity: 0,
                total_spent: 0.0,
            });
            rows.len() - 1
        });
        rows[i].orders += 1;
        rows[i].quantity += order.quantity;
        rows[i].total_spent += order.order_value;
    }

    rows.sort_by(|a, b| {
        b.total_spent
            .partial_cmp(&a.total_spent)
            .unwrap_or(Ordering::Equal)
    });
    rows.truncate(10);
    rows
}

/// Revenue/cost per calendar day, oldest first, capped to the most recent
/// 30 buckets. Orders without a parseable date are left out of the trend.
pub fn daily_profit(orders: &[Order]) -> Vec<DailyProfit> {
    let mut buckets: BTreeMap<String, DailyProfit> = BTreeMap::new();
    for order in orders {
        let Some(created_at) = order.created_at else {
            continue;
        };
        let date = created_at.format("%Y-%m-%d").to_string();
        let bucket = buckets.entry(date.clone()).or_insert(DailyProfit {
            date,
            revenue: 0.0,
            cost: 0.0,
            orders: 0,
            profit: 0.0,
        });
        bucket.revenue += order.order_value;
        bucket.cost += order.cost_price.unwrap_or(0.0);
        bucket.orders += 1;
    }

    let mut rows: Vec<DailyProfit> = buckets.into_values().collect();
    for row in &mut rows {
        row.profit = row.revenue - row.cost;
    }
    if rows.len() > 30 {
        rows.drain(..rows.len() - 30);
    }
    rows
}

/// Everything derived from one snapshot. Runs over whatever data the
/// snapshot holds — a degraded source just means an empty slice here.
pub fn compute_report(snapshot: &Snapshot, settings: &FeeSettings) -> DashboardReport {
    let orders = &snapshot.orders;
    let shipments = &snapshot.shipments;

    let total_revenue: f64 = orders.iter().map(|o| o.order_value).sum();
    let total_cost: f64 = orders.iter().map(|o| o.cost_price.unwrap_or(0.0)).sum();
    let total_orders = orders.len();
    let total_ad_spend: f64 = snapshot.campaigns.iter().map(|c| c.spend).sum();

    let shipping = shipment_metrics(shipments);
    let index = OrderIndex::build(orders);
    let delivered = DeliveredKeys::from_shipments(shipments);

    let fee_totals = fees::total_fees(orders, settings, |order| delivered.contains_order(order));
    let rto_revenue_loss = rto_revenue_loss(&index, shipments);

    let total_profit = total_revenue
        - (total_cost
            + total_ad_spend
            + shipping.total_shipping_cost
            + fee_totals.total
            + rto_revenue_loss);
    let roi = if total_ad_spend > 0.0 {
        total_revenue / total_ad_spend * 100.0
    } else {
        0.0
    };
    let aov = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };

    DashboardReport {
        metrics: DashboardMetrics {
            total_revenue,
            total_cost,
            total_orders,
            total_ad_spend,
            total_shipping_cost: shipping.total_shipping_cost,
            rto_count: shipping.rto_count,
            rto_percentage: shipping.rto_percentage,
            delivered_count: shipping.delivered_count,
            delivered_percentage: shipping.delivered_percentage,
            out_for_delivery_count: shipping.out_for_delivery_count,
            out_for_pickup_count: shipping.out_for_pickup_count,
            ndr_count: shipping.ndr_count,
            remaining_count: shipping.remaining_count,
            total_fees: fee_totals.total,
            fee_breakdown: fee_totals.breakdown,
            rto_revenue_loss,
            total_profit,
            roi,
            aov,
        },
        vendor_payables: vendor_payables(orders, &delivered),
        best_sellers: best_sellers(orders),
        top_customers: top_customers(orders),
        daily_profit: daily_profit(orders),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domain::{DateRange, PaymentMethod, SourceErrors};

    fn order(id: &str, number: &str, value: f64, cost: Option<f64>, vendor: Option<&str>) -> Order {
        Order {
            order_id: id.into(),
            order_number: number.into(),
            customer_id: None,
            customer_name: None,
            email: None,
            phone: None,
            order_value: value,
            cost_price: cost,
            payment_method: PaymentMethod::Other,
            financial_status: "paid".into(),
            fulfillment_status: None,
            city: None,
            state: None,
            country: None,
            product: None,
            quantity: 1,
            vendor: vendor.map(Into::into),
            line_items: vec![],
            created_at: None,
        }
    }

    fn shipment(
        id: &str,
        number: Option<&str>,
        order_id: Option<&str>,
        status: &str,
    ) -> Shipment {
        Shipment {
            shipment_id: id.into(),
            order_id: order_id.map(Into::into),
            order_number: number.map(Into::into),
            awb: None,
            courier: None,
            status: status.into(),
            rto_status: None,
            shipping_charge: 0.0,
            freight_charges: 0.0,
            cod_charges: 0.0,
            customer_name: None,
            customer_phone: None,
            customer_state: None,
            etd: None,
            rto_reason: None,
            delivered_date: None,
            created_at: None,
        }
    }

    #[test]
    fn shipment_matching_falls_back_to_order_id() {
        let orders = vec![order("555", "#1001", 100.0, None, None)];
        let index = OrderIndex::build(&orders);

        // Number missing, id present: the fallback path must land.
        let by_id = shipment("s1", None, Some("555"), "delivered");
        assert!(index.match_shipment(&by_id).is_some());

        // Number takes priority when both could match.
        let by_number = shipment("s2", Some("#1001"), Some("999"), "delivered");
        assert_eq!(
            index.match_shipment(&by_number).unwrap().order_id,
            "555"
        );

        let neither = shipment("s3", Some("#9999"), Some("999"), "delivered");
        assert!(index.match_shipment(&neither).is_none());
    }

    #[test]
    fn duplicate_join_keys_keep_first_order() {
        let orders = vec![
            order("1", "#dup", 10.0, None, None),
            order("2", "#dup", 20.0, None, None),
        ];
        let index = OrderIndex::build(&orders);
        let matched = index.lookup(Some("#dup"), None).unwrap();
        assert_eq!(matched.order_id, "1");
    }

    #[test]
    fn ndr_shipments_never_count_as_rto() {
        let mut flagged = shipment("s1", None, None, "NDR pending");
        flagged.rto_status = Some("rto requested".into());
        let shipments = vec![
            flagged,
            shipment("s2", None, None, "rto initiated"),
            shipment("s3", None, None, "delivered"),
        ];
        let metrics = shipment_metrics(&shipments);
        assert_eq!(metrics.rto_count, 1);
        assert_eq!(metrics.ndr_count, 1);
        assert_eq!(metrics.delivered_count, 1);
    }

    #[test]
    fn rto_percentage_divides_by_delivered_count() {
        let mut shipments = Vec::new();
        for i in 0..80 {
            shipments.push(shipment(&format!("d{i}"), None, None, "delivered"));
        }
        for i in 0..20 {
            shipments.push(shipment(&format!("r{i}"), None, None, "rto delivered"));
        }
        let metrics = shipment_metrics(&shipments);
        assert_eq!(metrics.rto_count, 20);
        assert_eq!(metrics.delivered_count, 80);
        // 20 / 80, not 20 / 100.
        assert_eq!(metrics.rto_percentage, 25.0);
        assert_eq!(metrics.delivered_percentage, 80.0);
    }

    #[test]
    fn rto_loss_skips_unmatched_shipments() {
        let orders = vec![
            order("1", "#1001", 300.0, None, None),
            order("2", "#1002", 500.0, None, None),
        ];
        let index = OrderIndex::build(&orders);
        let shipments = vec![
            shipment("s1", Some("#1001"), None, "rto initiated"),
            shipment("s2", Some("#nope"), None, "rto initiated"),
        ];
        assert_eq!(rto_revenue_loss(&index, &shipments), 300.0);
    }

    #[test]
    fn vendor_payables_require_delivery() {
        let orders = vec![
            order("1", "#1001", 400.0, Some(150.0), Some("Acme")),
            // RTO'd: cost known but never payable.
            order("2", "#1002", 900.0, Some(600.0), Some("Acme")),
            // No shipment at all: also excluded.
            order("3", "#1003", 100.0, Some(40.0), Some("Bolt")),
        ];
        let shipments = vec![
            shipment("s1", Some("#1001"), None, "delivered"),
            shipment("s2", Some("#1002"), None, "rto initiated"),
        ];
        let delivered = DeliveredKeys::from_shipments(&shipments);
        let payables = vendor_payables(&orders, &delivered);
        assert_eq!(payables.len(), 1);
        assert_eq!(payables[0].vendor, "Acme");
        assert_eq!(payables[0].delivered_orders, 1);
        assert_eq!(payables[0].total_cost, 150.0);
        assert_eq!(payables[0].margin, 250.0);
    }

    #[test]
    fn best_sellers_rank_by_revenue_with_stable_ties() {
        let mut a = order("1", "#1", 100.0, Some(40.0), None);
        a.product = Some("Alpha".into());
        let mut b = order("2", "#2", 100.0, None, None);
        b.product = Some("Beta".into());
        let mut a2 = order("3", "#3", 50.0, None, None);
        a2.product = Some("Alpha".into());

        let ranked = best_sellers(&[a, b, a2]);
        assert_eq!(ranked[0].product, "Alpha");
        assert_eq!(ranked[0].revenue, 150.0);
        assert_eq!(ranked[0].orders, 2);
        assert_eq!(ranked[1].product, "Beta");
    }

    #[test]
    fn full_report_profit_equation() {
        let created = Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap();
        let mut paid = order("1", "#1001", 1000.0, Some(400.0), Some("Acme"));
        paid.payment_method = PaymentMethod::Prepaid;
        paid.created_at = Some(created);

        let mut delivered_shipment = shipment("s1", Some("#1001"), None, "delivered");
        delivered_shipment.shipping_charge = 80.0;

        let snapshot = Snapshot {
            orders: vec![paid],
            shipments: vec![delivered_shipment],
            campaigns: vec![domain::Campaign {
                campaign_name: "c".into(),
                spend: 100.0,
                impressions: 0,
                clicks: 0,
                ctr: 0.0,
                cpc: 0.0,
                purchases: 0,
                roas: 0.0,
            }],
            source_errors: SourceErrors::default(),
            fetched_at: created,
            date_range: DateRange::Days(30),
        };

        let report = compute_report(&snapshot, &FeeSettings::default());
        let m = &report.metrics;
        assert_eq!(m.total_revenue, 1000.0);
        assert_eq!(m.total_cost, 400.0);
        assert_eq!(m.total_ad_spend, 100.0);
        assert_eq!(m.total_shipping_cost, 80.0);
        // Default settings: gateway 2% on the prepaid order.
        assert_eq!(m.total_fees, 20.0);
        assert_eq!(m.rto_revenue_loss, 0.0);
        // 1000 - (400 + 100 + 80 + 20 + 0)
        assert_eq!(m.total_profit, 400.0);
        assert_eq!(m.roi, 1000.0);
        assert_eq!(m.aov, 1000.0);
        assert_eq!(report.vendor_payables.len(), 1);
        assert_eq!(report.daily_profit.len(), 1);
        assert_eq!(report.daily_profit[0].profit, 600.0);
    }
}
