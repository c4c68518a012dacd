//! Derived-metric payloads. Computed from a snapshot on every read, never
//! persisted as a source of truth.

use serde::{Deserialize, Serialize};

/// Per-type fee totals. All three keys are always present (zero-filled)
/// so downstream summation never has to handle a missing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub payment_gateway: f64,
    pub cod_remittance: f64,
    pub marketer: f64,
}

impl FeeBreakdown {
    pub fn total(&self) -> f64 {
        self.payment_gateway + self.cod_remittance + self.marketer
    }

    pub fn accumulate(&mut self, other: &FeeBreakdown) {
        self.payment_gateway += other.payment_gateway;
        self.cod_remittance += other.cod_remittance;
        self.marketer += other.marketer;
    }
}

/// Operational shipment counters for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentMetrics {
    pub total_shipments: usize,
    pub rto_count: usize,
    /// Returned volume relative to *delivered* volume, not total.
    pub rto_percentage: f64,
    pub delivered_count: usize,
    pub delivered_percentage: f64,
    pub ndr_count: usize,
    pub out_for_delivery_count: usize,
    pub out_for_pickup_count: usize,
    pub remaining_count: usize,
    pub total_shipping_cost: f64,
}

/// The headline numbers for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_orders: usize,
    pub total_ad_spend: f64,
    pub total_shipping_cost: f64,
    pub rto_count: usize,
    pub rto_percentage: f64,
    pub delivered_count: usize,
    pub delivered_percentage: f64,
    pub out_for_delivery_count: usize,
    pub out_for_pickup_count: usize,
    pub ndr_count: usize,
    pub remaining_count: usize,
    pub total_fees: f64,
    pub fee_breakdown: FeeBreakdown,
    /// Order value lost to returned shipments that matched an order.
    pub rto_revenue_loss: f64,
    pub total_profit: f64,
    pub roi: f64,
    pub aov: f64,
}

/// What is owed to one vendor for delivered orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorPayable {
    pub vendor: String,
    pub delivered_orders: usize,
    pub total_cost: f64,
    pub revenue: f64,
    pub margin: f64,
}

/// Sales totals for one product, for best-seller ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSales {
    pub product: String,
    pub quantity: i64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub orders: usize,
}

/// Totals for one logical customer (grouped by the identity fallback key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub orders: usize,
    pub quantity: i64,
    pub total_spent: f64,
}

/// One day's revenue/cost bucket for the profit trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProfit {
    pub date: String,
    pub revenue: f64,
    pub cost: f64,
    pub orders: usize,
    pub profit: f64,
}

/// Full derived output for one snapshot: headline metrics plus rankings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metrics: DashboardMetrics,
    pub vendor_payables: Vec<VendorPayable>,
    pub best_sellers: Vec<ProductSales>,
    pub top_customers: Vec<CustomerSummary>,
    pub daily_profit: Vec<DailyProfit>,
}
