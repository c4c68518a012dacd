//! Canonical per-source records, normalized from the upstream wire shapes.
//!
//! Records are created once per fetch cycle and never mutated afterwards;
//! a later fetch supersedes the whole list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment route for an order, parsed from the storefront gateway string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Prepaid,
    Cod,
    Other,
}

impl PaymentMethod {
    /// Exact case-insensitive match on the gateway string; anything the
    /// fee rules don't recognize is `Other`.
    pub fn from_gateway(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("prepaid") => PaymentMethod::Prepaid,
            Some("cod") => PaymentMethod::Cod,
            _ => PaymentMethod::Other,
        }
    }
}

/// One purchased item within an order. `cost` comes from a free-form note
/// property the upstream store may or may not carry; absent means unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub cost: Option<f64>,
    pub vendor: Option<String>,
    pub sku: Option<String>,
}

/// One purchase transaction from the storefront source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    /// Human-readable order number; the preferred cross-source join key.
    pub order_number: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub order_value: f64,
    /// Total known cost across line items. `None` when the store supplied
    /// no cost data; formulas treat that as zero, which understates cost.
    pub cost_price: Option<f64>,
    pub payment_method: PaymentMethod,
    pub financial_status: String,
    pub fulfillment_status: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// First line item's product name; used by product-level grouping.
    pub product: Option<String>,
    /// Total units across all line items.
    pub quantity: i64,
    /// First line item's vendor; vendor payables group on this.
    pub vendor: Option<String>,
    pub line_items: Vec<LineItem>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Margin before fees. Unknown cost counts as zero.
    pub fn profit(&self) -> f64 {
        self.order_value - self.cost_price.unwrap_or(0.0)
    }

    /// Identity used to group orders into one logical customer:
    /// id, then email, then phone, then display name — first present wins.
    pub fn customer_key(&self) -> Option<&str> {
        self.customer_id
            .as_deref()
            .or(self.email.as_deref())
            .or(self.phone.as_deref())
            .or(self.customer_name.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// One logistics record from the shipments source. Soft-linked to an order
/// via `order_number` (preferred) or `order_id`; neither is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: String,
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub awb: Option<String>,
    pub courier: Option<String>,
    /// Free text from the carrier; compared lowercase.
    pub status: String,
    pub rto_status: Option<String>,
    /// Freight plus COD handling.
    pub shipping_charge: f64,
    pub freight_charges: f64,
    pub cod_charges: f64,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_state: Option<String>,
    pub etd: Option<String>,
    pub rto_reason: Option<String>,
    pub delivered_date: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Shipment {
    fn status_lc(&self) -> String {
        self.status.to_lowercase()
    }

    /// Returned to origin. NDR wins over RTO: a shipment under non-delivery
    /// investigation is never counted as returned, even if some field
    /// carries an "rto" substring.
    pub fn is_rto(&self) -> bool {
        let status = self.status_lc();
        let rto_status = self
            .rto_status
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default();
        (status.contains("rto") || rto_status.contains("rto")) && !status.contains("ndr")
    }

    pub fn is_delivered(&self) -> bool {
        self.status_lc() == "delivered"
    }

    /// Non-delivery report: an in-progress exception requiring action.
    pub fn is_ndr(&self) -> bool {
        let status = self.status_lc();
        status.contains("ndr") || status.contains("action")
    }

    pub fn is_out_for_delivery(&self) -> bool {
        let status = self.status_lc();
        status.contains("out for delivery") || status.contains("out_for_delivery")
    }

    pub fn is_pickup_stage(&self) -> bool {
        let status = self.status_lc();
        status.contains("pickup") || status.contains("ready to ship")
    }

    pub fn is_cancelled(&self) -> bool {
        self.status_lc().contains("cancelled")
    }

    /// Still moving: neither delivered, returned, nor cancelled.
    pub fn is_in_flight(&self) -> bool {
        let status = self.status_lc();
        !status.contains("delivered") && !status.contains("rto") && !status.contains("cancelled")
    }
}

/// One advertising campaign's spend for the period. Carries no join key to
/// orders or shipments; it contributes only to aggregate spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_name: String,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub cpc: f64,
    pub purchases: i64,
    /// Purchase value divided by spend; zero when spend is zero.
    pub roas: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment(status: &str, rto_status: Option<&str>) -> Shipment {
        Shipment {
            shipment_id: "1".into(),
            order_id: None,
            order_number: None,
            awb: None,
            courier: None,
            status: status.into(),
            rto_status: rto_status.map(Into::into),
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
    fn ndr_is_never_rto() {
        assert!(shipment("RTO Initiated", None).is_rto());
        assert!(shipment("In Transit", Some("RTO")).is_rto());
        // "ndr" in the primary status vetoes RTO classification outright.
        assert!(!shipment("NDR raised", Some("rto")).is_rto());
        assert!(shipment("NDR raised", Some("rto")).is_ndr());
    }

    #[test]
    fn delivered_is_exact_match() {
        assert!(shipment("Delivered", None).is_delivered());
        assert!(!shipment("Out For Delivery", None).is_delivered());
    }

    #[test]
    fn customer_key_falls_back_in_priority_order() {
        let mut order = Order {
            order_id: "1".into(),
            order_number: "#1001".into(),
            customer_id: Some("c9".into()),
            customer_name: Some("A Customer".into()),
            email: Some("a@example.com".into()),
            phone: Some("999".into()),
            order_value: 100.0,
            cost_price: None,
            payment_method: PaymentMethod::Prepaid,
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
        };
        assert_eq!(order.customer_key(), Some("c9"));
        order.customer_id = None;
        assert_eq!(order.customer_key(), Some("a@example.com"));
        order.email = None;
        assert_eq!(order.customer_key(), Some("999"));
        order.phone = None;
        assert_eq!(order.customer_key(), Some("A Customer"));
        order.customer_name = None;
        assert_eq!(order.customer_key(), None);
    }

    #[test]
    fn gateway_parsing_is_exact() {
        assert_eq!(
            PaymentMethod::from_gateway(Some("Prepaid")),
            PaymentMethod::Prepaid
        );
        assert_eq!(PaymentMethod::from_gateway(Some("COD")), PaymentMethod::Cod);
        assert_eq!(
            PaymentMethod::from_gateway(Some("razorpay")),
            PaymentMethod::Other
        );
        assert_eq!(PaymentMethod::from_gateway(None), PaymentMethod::Other);
    }
}
