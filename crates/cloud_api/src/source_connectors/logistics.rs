//! Logistics shipments connector: credential login for a bearer token,
//! page-number pagination, and a secondary orders sweep that supplies the
//! channel order number used for cross-source joins plus reliable dates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Identity, Shipment, SourceKind};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{lenient_f64, lenient_string, parse_source_datetime, FetchWindow, SourceConnector, SourceError};

const DEFAULT_BASE_URL: &str = "https://apiv2.shiprocket.in";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct LogisticsCredentials {
    pub email: String,
    pub password: String,
}

pub struct HttpLogisticsConnector {
    http: reqwest::Client,
    base_url: String,
}

impl HttpLogisticsConnector {
    /// Set LOGISTICS_API_BASE_URL to point at a staging host or a local
    /// stub; the production API is the default.
    pub fn new(http: reqwest::Client) -> Self {
        let base_url = match std::env::var("LOGISTICS_API_BASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => DEFAULT_BASE_URL.to_string(),
        };
        Self { http, base_url }
    }

    async fn login(&self, credentials: &LogisticsCredentials) -> Result<String, SourceError> {
        let source = SourceKind::Shipments;
        let response = self
            .http
            .post(format!("{}/v1/external/auth/login", self.base_url))
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| SourceError::Http {
                kind: source,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth {
                kind: source,
                reason: format!("login failed with HTTP {status}: {body}"),
            });
        }

        let auth: RawAuthResponse = response.json().await.map_err(|e| SourceError::Decode {
            kind: source,
            reason: e.to_string(),
        })?;
        auth.token.ok_or_else(|| SourceError::Auth {
            kind: source,
            reason: "login succeeded but no token was returned".to_string(),
        })
    }

    /// Full paginated sweep of one list endpoint; a page shorter than the
    /// requested size signals exhaustion.
    async fn fetch_pages(&self, token: &str, path: &str) -> Result<Vec<Value>, SourceError> {
        let source = SourceKind::Shipments;
        let mut records = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .http
                .get(format!(
                    "{}{}?per_page={}&page={}",
                    self.base_url, path, PAGE_SIZE, page
                ))
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| SourceError::Http {
                    kind: source,
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::Http {
                    kind: source,
                    reason: format!("{path} page {page} returned HTTP {status}: {body}"),
                });
            }

            let body: RawListPage = response.json().await.map_err(|e| SourceError::Decode {
                kind: source,
                reason: e.to_string(),
            })?;
            let count = body.data.len();
            records.extend(body.data);
            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(records)
    }
}

#[async_trait]
impl SourceConnector for HttpLogisticsConnector {
    type Credentials = LogisticsCredentials;
    type Record = Shipment;

    fn source(&self) -> SourceKind {
        SourceKind::Shipments
    }

    async fn fetch(
        &self,
        _identity: &Identity,
        credentials: &LogisticsCredentials,
        window: &FetchWindow,
    ) -> Result<Vec<Shipment>, SourceError> {
        let token = self.login(credentials).await?;

        let raw_shipments = self.fetch_pages(&token, "/v1/external/shipments").await?;

        // The orders sweep only enriches shipments (join key + dates), so a
        // failure here degrades the enrichment rather than the whole source.
        let raw_orders = match self.fetch_pages(&token, "/v1/external/orders").await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!("logistics orders sweep failed, joining without it: {e}");
                Vec::new()
            }
        };
        let orders_by_id: HashMap<String, &Value> = raw_orders
            .iter()
            .filter_map(|order| lenient_string(order.get("id")).map(|id| (id, order)))
            .collect();

        let shipments = raw_shipments
            .iter()
            .map(|raw| normalize_shipment(raw, &orders_by_id))
            .filter(|shipment| window.includes(shipment.created_at))
            .collect();
        Ok(shipments)
    }
}

#[derive(Debug, Deserialize)]
struct RawAuthResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListPage {
    #[serde(default)]
    data: Vec<Value>,
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    lenient_string(value.get(key))
}

/// Map one raw shipment into the canonical record, preferring the matched
/// channel order for the join key, customer fields, and the record date
/// (shipment-side dates are often zeroed out upstream).
fn normalize_shipment(raw: &Value, orders_by_id: &HashMap<String, &Value>) -> Shipment {
    let order_id = lenient_string(raw.get("order_id"));
    let matching_order = order_id
        .as_deref()
        .and_then(|id| orders_by_id.get(id).copied());

    let order_number = matching_order
        .and_then(|order| string_field(order, "channel_order_id"))
        .or_else(|| string_field(raw, "channel_order_id"))
        .or_else(|| order_id.clone());

    let charges = raw.get("charges");
    let freight_charges = charges
        .and_then(|c| lenient_f64(c.get("freight_charges")))
        .or_else(|| charges.and_then(|c| lenient_f64(c.get("applied_weight_amount"))))
        .unwrap_or(0.0);
    let cod_charges = charges
        .and_then(|c| lenient_f64(c.get("cod_charges")))
        .unwrap_or(0.0);

    let status = string_field(raw, "status")
        .or_else(|| string_field(raw, "shipment_status"))
        .unwrap_or_else(|| "pending".to_string());

    let created_at: Option<DateTime<Utc>> = [
        matching_order.and_then(|order| string_field(order, "created_at")),
        string_field(raw, "created_at"),
        string_field(raw, "pickup_scheduled_date"),
        string_field(raw, "awb_assign_date"),
    ]
    .into_iter()
    .flatten()
    .find_map(|s| parse_source_datetime(&s));

    Shipment {
        shipment_id: lenient_string(raw.get("id")).unwrap_or_else(|| "unknown".to_string()),
        order_id,
        order_number,
        awb: string_field(raw, "awb_code").or_else(|| string_field(raw, "awb")),
        courier: string_field(raw, "courier_name")
            .or_else(|| string_field(raw, "courier_company_id")),
        status,
        rto_status: string_field(raw, "rto_status"),
        shipping_charge: freight_charges + cod_charges,
        freight_charges,
        cod_charges,
        customer_name: string_field(raw, "customer_name")
            .or_else(|| matching_order.and_then(|o| string_field(o, "customer_name"))),
        customer_phone: string_field(raw, "customer_phone")
            .or_else(|| matching_order.and_then(|o| string_field(o, "customer_phone")))
            .or_else(|| matching_order.and_then(|o| string_field(o, "customer_mobile"))),
        customer_state: string_field(raw, "customer_state")
            .or_else(|| matching_order.and_then(|o| string_field(o, "customer_state"))),
        etd: string_field(raw, "etd").or_else(|| string_field(raw, "expected_delivery_date")),
        rto_reason: string_field(raw, "rto_reason"),
        delivered_date: string_field(raw, "delivered_date")
            .or_else(|| string_field(raw, "delivery_date")),
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_key_prefers_the_matched_channel_order() {
        let order = json!({"id": 9001, "channel_order_id": "#1042", "created_at": "2026-02-01 09:00:00"});
        let mut orders_by_id = HashMap::new();
        orders_by_id.insert("9001".to_string(), &order);

        let shipment = normalize_shipment(
            &json!({
                "id": 77,
                "order_id": 9001,
                "status": "Delivered",
                "charges": {"freight_charges": "80.5", "cod_charges": "25"}
            }),
            &orders_by_id,
        );
        assert_eq!(shipment.order_number.as_deref(), Some("#1042"));
        assert_eq!(shipment.order_id.as_deref(), Some("9001"));
        assert_eq!(shipment.shipping_charge, 105.5);
        assert_eq!(shipment.freight_charges, 80.5);
        assert_eq!(shipment.cod_charges, 25.0);
        assert!(shipment.is_delivered());
        // Date comes from the matched order, the more reliable side.
        assert!(shipment.created_at.is_some());
    }

    #[test]
    fn unmatched_shipment_falls_back_to_its_own_fields() {
        let orders_by_id = HashMap::new();
        let shipment = normalize_shipment(
            &json!({
                "id": 78,
                "order_id": 5555,
                "shipment_status": "RTO Initiated",
                "created_at": "0000-00-00 00:00:00",
                "charges": {"applied_weight_amount": 60}
            }),
            &orders_by_id,
        );
        // No channel order: the numeric order id doubles as the number.
        assert_eq!(shipment.order_number.as_deref(), Some("5555"));
        assert_eq!(shipment.freight_charges, 60.0);
        assert!(shipment.is_rto());
        // The zero sentinel date parses to nothing, so the record is kept
        // by any window.
        assert!(shipment.created_at.is_none());
    }
}
