//! Storefront orders connector: header-token auth, cursor pagination via
//! the `Link` response header, cost extraction from line-item note
//! properties.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Identity, LineItem, Order, PaymentMethod, SourceKind};
use serde::Deserialize;

use super::{parse_source_datetime, FetchWindow, SourceConnector, SourceError};

const API_VERSION: &str = "2025-01";
const PAGE_SIZE: usize = 250;
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Debug, Clone)]
pub struct StorefrontCredentials {
    /// Bare store domain, e.g. `my-store.myshopify.com`.
    pub store_domain: String,
    pub access_token: String,
}

pub struct HttpStorefrontConnector {
    http: reqwest::Client,
}

impl HttpStorefrontConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceConnector for HttpStorefrontConnector {
    type Credentials = StorefrontCredentials;
    type Record = Order;

    fn source(&self) -> SourceKind {
        SourceKind::Orders
    }

    async fn fetch(
        &self,
        _identity: &Identity,
        credentials: &StorefrontCredentials,
        window: &FetchWindow,
    ) -> Result<Vec<Order>, SourceError> {
        let source = SourceKind::Orders;
        let mut raw_orders: Vec<RawOrder> = Vec::new();
        let mut page_info: Option<String> = None;

        loop {
            let url = match &page_info {
                Some(cursor) => format!(
                    "https://{}/admin/api/{}/orders.json?limit={}&page_info={}",
                    credentials.store_domain, API_VERSION, PAGE_SIZE, cursor
                ),
                None => format!(
                    "https://{}/admin/api/{}/orders.json?limit={}&status=any",
                    credentials.store_domain, API_VERSION, PAGE_SIZE
                ),
            };

            let response = self
                .http
                .get(&url)
                .header(ACCESS_TOKEN_HEADER, &credentials.access_token)
                .header("Content-Type", "application/json")
                .send()
                .await
                .map_err(|e| SourceError::Http {
                    kind: source,
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(SourceError::Auth {
                    kind: source,
                    reason: format!("storefront API rejected the access token ({status})"),
                });
            }
            if !status.is_success() {
                return Err(SourceError::Http {
                    kind: source,
                    reason: format!("storefront API returned HTTP {status}"),
                });
            }

            let link_header = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let page: RawOrdersPage = response.json().await.map_err(|e| SourceError::Decode {
                kind: source,
                reason: e.to_string(),
            })?;
            raw_orders.extend(page.orders);

            match link_header.as_deref().and_then(next_page_info) {
                Some(cursor) => page_info = Some(cursor),
                None => break,
            }
        }

        let orders = raw_orders
            .into_iter()
            .map(normalize_order)
            .filter(|order| window.includes(order.created_at))
            .collect();
        Ok(orders)
    }
}

/// Extract the `page_info` cursor from a `Link` header's `rel="next"` part,
/// if any. The header looks like:
/// `<https://..?page_info=abc&limit=250>; rel="next", <..>; rel="previous"`.
fn next_page_info(link_header: &str) -> Option<String> {
    for part in link_header.split(',') {
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let start = part.find("page_info=")? + "page_info=".len();
        let rest = &part[start..];
        let end = rest
            .find(|c| c == '&' || c == '>')
            .unwrap_or(rest.len());
        let cursor = &rest[..end];
        if !cursor.is_empty() {
            return Some(cursor.to_string());
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct RawOrdersPage {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    id: Option<i64>,
    name: Option<String>,
    created_at: Option<String>,
    total_price: Option<String>,
    gateway: Option<String>,
    financial_status: Option<String>,
    fulfillment_status: Option<String>,
    customer: Option<RawCustomer>,
    shipping_address: Option<RawAddress>,
    billing_address: Option<RawAddress>,
    #[serde(default)]
    line_items: Vec<RawLineItem>,
}

#[derive(Debug, Deserialize)]
struct RawCustomer {
    id: Option<i64>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    default_address: Option<RawAddress>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    city: Option<String>,
    province: Option<String>,
    country: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLineItem {
    name: Option<String>,
    quantity: Option<i64>,
    price: Option<String>,
    vendor: Option<String>,
    sku: Option<String>,
    #[serde(default)]
    properties: Vec<RawNoteProperty>,
}

#[derive(Debug, Deserialize)]
struct RawNoteProperty {
    name: Option<String>,
    value: Option<serde_json::Value>,
}

/// Cost stowed in a line item's free-form note properties, under a
/// `cost` or `cost_price` key. A data-entry convention, not a schema
/// field; absent means unknown.
fn line_item_cost(item: &RawLineItem) -> Option<f64> {
    item.properties.iter().find_map(|prop| {
        let name = prop.name.as_deref()?.to_lowercase();
        if name != "cost" && name != "cost_price" {
            return None;
        }
        super::lenient_f64(prop.value.as_ref())
    })
}

fn parse_price(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok()).unwrap_or(0.0)
}

fn normalize_order(raw: RawOrder) -> Order {
    let order_id = raw
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let order_number = raw.name.clone().unwrap_or_else(|| order_id.clone());

    let customer = raw.customer.as_ref();
    let customer_name = match (
        customer.and_then(|c| c.first_name.as_deref()),
        customer.and_then(|c| c.last_name.as_deref()),
    ) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last.trim())),
        (Some(first), None) => Some(first.to_string()),
        (None, Some(last)) => Some(last.to_string()),
        (None, None) => None,
    };
    let phone = customer
        .and_then(|c| c.phone.clone())
        .or_else(|| {
            customer
                .and_then(|c| c.default_address.as_ref())
                .and_then(|a| a.phone.clone())
        })
        .or_else(|| raw.shipping_address.as_ref().and_then(|a| a.phone.clone()))
        .or_else(|| raw.billing_address.as_ref().and_then(|a| a.phone.clone()));

    let line_items: Vec<LineItem> = raw
        .line_items
        .iter()
        .map(|item| LineItem {
            name: item.name.clone().unwrap_or_else(|| "Item".to_string()),
            quantity: item.quantity.unwrap_or(1),
            price: parse_price(item.price.as_deref()),
            cost: line_item_cost(item),
            vendor: item.vendor.clone(),
            sku: item.sku.clone(),
        })
        .collect();

    // Total cost is only as good as the note properties: sum cost * qty
    // over the items that carry one, None when no item does.
    let mut total_cost = 0.0;
    let mut any_cost = false;
    for item in &line_items {
        if let Some(cost) = item.cost {
            total_cost += cost * item.quantity as f64;
            any_cost = true;
        }
    }

    let created_at: Option<DateTime<Utc>> =
        raw.created_at.as_deref().and_then(parse_source_datetime);

    Order {
        order_id,
        order_number,
        customer_id: customer.and_then(|c| c.id.map(|id| id.to_string())),
        customer_name,
        email: customer.and_then(|c| c.email.clone()),
        phone,
        order_value: parse_price(raw.total_price.as_deref()),
        cost_price: any_cost.then_some(total_cost),
        payment_method: PaymentMethod::from_gateway(raw.gateway.as_deref()),
        financial_status: raw
            .financial_status
            .unwrap_or_else(|| "pending".to_string()),
        fulfillment_status: raw.fulfillment_status,
        city: raw.shipping_address.as_ref().and_then(|a| a.city.clone()),
        state: raw
            .shipping_address
            .as_ref()
            .and_then(|a| a.province.clone()),
        country: raw
            .shipping_address
            .as_ref()
            .and_then(|a| a.country.clone()),
        product: line_items.first().map(|item| item.name.clone()),
        quantity: line_items.iter().map(|item| item.quantity).sum(),
        vendor: line_items.first().and_then(|item| item.vendor.clone()),
        line_items,
        created_at,
    }
}
