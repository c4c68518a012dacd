//! Ads insights connector: short-to-long token upgrade (persisted back
//! through a side-channel sink), one insights query per window, purchase
//! extraction from the actions arrays.

use async_trait::async_trait;
use chrono::Duration;
use domain::{Campaign, DateRange, Identity, SourceKind};
use serde::Deserialize;
use std::sync::Arc;

use super::{FetchWindow, SourceConnector, SourceError};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0";
const INSIGHT_FIELDS: &str = "campaign_name,spend,impressions,clicks,ctr,cpc,actions,action_values";
/// Long-lived tokens from the graph API start with this prefix; upgrading
/// one again is a wasted round-trip.
const LONG_LIVED_TOKEN_PREFIX: &str = "EAAG";

#[derive(Debug, Clone)]
pub struct AdsCredentials {
    pub access_token: String,
    pub ad_account_id: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

/// Where an upgraded long-lived token gets persisted so later fetch cycles
/// skip the exchange. Failure to persist never fails a fetch.
#[async_trait]
pub trait TokenSink: Send + Sync {
    async fn store_ads_token(&self, identity: &Identity, access_token: &str);
}

/// Sink for tests and credential sources with nowhere to write back.
pub struct NoopTokenSink;

#[async_trait]
impl TokenSink for NoopTokenSink {
    async fn store_ads_token(&self, _identity: &Identity, _access_token: &str) {}
}

pub struct HttpAdsConnector {
    http: reqwest::Client,
    base_url: String,
    token_sink: Arc<dyn TokenSink>,
}

impl HttpAdsConnector {
    /// Set ADS_API_BASE_URL to point at a stub graph endpoint; the
    /// production API is the default.
    pub fn new(http: reqwest::Client, token_sink: Arc<dyn TokenSink>) -> Self {
        let base_url = match std::env::var("ADS_API_BASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => DEFAULT_BASE_URL.to_string(),
        };
        Self {
            http,
            base_url,
            token_sink,
        }
    }

    /// Exchange a short-lived token for a long-lived one when app
    /// credentials allow it. Any failure falls back to the original token
    /// rather than aborting the fetch.
    async fn upgrade_token(&self, identity: &Identity, credentials: &AdsCredentials) -> String {
        let (Some(app_id), Some(app_secret)) =
            (credentials.app_id.as_deref(), credentials.app_secret.as_deref())
        else {
            return credentials.access_token.clone();
        };
        if credentials.access_token.starts_with(LONG_LIVED_TOKEN_PREFIX) {
            return credentials.access_token.clone();
        }

        let exchange = self
            .http
            .get(format!("{}/oauth/access_token", self.base_url))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", app_id),
                ("client_secret", app_secret),
                ("fb_exchange_token", credentials.access_token.as_str()),
            ])
            .send()
            .await;

        let token = match exchange {
            Ok(response) => response
                .json::<RawTokenResponse>()
                .await
                .ok()
                .and_then(|body| body.access_token),
            Err(e) => {
                tracing::warn!("ads token exchange failed: {e}");
                None
            }
        };

        match token {
            Some(long_lived) => {
                self.token_sink.store_ads_token(identity, &long_lived).await;
                long_lived
            }
            None => credentials.access_token.clone(),
        }
    }
}

#[async_trait]
impl SourceConnector for HttpAdsConnector {
    type Credentials = AdsCredentials;
    type Record = Campaign;

    fn source(&self) -> SourceKind {
        SourceKind::Ads
    }

    async fn fetch(
        &self,
        identity: &Identity,
        credentials: &AdsCredentials,
        window: &FetchWindow,
    ) -> Result<Vec<Campaign>, SourceError> {
        let source = SourceKind::Ads;
        let access_token = self.upgrade_token(identity, credentials).await;

        let until = window.now.date_naive();
        let since = match window.range {
            DateRange::Today => until,
            DateRange::Days(days) => (window.now - Duration::days(i64::from(days))).date_naive(),
        };
        let time_range = format!(r#"{{"since":"{since}","until":"{until}"}}"#);

        let mut campaigns = Vec::new();
        let mut next_url: Option<String> = None;

        loop {
            let request = match &next_url {
                // `paging.next` is a complete pre-signed URL.
                Some(url) => self.http.get(url),
                None => self
                    .http
                    .get(format!(
                        "{}/{}/insights",
                        self.base_url, credentials.ad_account_id
                    ))
                    .query(&[
                        ("fields", INSIGHT_FIELDS),
                        ("time_range", time_range.as_str()),
                        ("level", "campaign"),
                        ("access_token", access_token.as_str()),
                    ]),
            };

            let response = request.send().await.map_err(|e| SourceError::Http {
                kind: source,
                reason: e.to_string(),
            })?;
            let body: RawInsightsResponse =
                response.json().await.map_err(|e| SourceError::Decode {
                    kind: source,
                    reason: e.to_string(),
                })?;

            if let Some(error) = body.error {
                let reason = error
                    .message
                    .unwrap_or_else(|| "ads API returned an error".to_string());
                return Err(SourceError::Auth { kind: source, reason });
            }

            campaigns.extend(body.data.into_iter().map(normalize_campaign));

            match body.paging.and_then(|p| p.next) {
                Some(next) => next_url = Some(next),
                None => break,
            }
        }

        Ok(campaigns)
    }
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInsightsResponse {
    #[serde(default)]
    data: Vec<RawCampaign>,
    paging: Option<RawPaging>,
    error: Option<RawApiError>,
}

#[derive(Debug, Deserialize)]
struct RawPaging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCampaign {
    campaign_name: Option<String>,
    spend: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    ctr: Option<String>,
    cpc: Option<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    action_values: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    action_type: Option<String>,
    value: Option<String>,
}

fn parse_f64(raw: &Option<String>) -> f64 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn parse_i64(raw: &Option<String>) -> i64 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

fn purchase_value(actions: &[RawAction]) -> f64 {
    actions
        .iter()
        .find(|action| action.action_type.as_deref() == Some("purchase"))
        .map(|action| parse_f64(&action.value))
        .unwrap_or(0.0)
}

fn normalize_campaign(raw: RawCampaign) -> Campaign {
    let spend = parse_f64(&raw.spend);
    let purchase_total = purchase_value(&raw.action_values);
    Campaign {
        campaign_name: raw
            .campaign_name
            .unwrap_or_else(|| "Unnamed campaign".to_string()),
        spend,
        impressions: parse_i64(&raw.impressions),
        clicks: parse_i64(&raw.clicks),
        ctr: parse_f64(&raw.ctr),
        cpc: parse_f64(&raw.cpc),
        purchases: purchase_value(&raw.actions) as i64,
        roas: if spend > 0.0 {
            purchase_total / spend
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_campaign(value: serde_json::Value) -> RawCampaign {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn purchases_extracted_from_action_arrays() {
        let campaign = normalize_campaign(raw_campaign(json!({
            "campaign_name": "Spring push",
            "spend": "200.0",
            "impressions": "10000",
            "clicks": "350",
            "ctr": "3.5",
            "cpc": "0.57",
            "actions": [
                {"action_type": "link_click", "value": "350"},
                {"action_type": "purchase", "value": "12"}
            ],
            "action_values": [
                {"action_type": "purchase", "value": "900.0"}
            ]
        })));
        assert_eq!(campaign.purchases, 12);
        assert_eq!(campaign.roas, 4.5);
    }

    #[test]
    fn zero_spend_means_zero_roas() {
        let campaign = normalize_campaign(raw_campaign(json!({
            "campaign_name": "Paused",
            "spend": "0",
            "action_values": [{"action_type": "purchase", "value": "100.0"}]
        })));
        assert_eq!(campaign.roas, 0.0);
        assert_eq!(campaign.spend, 0.0);
    }
}
