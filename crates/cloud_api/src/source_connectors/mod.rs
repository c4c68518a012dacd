use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{DateRange, Identity, SourceKind};
use thiserror::Error;

pub mod ads;
pub mod logistics;
pub mod storefront;

pub use ads::{AdsCredentials, HttpAdsConnector, NoopTokenSink, TokenSink};
pub use logistics::{HttpLogisticsConnector, LogisticsCredentials};
pub use storefront::{HttpStorefrontConnector, StorefrontCredentials};

/// Why a source contributed nothing this cycle. `NotConfigured` guides the
/// user toward setup; the rest mean configured-but-failing.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("{kind} source is not configured: {reason}")]
    NotConfigured { kind: SourceKind, reason: String },
    #[error("{kind} authentication failed: {reason}")]
    Auth { kind: SourceKind, reason: String },
    #[error("{kind} request failed: {reason}")]
    Http { kind: SourceKind, reason: String },
    #[error("{kind} returned an unreadable response: {reason}")]
    Decode { kind: SourceKind, reason: String },
    #[error("{kind} is cooling down until {until} after repeated failures")]
    CoolingDown {
        kind: SourceKind,
        until: DateTime<Utc>,
    },
}

impl SourceError {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceError::NotConfigured { kind, .. }
            | SourceError::Auth { kind, .. }
            | SourceError::Http { kind, .. }
            | SourceError::Decode { kind, .. }
            | SourceError::CoolingDown { kind, .. } => *kind,
        }
    }

    /// Failures that should count against the source's circuit breaker.
    /// Missing configuration and an already-open breaker are not upstream
    /// failures.
    pub fn counts_as_upstream_failure(&self) -> bool {
        !matches!(
            self,
            SourceError::NotConfigured { .. } | SourceError::CoolingDown { .. }
        )
    }
}

/// The fetch window handed to every connector: the reporting range plus the
/// instant it was anchored at, so client-side filtering is reproducible.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub range: DateRange,
    pub now: DateTime<Utc>,
}

impl FetchWindow {
    pub fn new(range: DateRange, now: DateTime<Utc>) -> Self {
        Self { range, now }
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.range.cutoff_from(self.now)
    }

    /// Client-side date filter with conservative inclusion: a record whose
    /// timestamp is missing (unparseable upstream) is kept rather than
    /// silently hidden by a parse failure.
    pub fn includes(&self, created_at: Option<DateTime<Utc>>) -> bool {
        match created_at {
            Some(at) => at >= self.cutoff(),
            None => true,
        }
    }
}

/// One upstream source. Implementations own authentication, full-sweep
/// pagination, and raw-to-canonical mapping. They never retry internally
/// and never return a partial sweep as success; retry/cooldown policy
/// belongs to the orchestrator.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    type Credentials;
    type Record;

    fn source(&self) -> SourceKind;

    async fn fetch(
        &self,
        identity: &Identity,
        credentials: &Self::Credentials,
        window: &FetchWindow,
    ) -> Result<Vec<Self::Record>, SourceError>;
}

/// Best-effort f64 from the loosely typed JSON the sources emit (numbers,
/// numeric strings, or garbage).
pub(crate) fn lenient_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Best-effort owned string from a JSON value that may be a string or number.
pub(crate) fn lenient_string(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the date formats the sources actually send: RFC 3339 or the
/// `YYYY-MM-DD HH:MM:SS` form. The all-zero sentinel and anything else
/// unparseable yield `None`.
pub(crate) fn parse_source_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("0000-00-00") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn window_keeps_dateless_records() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let window = FetchWindow::new(DateRange::Days(7), now);
        assert!(window.includes(None));
        assert!(window.includes(Some(now - chrono::Duration::days(3))));
        assert!(!window.includes(Some(now - chrono::Duration::days(8))));
    }

    #[test]
    fn lenient_parsing_accepts_strings_and_numbers() {
        let freight = json!("45.5");
        let cod = json!(30);
        let junk = json!({"nested": true});
        assert_eq!(lenient_f64(Some(&freight)), Some(45.5));
        assert_eq!(lenient_f64(Some(&cod)), Some(30.0));
        assert_eq!(lenient_f64(Some(&junk)), None);
        assert_eq!(lenient_f64(None), None);
        assert_eq!(lenient_string(Some(&cod)).as_deref(), Some("30"));
    }

    #[test]
    fn zero_date_sentinel_is_unparseable() {
        assert!(parse_source_datetime("0000-00-00 00:00:00").is_none());
        assert!(parse_source_datetime("not a date").is_none());
        assert!(parse_source_datetime("2026-03-01 10:30:00").is_some());
        assert!(parse_source_datetime("2026-03-01T10:30:00Z").is_some());
    }
}
