//! Shared data model for the analytics pipeline: canonical order, shipment,
//! and campaign records, the aggregated snapshot, and the derived-metric
//! payloads served to callers.

mod metrics;
mod range;
mod records;
mod settings;
mod snapshot;

pub use metrics::*;
pub use range::DateRange;
pub use records::*;
pub use settings::*;
pub use snapshot::*;

use serde::{Deserialize, Serialize};

/// Whose data is being aggregated. Supplied by the auth layer; the pipeline
/// only uses it as a cache/configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub company_id: Option<String>,
}

impl Identity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            company_id: None,
        }
    }
}

/// The three upstream data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Orders,
    Ads,
    Shipments,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Orders, SourceKind::Ads, SourceKind::Shipments];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Orders => "orders",
            SourceKind::Ads => "ads",
            SourceKind::Shipments => "shipments",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
