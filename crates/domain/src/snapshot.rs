//! The aggregated snapshot: the unit of work the cache stores and callers
//! receive. Raw records only — derived metrics are always recomputed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Campaign, DateRange, Order, Shipment, SourceKind};

/// Per-source failure manifest. A populated slot means that source's data
/// degraded to an empty list in the snapshot it accompanies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceErrors {
    pub orders: Option<String>,
    pub ads: Option<String>,
    pub shipments: Option<String>,
}

impl SourceErrors {
    pub fn get(&self, source: SourceKind) -> Option<&str> {
        match source {
            SourceKind::Orders => self.orders.as_deref(),
            SourceKind::Ads => self.ads.as_deref(),
            SourceKind::Shipments => self.shipments.as_deref(),
        }
    }

    pub fn set(&mut self, source: SourceKind, message: String) {
        let slot = match source {
            SourceKind::Orders => &mut self.orders,
            SourceKind::Ads => &mut self.ads,
            SourceKind::Shipments => &mut self.shipments,
        };
        *slot = Some(message);
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_none() && self.ads.is_none() && self.shipments.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &str)> {
        SourceKind::ALL
            .into_iter()
            .filter_map(|source| self.get(source).map(|msg| (source, msg)))
    }
}

/// Everything fetched for one `(identity, date range)` pair in one cycle.
/// Valid for exactly that pair; superseded wholesale by the next write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub shipments: Vec<Shipment>,
    pub campaigns: Vec<Campaign>,
    pub source_errors: SourceErrors,
    pub fetched_at: DateTime<Utc>,
    pub date_range: DateRange,
}

impl Snapshot {
    pub fn empty(date_range: DateRange, fetched_at: DateTime<Utc>) -> Self {
        Self {
            orders: Vec::new(),
            shipments: Vec::new(),
            campaigns: Vec::new(),
            source_errors: SourceErrors::default(),
            fetched_at,
            date_range,
        }
    }
}
