//! Aggregation orchestrator: the single pipeline entry point. Cache-first,
//! concurrent three-way fan-out, per-source failure isolation, and an
//! unconditional cache write so a degraded upstream is not hammered for a
//! full TTL window.

use chrono::Utc;
use domain::{
    Campaign, DashboardReport, DateRange, FeeSettings, Identity, Order, Shipment, Snapshot,
    SourceKind,
};
use std::sync::Arc;

use crate::config::SettingsProvider;
use crate::source_connectors::{
    AdsCredentials, FetchWindow, LogisticsCredentials, SourceConnector, SourceError,
    StorefrontCredentials,
};

use super::breaker::{BreakerPolicy, CircuitBreaker};
use super::cache::SnapshotCache;
use super::reconcile;

pub type DynOrdersConnector =
    Arc<dyn SourceConnector<Credentials = StorefrontCredentials, Record = Order>>;
pub type DynAdsConnector = Arc<dyn SourceConnector<Credentials = AdsCredentials, Record = Campaign>>;
pub type DynShipmentsConnector =
    Arc<dyn SourceConnector<Credentials = LogisticsCredentials, Record = Shipment>>;

/// What a caller gets back: the (possibly degraded) snapshot, metrics
/// recomputed from it, and whether it was served from cache.
#[derive(Debug, Clone)]
pub struct AggregatedData {
    pub snapshot: Snapshot,
    pub report: DashboardReport,
    pub from_cache: bool,
}

pub struct Orchestrator {
    orders: DynOrdersConnector,
    ads: DynAdsConnector,
    shipments: DynShipmentsConnector,
    cache: Arc<dyn SnapshotCache>,
    settings: Arc<dyn SettingsProvider>,
    breaker: CircuitBreaker,
}

impl Orchestrator {
    pub fn new(
        orders: DynOrdersConnector,
        ads: DynAdsConnector,
        shipments: DynShipmentsConnector,
        cache: Arc<dyn SnapshotCache>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self::with_breaker_policy(
            orders,
            ads,
            shipments,
            cache,
            settings,
            BreakerPolicy::default(),
        )
    }

    pub fn with_breaker_policy(
        orders: DynOrdersConnector,
        ads: DynAdsConnector,
        shipments: DynShipmentsConnector,
        cache: Arc<dyn SnapshotCache>,
        settings: Arc<dyn SettingsProvider>,
        policy: BreakerPolicy,
    ) -> Self {
        Self {
            orders,
            ads,
            shipments,
            cache,
            settings,
            breaker: CircuitBreaker::new(policy),
        }
    }

    /// The sole pipeline entry point. Never fails: one source going down
    /// degrades its slot and lands in the error manifest, the rest of the
    /// snapshot stays usable.
    pub async fn aggregated_snapshot(
        &self,
        identity: &Identity,
        range: DateRange,
        force_refresh: bool,
    ) -> AggregatedData {
        if !force_refresh {
            if let Some(snapshot) = self.cache.get(identity, range).await {
                tracing::debug!("cache hit for {} range {range}", identity.user_id);
                let fees = self.fee_settings(identity).await;
                let report = reconcile::compute_report(&snapshot, &fees);
                return AggregatedData {
                    snapshot,
                    report,
                    from_cache: true,
                };
            }
        }

        let now = Utc::now();
        let window = FetchWindow::new(range, now);

        let settings = match self.settings.settings_for(identity).await {
            Ok(settings) => settings,
            Err(reason) => {
                // The settings store itself is down: every source degrades,
                // and the empty snapshot is still cached so a broken store
                // is not hit on every request.
                tracing::error!("settings unavailable for {}: {reason}", identity.user_id);
                let mut snapshot = Snapshot::empty(range, now);
                for source in SourceKind::ALL {
                    snapshot
                        .source_errors
                        .set(source, format!("configuration unavailable: {reason}"));
                }
                self.cache.put(identity, range, &snapshot).await;
                let report = reconcile::compute_report(&snapshot, &FeeSettings::default());
                return AggregatedData {
                    snapshot,
                    report,
                    from_cache: false,
                };
            }
        };

        // The three sources race; each slot settles on its own. The
        // reconcile step below only runs once all three have settled.
        let (orders_result, ads_result, shipments_result) = tokio::join!(
            self.run_source(&*self.orders, settings.storefront.as_ref(), identity, &window),
            self.run_source(&*self.ads, settings.ads.as_ref(), identity, &window),
            self.run_source(&*self.shipments, settings.logistics.as_ref(), identity, &window),
        );

        let mut snapshot = Snapshot::empty(range, now);
        snapshot.orders = settle(orders_result, &mut snapshot.source_errors);
        snapshot.campaigns = settle(ads_result, &mut snapshot.source_errors);
        snapshot.shipments = settle(shipments_result, &mut snapshot.source_errors);

        let report = reconcile::compute_report(&snapshot, &settings.fees);

        // Cached even when degraded: a stale-but-present entry beats
        // hammering a failing upstream for the whole TTL window.
        self.cache.put(identity, range, &snapshot).await;

        AggregatedData {
            snapshot,
            report,
            from_cache: false,
        }
    }

    async fn fee_settings(&self, identity: &Identity) -> FeeSettings {
        match self.settings.settings_for(identity).await {
            Ok(settings) => settings.fees,
            Err(reason) => {
                tracing::warn!("fee settings unavailable, using defaults: {reason}");
                FeeSettings::default()
            }
        }
    }

    /// Run one source through the credential check and circuit breaker.
    /// Only genuine upstream failures feed the breaker; missing
    /// configuration and an already-open breaker do not.
    async fn run_source<Creds, Record>(
        &self,
        connector: &dyn SourceConnector<Credentials = Creds, Record = Record>,
        credentials: Option<&Creds>,
        identity: &Identity,
        window: &FetchWindow,
    ) -> Result<Vec<Record>, SourceError>
    where
        Creds: Sync,
        Record: Send,
    {
        let source = connector.source();
        let Some(credentials) = credentials else {
            return Err(SourceError::NotConfigured {
                kind: source,
                reason: "no credentials saved for this source".to_string(),
            });
        };
        if let Some(until) = self.breaker.open_until(source, window.now) {
            return Err(SourceError::CoolingDown { kind: source, until });
        }

        match connector.fetch(identity, credentials, window).await {
            Ok(records) => {
                self.breaker.record_success(source);
                tracing::info!("{source} fetch returned {} records", records.len());
                Ok(records)
            }
            Err(e) => {
                if e.counts_as_upstream_failure() {
                    self.breaker.record_failure(source, Utc::now());
                }
                tracing::warn!("{source} fetch failed: {e}");
                Err(e)
            }
        }
    }
}

/// Collapse one settled source slot: records on success, an empty list
/// plus a manifest entry on failure.
fn settle<Record>(
    result: Result<Vec<Record>, SourceError>,
    errors: &mut domain::SourceErrors,
) -> Vec<Record> {
    match result {
        Ok(records) => records,
        Err(e) => {
            errors.set(e.kind(), e.to_string());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentitySettings;
    use crate::pipeline::cache::MemoryCache;
    use async_trait::async_trait;
    use chrono::Duration;
    use domain::PaymentMethod;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_order() -> Order {
        Order {
            order_id: "1".into(),
            order_number: "#1001".into(),
            customer_id: None,
            customer_name: None,
            email: None,
            phone: None,
            order_value: 100.0,
            cost_price: Some(40.0),
            payment_method: PaymentMethod::Prepaid,
            financial_status: "paid".into(),
            fulfillment_status: None,
            city: None,
            state: None,
            country: None,
            product: Some("Widget".into()),
            quantity: 1,
            vendor: None,
            line_items: vec![],
            created_at: None,
        }
    }

    fn sample_shipment() -> Shipment {
        Shipment {
            shipment_id: "s1".into(),
            order_id: Some("1".into()),
            order_number: Some("#1001".into()),
            awb: None,
            courier: None,
            status: "delivered".into(),
            rto_status: None,
            shipping_charge: 10.0,
            freight_charges: 10.0,
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

    fn sample_campaign() -> Campaign {
        Campaign {
            campaign_name: "c".into(),
            spend: 25.0,
            impressions: 100,
            clicks: 5,
            ctr: 5.0,
            cpc: 5.0,
            purchases: 1,
            roas: 2.0,
        }
    }

    struct StubOrders {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceConnector for StubOrders {
        type Credentials = StorefrontCredentials;
        type Record = Order;

        fn source(&self) -> SourceKind {
            SourceKind::Orders
        }

        async fn fetch(
            &self,
            _identity: &Identity,
            _credentials: &StorefrontCredentials,
            _window: &FetchWindow,
        ) -> Result<Vec<Order>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![sample_order()])
        }
    }

    struct StubAds {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SourceConnector for StubAds {
        type Credentials = AdsCredentials;
        type Record = Campaign;

        fn source(&self) -> SourceKind {
            SourceKind::Ads
        }

        async fn fetch(
            &self,
            _identity: &Identity,
            _credentials: &AdsCredentials,
            _window: &FetchWindow,
        ) -> Result<Vec<Campaign>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Http {
                    kind: SourceKind::Ads,
                    reason: "rate limited".to_string(),
                });
            }
            Ok(vec![sample_campaign()])
        }
    }

    struct StubShipments {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SourceConnector for StubShipments {
        type Credentials = LogisticsCredentials;
        type Record = Shipment;

        fn source(&self) -> SourceKind {
            SourceKind::Shipments
        }

        async fn fetch(
            &self,
            _identity: &Identity,
            _credentials: &LogisticsCredentials,
            _window: &FetchWindow,
        ) -> Result<Vec<Shipment>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Http {
                    kind: SourceKind::Shipments,
                    reason: "upstream 500".to_string(),
                });
            }
            Ok(vec![sample_shipment()])
        }
    }

    struct StaticSettings(IdentitySettings);

    #[async_trait]
    impl SettingsProvider for StaticSettings {
        async fn settings_for(&self, _identity: &Identity) -> Result<IdentitySettings, String> {
            Ok(self.0.clone())
        }
    }

    fn full_settings() -> IdentitySettings {
        IdentitySettings {
            fees: FeeSettings::default(),
            storefront: Some(StorefrontCredentials {
                store_domain: "shop.example.com".into(),
                access_token: "token".into(),
            }),
            logistics: Some(LogisticsCredentials {
                email: "ship@example.com".into(),
                password: "pw".into(),
            }),
            ads: Some(AdsCredentials {
                access_token: "ads-token".into(),
                ad_account_id: "act_1".into(),
                app_id: None,
                app_secret: None,
            }),
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        orders: Arc<StubOrders>,
        ads: Arc<StubAds>,
        shipments: Arc<StubShipments>,
    }

    fn fixture(ads_fail: bool, shipments_fail: bool, settings: IdentitySettings) -> Fixture {
        fixture_with_policy(ads_fail, shipments_fail, settings, BreakerPolicy::default())
    }

    fn fixture_with_policy(
        ads_fail: bool,
        shipments_fail: bool,
        settings: IdentitySettings,
        policy: BreakerPolicy,
    ) -> Fixture {
        let orders = Arc::new(StubOrders {
            calls: AtomicUsize::new(0),
        });
        let ads = Arc::new(StubAds {
            calls: AtomicUsize::new(0),
            fail: ads_fail,
        });
        let shipments = Arc::new(StubShipments {
            calls: AtomicUsize::new(0),
            fail: shipments_fail,
        });
        let orchestrator = Orchestrator::with_breaker_policy(
            orders.clone(),
            ads.clone(),
            shipments.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(StaticSettings(settings)),
            policy,
        );
        Fixture {
            orchestrator,
            orders,
            ads,
            shipments,
        }
    }

    #[tokio::test]
    async fn cache_miss_fetches_then_hit_reuses() {
        let f = fixture(false, false, full_settings());
        let identity = Identity::user("u1");

        let first = f
            .orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), false)
            .await;
        assert!(!first.from_cache);
        assert_eq!(f.orders.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.ads.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.shipments.calls.load(Ordering::SeqCst), 1);

        let second = f
            .orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), false)
            .await;
        assert!(second.from_cache);
        // No further connector calls inside the TTL window.
        assert_eq!(f.orders.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.ads.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.shipments.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.snapshot, first.snapshot);
        assert_eq!(second.report, first.report);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_the_cache() {
        let f = fixture(false, false, full_settings());
        let identity = Identity::user("u1");

        f.orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(7), false)
            .await;
        f.orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(7), true)
            .await;
        assert_eq!(f.orders.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_failing_source_degrades_only_its_slot() {
        let f = fixture(true, false, full_settings());
        let identity = Identity::user("u1");

        let result = f
            .orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), false)
            .await;
        assert_eq!(result.snapshot.orders.len(), 1);
        assert_eq!(result.snapshot.shipments.len(), 1);
        assert!(result.snapshot.campaigns.is_empty());
        assert!(result.snapshot.source_errors.ads.is_some());
        assert!(result.snapshot.source_errors.orders.is_none());
        assert!(result.snapshot.source_errors.shipments.is_none());
        // Metrics still computed over the two healthy sources.
        assert_eq!(result.report.metrics.total_revenue, 100.0);
        assert_eq!(result.report.metrics.total_ad_spend, 0.0);
    }

    #[tokio::test]
    async fn degraded_snapshot_is_cached_too() {
        let f = fixture(true, false, full_settings());
        let identity = Identity::user("u1");

        f.orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), false)
            .await;
        let second = f
            .orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), false)
            .await;
        assert!(second.from_cache);
        assert!(second.snapshot.source_errors.ads.is_some());
        // The failing source was not retried on the cached read.
        assert_eq!(f.ads.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_credentials_read_as_not_configured() {
        let mut settings = full_settings();
        settings.ads = None;
        let f = fixture(false, false, settings);
        let identity = Identity::user("u1");

        let result = f
            .orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), false)
            .await;
        let message = result.snapshot.source_errors.ads.unwrap();
        assert!(message.contains("not configured"), "got: {message}");
        // The connector itself was never invoked.
        assert_eq!(f.ads.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_failures_put_a_source_on_cooldown() {
        let policy = BreakerPolicy {
            failure_threshold: 2,
            cooldown: Duration::minutes(15),
        };
        let f = fixture_with_policy(false, true, full_settings(), policy);
        let identity = Identity::user("u1");

        f.orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), true)
            .await;
        f.orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), true)
            .await;
        assert_eq!(f.shipments.calls.load(Ordering::SeqCst), 2);

        // Third attempt: the breaker is open, so the upstream is skipped.
        let third = f
            .orchestrator
            .aggregated_snapshot(&identity, DateRange::Days(30), true)
            .await;
        assert_eq!(f.shipments.calls.load(Ordering::SeqCst), 2);
        let message = third.snapshot.source_errors.shipments.unwrap();
        assert!(message.contains("cooling down"), "got: {message}");
        // Healthy sources keep flowing while one cools down.
        assert_eq!(third.snapshot.orders.len(), 1);
    }
}
