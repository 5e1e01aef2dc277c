use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing_test::traced_test;

use alerts::{AlertRegistry, Owner};
use market::{PriceSource, PriceSourceError, TradingPair};
use poller::{AlertEvent, AlertPoller, Notifier, NotifyError, PollerConfig, TickReport};

use mock_store::MockStore;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Serves canned prices; tokens without a price fail as unavailable.
#[derive(Default)]
struct MockPriceSource {
    prices: Mutex<HashMap<String, Result<f64, PriceSourceError>>>,
    delay: Option<Duration>,
    /// Removes the token from this registry mid-fetch, when set.
    remove_during_fetch: OnceLock<Arc<AlertRegistry<MockStore>>>,
}

impl MockPriceSource {
    fn set(&self, token: &str, price: f64) {
        self.prices.lock().unwrap().insert(token.into(), Ok(price));
    }

    fn fail(&self, token: &str) {
        self.prices.lock().unwrap().insert(
            token.into(),
            Err(PriceSourceError::UpstreamUnavailable("HTTP 502".into())),
        );
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_pairs(&self, token_id: &str) -> Result<Vec<TradingPair>, PriceSourceError> {
        Err(PriceSourceError::NotFound(token_id.into()))
    }

    async fn fetch_latest_price(&self, token_id: &str) -> Result<f64, PriceSourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(registry) = self.remove_during_fetch.get() {
            registry.remove(token_id).await.unwrap();
        }
        self.prices
            .lock()
            .unwrap()
            .get(token_id)
            .cloned()
            .unwrap_or_else(|| Err(PriceSourceError::UpstreamUnavailable("no route".into())))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<AlertEvent>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn sent(&self) -> Vec<AlertEvent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::DeliveryFailed("channel not found".into()));
        }
        self.sent.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Replaces the alert it is delivering with a fresh registration, as a user
/// re-running `!vwap` mid-delivery would.
#[derive(Default)]
struct ReRegisteringNotifier {
    registry: OnceLock<Arc<AlertRegistry<MockStore>>>,
    sent_targets: Mutex<Vec<f64>>,
}

#[async_trait]
impl Notifier for ReRegisteringNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        self.sent_targets.lock().unwrap().push(event.target_price);
        if let Some(registry) = self.registry.get() {
            registry
                .register(&event.token_id, 500.0, "AAA", 480.0, Owner::new("bob", ""))
                .await
                .unwrap();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type TestPoller = AlertPoller<MockStore, MockPriceSource, RecordingNotifier>;

struct Harness {
    store: MockStore,
    registry: Arc<AlertRegistry<MockStore>>,
    source: Arc<MockPriceSource>,
    notifier: Arc<RecordingNotifier>,
    poller: TestPoller,
}

async fn harness_with(cfg: PollerConfig, source: MockPriceSource) -> Harness {
    let store = MockStore::new();
    let registry = Arc::new(AlertRegistry::open(Arc::new(store.clone())).await.unwrap());
    let source = Arc::new(source);
    let notifier = Arc::new(RecordingNotifier::default());
    let poller = AlertPoller::new(cfg, registry.clone(), source.clone(), notifier.clone());

    Harness {
        store,
        registry,
        source,
        notifier,
        poller,
    }
}

async fn harness() -> Harness {
    harness_with(PollerConfig::default(), MockPriceSource::default()).await
}

fn alice() -> Owner {
    Owner::new("alice", "https://cdn.example/alice.png")
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 5, 12, 0, 0).unwrap()
}

fn mins(m: i64) -> chrono::Duration {
    chrono::Duration::minutes(m)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn price_in_band_fires_once_and_records_time() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 150.0, alice()).await?;
    h.source.set("0xaaa", 95.0);

    let report = h.poller.tick(t0()).await;

    assert_eq!(report.fired, 1);
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ticker, "AAA");
    assert_eq!(sent[0].price, 95.0);
    assert!((sent[0].deviation_pct + 5.0).abs() < 1e-9);
    assert_eq!(sent[0].owner, alice());

    let r = h.registry.get("0xaaa").await.unwrap();
    assert_eq!(r.last_known_price, 95.0);
    assert_eq!(r.last_alert_at, Some(t0()));

    Ok(())
}

#[tokio::test]
async fn out_of_band_updates_price_only() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 150.0, alice()).await?;
    h.source.set("0xaaa", 120.0);

    let report = h.poller.tick(t0()).await;

    assert_eq!(report.out_of_band, 1);
    assert!(h.notifier.sent().is_empty());

    let r = h.registry.get("0xaaa").await.unwrap();
    assert_eq!(r.last_known_price, 120.0);
    assert!(r.last_alert_at.is_none());

    // and the observed price reached the store
    assert_eq!(h.store.snapshot.lock().await[0].last_known_price, 120.0);

    Ok(())
}

#[tokio::test]
async fn suppressed_for_24_hours_after_firing() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;
    h.source.set("0xaaa", 100.0);

    assert_eq!(h.poller.tick(t0()).await.fired, 1);
    assert_eq!(h.poller.tick(t0() + mins(1)).await.suppressed, 1);
    assert_eq!(
        h.poller.tick(t0() + mins(23 * 60 + 59)).await.suppressed,
        1
    );
    assert_eq!(h.poller.tick(t0() + mins(24 * 60)).await.fired, 1);

    assert_eq!(h.notifier.sent().len(), 2);
    assert_eq!(
        h.registry.get("0xaaa").await.unwrap().last_alert_at,
        Some(t0() + mins(24 * 60))
    );

    Ok(())
}

#[tokio::test]
async fn leaving_and_reentering_band_does_not_reset_suppression() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;

    h.source.set("0xaaa", 100.0);
    assert_eq!(h.poller.tick(t0()).await.fired, 1);

    h.source.set("0xaaa", 150.0);
    assert_eq!(h.poller.tick(t0() + mins(60)).await.out_of_band, 1);

    h.source.set("0xaaa", 105.0);
    assert_eq!(h.poller.tick(t0() + mins(120)).await.suppressed, 1);

    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.registry.get("0xaaa").await.unwrap().last_alert_at, Some(t0()));

    Ok(())
}

#[tokio::test]
#[traced_test]
async fn upstream_failure_for_one_token_does_not_block_others() -> anyhow::Result<()> {
    let h = harness().await;
    for (token, ticker) in [("0xaaa", "AAA"), ("0xbbb", "BBB"), ("0xccc", "CCC")] {
        h.registry.register(token, 10.0, ticker, 10.0, alice()).await?;
    }
    h.source.set("0xaaa", 10.5);
    h.source.fail("0xbbb");
    h.source.set("0xccc", 9.5);

    let report = h.poller.tick(t0()).await;

    assert_eq!(
        report,
        TickReport {
            checked: 3,
            fetch_failed: 1,
            fired: 2,
            ..Default::default()
        }
    );

    let mut fired: Vec<_> = h.notifier.sent().into_iter().map(|e| e.ticker).collect();
    fired.sort();
    assert_eq!(fired, vec!["AAA", "CCC"]);

    // the failed token keeps its last known price
    assert_eq!(h.registry.get("0xbbb").await.unwrap().last_known_price, 10.0);
    assert!(logs_contain("price fetch failed, skipping this cycle"));

    Ok(())
}

#[tokio::test]
async fn delivery_failure_leaves_alert_eligible() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;
    h.source.set("0xaaa", 101.0);

    h.notifier.set_failing(true);
    let report = h.poller.tick(t0()).await;
    assert_eq!(report.delivery_failed, 1);
    assert!(h.registry.get("0xaaa").await.unwrap().last_alert_at.is_none());

    h.notifier.set_failing(false);
    let report = h.poller.tick(t0() + mins(1)).await;
    assert_eq!(report.fired, 1);
    assert_eq!(
        h.registry.get("0xaaa").await.unwrap().last_alert_at,
        Some(t0() + mins(1))
    );

    Ok(())
}

#[tokio::test]
async fn removed_token_is_skipped_on_next_tick() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;
    h.source.set("0xaaa", 100.0);

    assert!(h.registry.remove("0xaaa").await?);
    let report = h.poller.tick(t0()).await;

    assert_eq!(report, TickReport::default());
    assert!(h.notifier.sent().is_empty());
    assert!(h.registry.get("0xaaa").await.is_none());

    Ok(())
}

#[tokio::test]
async fn token_removed_mid_tick_is_a_noop() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;
    h.source.set("0xaaa", 100.0);
    h.source
        .remove_during_fetch
        .set(h.registry.clone())
        .map_err(|_| anyhow::anyhow!("already set"))?;

    let report = h.poller.tick(t0()).await;

    assert_eq!(report.vanished, 1);
    assert!(h.notifier.sent().is_empty());
    assert!(h.registry.get("0xaaa").await.is_none());
    assert!(h.store.snapshot.lock().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn slow_upstream_times_out_without_stalling_the_tick() -> anyhow::Result<()> {
    let cfg = PollerConfig {
        fetch_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let source = MockPriceSource {
        delay: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let h = harness_with(cfg, source).await;
    h.registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;
    h.registry.register("0xbbb", 100.0, "BBB", 100.0, alice()).await?;

    let started = std::time::Instant::now();
    let report = h.poller.tick(t0()).await;

    assert_eq!(report.fetch_failed, 2);
    assert!(started.elapsed() < Duration::from_secs(5));

    Ok(())
}

#[tokio::test]
async fn persistence_failure_skips_record_without_notifying() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 80.0, alice()).await?;
    h.source.set("0xaaa", 100.0);

    h.store.set_fail_writes(true);
    let report = h.poller.tick(t0()).await;

    assert_eq!(report.persistence_failed, 1);
    assert!(h.notifier.sent().is_empty());
    // memory matches what is on "disk"
    assert_eq!(h.registry.get("0xaaa").await.unwrap().last_known_price, 80.0);

    Ok(())
}

#[tokio::test]
async fn restart_continues_suppression_window() -> anyhow::Result<()> {
    let h = harness().await;
    h.registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;
    h.source.set("0xaaa", 100.0);
    assert_eq!(h.poller.tick(t0()).await.fired, 1);

    // "restart": new registry and poller on top of the same store
    let registry = Arc::new(AlertRegistry::open(Arc::new(h.store.clone())).await?);
    let notifier = Arc::new(RecordingNotifier::default());
    let poller = AlertPoller::new(
        PollerConfig::default(),
        registry.clone(),
        h.source.clone(),
        notifier.clone(),
    );

    assert_eq!(poller.tick(t0() + mins(12 * 60)).await.suppressed, 1);
    assert_eq!(poller.tick(t0() + mins(24 * 60)).await.fired, 1);
    assert_eq!(notifier.sent().len(), 1);

    Ok(())
}

#[tokio::test]
async fn run_loop_ticks_and_respects_suppression() -> anyhow::Result<()> {
    let cfg = PollerConfig {
        poll_every: Duration::from_millis(10),
        ..Default::default()
    };
    let h = harness_with(cfg, MockPriceSource::default()).await;
    h.registry.register("0xaaa", 1.0, "AAA", 1.0, alice()).await?;
    h.source.set("0xaaa", 1.0);

    let Harness {
        registry,
        notifier,
        poller,
        ..
    } = h;

    let handle = tokio::spawn(Arc::new(poller).run());
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    assert_eq!(notifier.sent().len(), 1);
    assert!(registry.get("0xaaa").await.unwrap().last_alert_at.is_some());

    Ok(())
}

#[tokio::test]
async fn re_registration_during_delivery_starts_unfired() -> anyhow::Result<()> {
    let store = MockStore::new();
    let registry = Arc::new(AlertRegistry::open(Arc::new(store.clone())).await?);
    let source = Arc::new(MockPriceSource::default());
    let notifier = Arc::new(ReRegisteringNotifier::default());
    notifier
        .registry
        .set(registry.clone())
        .map_err(|_| anyhow::anyhow!("already set"))?;
    let poller = AlertPoller::new(
        PollerConfig::default(),
        registry.clone(),
        source.clone(),
        notifier.clone(),
    );

    registry.register("0xaaa", 100.0, "AAA", 100.0, alice()).await?;
    source.set("0xaaa", 100.0);

    let report = poller.tick(t0()).await;
    assert_eq!(report.fired, 1);
    assert_eq!(*notifier.sent_targets.lock().unwrap(), vec![100.0]);

    let replaced = registry.get("0xaaa").await.unwrap();
    assert_eq!(replaced.target_price, 500.0);
    assert_eq!(replaced.owner.display_name, "bob");
    assert_eq!(replaced.last_known_price, 480.0);
    assert!(replaced.last_alert_at.is_none());
    assert!(store.snapshot.lock().await[0].last_alert_at.is_none());

    Ok(())
}
