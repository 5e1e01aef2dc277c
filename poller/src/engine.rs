//! The main poll loop.
//!
//! For each tick it:
//!   1. Takes a snapshot of the alert registry.
//!   2. Fetches a fresh price for every alert, with bounded concurrency and a
//!      per-call timeout.
//!   3. Records the observed price, then checks band and suppression.
//!   4. Notifies and records the fire time for alerts that qualify.
//!
//! Every alert is processed in isolation: an upstream, delivery or storage
//! failure for one token never stops the others.

use std::sync::Arc;
use std::time::Duration;

use alerts::{AlertRecord, AlertStore, Observed, Revision};
use chrono::{DateTime, Utc};
use common::logger::{TraceId, annotate_token, child_span, root_span, warn_if_slow};
use futures::{StreamExt, stream};
use market::PriceSource;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{Instrument, debug, error, info, warn};

use super::band::{Evaluation, evaluate};
use super::notifier::{AlertEvent, Notifier};
use super::types::{PollerConfig, RecordOutcome, SharedRegistry, TickReport};

const SLOW_FETCH: Duration = Duration::from_secs(5);

pub struct AlertPoller<S, P, N>
where
    S: AlertStore,
    P: PriceSource,
    N: Notifier + ?Sized,
{
    cfg: PollerConfig,
    registry: SharedRegistry<S>,
    source: Arc<P>,
    notifier: Arc<N>,
}

impl<S, P, N> AlertPoller<S, P, N>
where
    S: AlertStore,
    P: PriceSource,
    N: Notifier + ?Sized,
{
    pub fn new(
        cfg: PollerConfig,
        registry: SharedRegistry<S>,
        source: Arc<P>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            cfg,
            registry,
            source,
            notifier,
        }
    }

    /// Tick forever on `cfg.poll_every`. Missed ticks are skipped rather than
    /// replayed back to back.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.cfg.poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            every_s = self.cfg.poll_every.as_secs(),
            tolerance = self.cfg.band_tolerance,
            suppression_h = self.cfg.suppression_window.num_hours(),
            "alert poller started"
        );

        loop {
            ticker.tick().await;

            let trace_id = TraceId::default();
            let report = self
                .tick(Utc::now())
                .instrument(root_span("poll_tick", &trace_id))
                .await;

            if report.checked == 0 {
                debug!("no alerts registered");
                continue;
            }

            info!(
                trace_id = %trace_id.as_str(),
                checked = report.checked,
                fired = report.fired,
                suppressed = report.suppressed,
                out_of_band = report.out_of_band,
                fetch_failed = report.fetch_failed,
                delivery_failed = report.delivery_failed,
                persistence_failed = report.persistence_failed,
                "poll tick finished"
            );
        }
    }

    /// Evaluate every alert currently registered, as of `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let snapshot = self.registry.list().await;

        let outcomes: Vec<RecordOutcome> = stream::iter(snapshot)
            .map(|record| {
                self.process_record(record, now)
                    .instrument(child_span("check_alert"))
            })
            .buffer_unordered(self.cfg.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut report = TickReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    async fn process_record(&self, record: AlertRecord, now: DateTime<Utc>) -> RecordOutcome {
        annotate_token(&record.token_id);
        let token_id = record.token_id.as_str();

        let fetched = warn_if_slow(
            "fetch_latest_price",
            SLOW_FETCH,
            timeout(self.cfg.fetch_timeout, self.source.fetch_latest_price(token_id)),
        )
        .await;

        let price = match fetched {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => {
                warn!(error = %e, ticker = %record.ticker, "price fetch failed, skipping this cycle");
                return RecordOutcome::FetchFailed;
            }
            Err(_) => {
                warn!(
                    ticker = %record.ticker,
                    timeout_ms = self.cfg.fetch_timeout.as_millis() as u64,
                    "price fetch timed out, skipping this cycle"
                );
                return RecordOutcome::FetchFailed;
            }
        };

        debug!(ticker = %record.ticker, price, "price observed");

        // Re-read through the registry: the alert may have been removed or
        // re-registered since the snapshot was taken.
        let Observed {
            record: current,
            revision,
        } = match self.registry.observe(token_id, price).await {
            Ok(Some(observed)) => observed,
            Ok(None) => {
                debug!("alert removed during tick");
                return RecordOutcome::Vanished;
            }
            Err(e) => {
                error!(error = %e, "failed to record observed price");
                return RecordOutcome::PersistenceFailed;
            }
        };

        match evaluate(&current, price, &self.cfg, now) {
            Evaluation::OutOfBand => RecordOutcome::OutOfBand,
            Evaluation::Suppressed => {
                debug!(
                    ticker = %current.ticker,
                    last_alert_at = ?current.last_alert_at,
                    "in band but suppressed"
                );
                RecordOutcome::Suppressed
            }
            Evaluation::Fire => self.fire(&current, revision, price, now).await,
        }
    }

    async fn fire(
        &self,
        record: &AlertRecord,
        revision: Revision,
        price: f64,
        now: DateTime<Utc>,
    ) -> RecordOutcome {
        let event = AlertEvent::new(record, price, now);

        if let Err(e) = self.notifier.notify(&event).await {
            warn!(error = %e, ticker = %record.ticker, "alert delivery failed, will retry");
            return RecordOutcome::DeliveryFailed;
        }

        // Only the registration that was evaluated gets the fire time; a
        // replacement made while delivering starts unfired.
        match self
            .registry
            .record_fire(&record.token_id, revision, price, now)
            .await
        {
            Ok(Some(_)) => {
                info!(
                    ticker = %record.ticker,
                    price,
                    target = record.target_price,
                    deviation_pct = format_args!("{:+.2}", event.deviation_pct),
                    "alert fired"
                );
                RecordOutcome::Fired
            }
            Ok(None) => {
                info!(
                    ticker = %record.ticker,
                    "alert sent, but it was replaced or removed during delivery"
                );
                RecordOutcome::Fired
            }
            Err(e) => {
                error!(error = %e, ticker = %record.ticker, "alert sent but fire time not persisted");
                RecordOutcome::PersistenceFailed
            }
        }
    }
}
