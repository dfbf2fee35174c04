//! Reconciler - Polls providers for purchases stuck in `pending`.
//!
//! Webhooks can be lost. On every tick the reconciler picks pending rows older
//! than the grace period, asks the owning provider for the payment's status
//! and feeds the answer through the same settle path a webhook takes.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | Time between passes |
//! | `grace_period` | 120s | Minimum age of a pending row before polling |
//! | `batch_size` | 50 | Max rows per pass |
//! | `call_timeout` | 5s | Deadline for one provider call |
//! | `max_attempts` | 3 | Calls per row per pass |
//! | `initial_backoff` | 500ms | Delay before the second attempt, doubled after |
//! | `concurrency` | 4 | Rows polled in parallel |
//!
//! A row whose provider cannot be reached within the attempt budget stays
//! `pending` and is retried on a later pass. Each polled row moves to the back
//! of the queue, so a batch full of long-lived pending sessions still lets
//! newer rows through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::payment::{normalizer, PaymentProvider, Purchase, StatusReport};
use crate::ports::{GatewayError, PaymentStatusGateway, PurchaseLedger};

use super::settle_payment::{is_integrity_failure, SettlePaymentHandler};

/// Reconciler tuning.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub interval: Duration,
    pub grace_period: Duration,
    pub batch_size: u32,
    pub call_timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub concurrency: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            grace_period: Duration::from_secs(120),
            batch_size: 50,
            call_timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            concurrency: 4,
        }
    }
}

impl ReconcilerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max_attempts: u32) -> Self {
        self.initial_backoff = initial;
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay after failed attempt `attempt` (1-based).
    fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Stale pending rows picked up.
    pub examined: usize,
    /// Rows the provider answer moved out of `pending`.
    pub advanced: usize,
    /// Provider still reports the payment as in progress.
    pub unchanged: usize,
    /// Provider unreachable, unknown payment, or storage error. Retried next pass.
    pub deferred: usize,
    /// Provider answer contradicted the row; alert raised.
    pub integrity_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Advanced,
    Unchanged,
    Deferred,
    IntegrityFailure,
}

impl ReconcileReport {
    fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Advanced => self.advanced += 1,
            RowOutcome::Unchanged => self.unchanged += 1,
            RowOutcome::Deferred => self.deferred += 1,
            RowOutcome::IntegrityFailure => self.integrity_failures += 1,
        }
    }
}

pub struct Reconciler {
    ledger: Arc<dyn PurchaseLedger>,
    gateways: HashMap<PaymentProvider, Arc<dyn PaymentStatusGateway>>,
    settle: Arc<SettlePaymentHandler>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<dyn PurchaseLedger>,
        settle: Arc<SettlePaymentHandler>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            ledger,
            gateways: HashMap::new(),
            settle,
            config,
        }
    }

    /// Registers the status gateway for its provider.
    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentStatusGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run passes until the shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            grace_secs = self.config.grace_period.as_secs(),
            providers = ?self.gateways.keys().collect::<Vec<_>>(),
            "reconciler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("reconciler stopping");
                        return;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "reconciliation pass failed");
                    }
                }
            }
        }
    }

    /// One pass over the stale pending rows.
    pub async fn run_once(&self) -> Result<ReconcileReport, DomainError> {
        let cutoff = Timestamp::now().minus(self.config.grace_period);
        let stale = self
            .ledger
            .find_stale_pending(cutoff, self.config.batch_size)
            .await?;

        let mut report = ReconcileReport {
            examined: stale.len(),
            ..ReconcileReport::default()
        };
        if stale.is_empty() {
            return Ok(report);
        }

        let outcomes: Vec<RowOutcome> = stream::iter(stale)
            .map(|purchase| async move { self.reconcile_row(&purchase).await })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }

        tracing::info!(
            examined = report.examined,
            advanced = report.advanced,
            unchanged = report.unchanged,
            deferred = report.deferred,
            integrity_failures = report.integrity_failures,
            "reconciliation pass finished"
        );
        Ok(report)
    }

    async fn reconcile_row(&self, purchase: &Purchase) -> RowOutcome {
        let key = purchase.key();
        if let Err(e) = self.ledger.mark_polled(&purchase.id, Timestamp::now()).await {
            tracing::warn!(purchase_key = %key, error = %e, "could not record poll time");
        }
        let Some(gateway) = self.gateways.get(&purchase.provider) else {
            tracing::debug!(purchase_key = %key, "no status gateway for provider");
            return RowOutcome::Deferred;
        };

        let report = match self.fetch_with_retry(gateway.as_ref(), &purchase.external_event_id).await {
            Ok(report) => report,
            Err(GatewayError::NotFound(_)) => {
                tracing::warn!(purchase_key = %key, "provider does not know pending payment");
                return RowOutcome::Deferred;
            }
            Err(e) => {
                tracing::warn!(purchase_key = %key, error = %e, "status query gave up; row stays pending");
                return RowOutcome::Deferred;
            }
        };

        let event = normalizer::normalize_status_report(&report, purchase, Timestamp::now());
        match self.settle.settle(&event, "reconciler").await {
            Ok(outcome) if outcome.transitioned => RowOutcome::Advanced,
            Ok(_) => RowOutcome::Unchanged,
            Err(e) if is_integrity_failure(&e) => RowOutcome::IntegrityFailure,
            Err(e) => {
                tracing::warn!(purchase_key = %key, error = %e, "settling provider status failed");
                RowOutcome::Deferred
            }
        }
    }

    /// Calls the gateway with a per-call deadline, retrying transient failures
    /// with exponential backoff.
    async fn fetch_with_retry(
        &self,
        gateway: &dyn PaymentStatusGateway,
        external_id: &str,
    ) -> Result<StatusReport, GatewayError> {
        let mut attempt = 1;
        loop {
            let result = match time::timeout(self.config.call_timeout, gateway.fetch_status(external_id)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(self.config.call_timeout.as_millis() as u64)),
            };

            match result {
                Ok(report) => return Ok(report),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_after(attempt);
                    tracing::debug!(
                        external_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying status query"
                    );
                    time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.grace_period, Duration::from_secs(120));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn backoff_doubles() {
        let config = ReconcilerConfig::default().with_backoff(Duration::from_millis(100), 4);
        assert_eq!(config.backoff_after(1), Duration::from_millis(100));
        assert_eq!(config.backoff_after(2), Duration::from_millis(200));
        assert_eq!(config.backoff_after(3), Duration::from_millis(400));
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        let config = ReconcilerConfig::default().with_backoff(Duration::ZERO, 0);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = ReconcileReport::default();
        report.record(RowOutcome::Advanced);
        report.record(RowOutcome::Deferred);
        report.record(RowOutcome::Deferred);
        assert_eq!(report.advanced, 1);
        assert_eq!(report.deferred, 2);
    }
}
