//! Periodic reset of stale consumption windows.
//!
//! Accounts are reset lazily when scanned, but a user who never comes back
//! would keep a non-zero counter forever. The sweep clears those on a fixed
//! cadence using the same staleness rule as the purchase path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::error::LedgerResult;
use super::ledger::ConsumptionLedger;
use super::metrics::LedgerMetrics;
use super::repository::PolicyStore;

/// Default sweep cadence (hourly)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Background task resetting accounts whose window has elapsed.
pub struct PeriodicResetSweep {
    ledger: Arc<ConsumptionLedger>,
    policies: Arc<dyn PolicyStore>,
    metrics: LedgerMetrics,
    interval: Duration,
}

impl PeriodicResetSweep {
    pub fn new(
        ledger: Arc<ConsumptionLedger>,
        policies: Arc<dyn PolicyStore>,
        metrics: LedgerMetrics,
    ) -> Self {
        Self {
            ledger,
            policies,
            metrics,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set custom sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the sweep as a background task.
    ///
    /// The first pass runs immediately. Returns a handle that can be used to
    /// abort the task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match self.run_once().await {
                    Ok(count) if count > 0 => {
                        info!(reset = count, "Reset sweep cleared stale accounts");
                        self.metrics.log_summary();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.metrics.record_sweep_failure();
                        warn!(error = %e, "Reset sweep failed, retrying next tick");
                    }
                }
            }
        })
    }

    /// Run one pass against the current policy (for testing or manual invocation).
    pub async fn run_once(&self) -> LedgerResult<usize> {
        let policy = self.policies.get_allowance_policy().await?;
        self.ledger
            .reset_stale_accounts(policy.window_hours, Utc::now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::memory::{
        InMemoryAccountStore, InMemoryPolicyStore, InMemoryPurchaseStore,
    };
    use crate::consumption::models::{AllowancePolicy, ConsumptionAccount};
    use crate::consumption::repository::AccountStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        accounts: Arc<InMemoryAccountStore>,
        metrics: LedgerMetrics,
        sweep: PeriodicResetSweep,
    }

    fn fixture(window_hours: i32) -> Fixture {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let metrics = LedgerMetrics::new();
        let ledger = Arc::new(ConsumptionLedger::new(
            accounts.clone(),
            Arc::new(InMemoryPurchaseStore::new()),
            metrics.clone(),
        ));
        let policies = Arc::new(InMemoryPolicyStore::new(AllowancePolicy::new(
            dec!(60),
            window_hours,
        )));
        Fixture {
            accounts,
            metrics: metrics.clone(),
            sweep: PeriodicResetSweep::new(ledger, policies, metrics),
        }
    }

    async fn put(f: &Fixture, user_ref: &str, consumed: Decimal, age_hours: i64) {
        let mut account =
            ConsumptionAccount::open(user_ref, Utc::now() - chrono::Duration::hours(age_hours));
        account.consumed_grams = consumed;
        f.accounts.put(account).await;
    }

    async fn consumed(f: &Fixture, user_ref: &str) -> Decimal {
        f.accounts
            .load_account(user_ref)
            .await
            .unwrap()
            .unwrap()
            .consumed_grams
    }

    #[tokio::test]
    async fn test_run_once_resets_only_stale_accounts() {
        let f = fixture(20);
        put(&f, "ETH000001", dec!(40), 21).await;
        put(&f, "ETH000002", dec!(40), 3).await;

        assert_eq!(f.sweep.run_once().await.unwrap(), 1);
        assert_eq!(consumed(&f, "ETH000001").await, Decimal::ZERO);
        assert_eq!(consumed(&f, "ETH000002").await, dec!(40));

        // Nothing left to do
        assert_eq!(f.sweep.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_once_uses_configured_window() {
        let f = fixture(4);
        put(&f, "ETH000002", dec!(12), 5).await;

        assert_eq!(f.sweep.run_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_custom_interval() {
        let f = fixture(20);
        let sweep = f.sweep.with_interval(Duration::from_secs(60));
        assert_eq!(sweep.interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_failed_tick_does_not_stop_later_ticks() {
        let f = fixture(20);
        put(&f, "ETH000001", dec!(40), 21).await;
        f.accounts.fail_listing(true);

        let accounts = f.accounts.clone();
        let metrics = f.metrics.clone();
        let handle = f.sweep.with_interval(Duration::from_millis(20)).spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(metrics.snapshot().sweep_failures >= 1);
        assert!(!handle.is_finished());

        accounts.fail_listing(false);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let account = accounts.load_account("ETH000001").await.unwrap().unwrap();
        assert_eq!(account.consumed_grams, Decimal::ZERO);

        handle.abort();
        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok());
    }
}
