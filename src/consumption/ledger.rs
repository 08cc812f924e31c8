// Consumption Ledger
//
// Owns the mutable per-user state: loading and resetting accounts, applying
// approved purchases and appending every attempt to the audit trail.
// All mutations of one account happen while holding that account's lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::consumption::error::{LedgerError, LedgerResult};
use crate::consumption::metrics::LedgerMetrics;
use crate::consumption::models::{
    AllowancePolicy, BeveragePurchase, ConsumptionAccount, ConsumptionStatus,
};
use crate::consumption::repository::{AccountStore, PurchaseStore};
use crate::consumption::window::ConsumptionWindowPolicy;

/// Exclusive hold on one account
///
/// Obtained from [`ConsumptionLedger::lock`]. Dropping it releases the account.
pub struct AccountGuard {
    user_ref: String,
    _guard: OwnedMutexGuard<()>,
}

impl AccountGuard {
    pub fn user_ref(&self) -> &str {
        &self.user_ref
    }
}

pub struct ConsumptionLedger {
    accounts: Arc<dyn AccountStore>,
    purchases: Arc<dyn PurchaseStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    metrics: LedgerMetrics,
}

impl ConsumptionLedger {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        purchases: Arc<dyn PurchaseStore>,
        metrics: LedgerMetrics,
    ) -> Self {
        Self {
            accounts,
            purchases,
            locks: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Wait for exclusive access to `user_ref`.
    ///
    /// Different users never contend. The guard is owned so it can be held
    /// across every store call of a purchase.
    pub async fn lock(&self, user_ref: &str) -> AccountGuard {
        let mutex = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(user_ref.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        AccountGuard {
            user_ref: user_ref.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Lock an account that is known to exist.
    ///
    /// Unknown references fail before a registry entry is created, so
    /// lookups of arbitrary references cannot grow the registry.
    pub async fn lock_existing(&self, user_ref: &str) -> LedgerResult<AccountGuard> {
        if self.accounts.load_account(user_ref).await?.is_none() {
            return Err(LedgerError::UnknownAccount(user_ref.to_string()));
        }
        Ok(self.lock(user_ref).await)
    }

    /// Load an active account and reset it first if its window has elapsed.
    ///
    /// A deactivated account is refused before anything is written. Calling
    /// this again within the same window does nothing further because a
    /// reset moves `window_start` to `now`.
    pub async fn prepare_for_decision(
        &self,
        guard: &AccountGuard,
        window_hours: i32,
        now: DateTime<Utc>,
    ) -> LedgerResult<ConsumptionAccount> {
        let mut account = self.load_locked(guard).await?;

        if !account.is_active {
            warn!(user_ref = %account.user_ref, "Deactivated account refused");
            return Err(LedgerError::InactiveAccount(account.user_ref));
        }

        self.roll_window(&mut account, window_hours, now).await?;
        Ok(account)
    }

    async fn load_locked(&self, guard: &AccountGuard) -> LedgerResult<ConsumptionAccount> {
        let user_ref = guard.user_ref();
        self.accounts
            .load_account(user_ref)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(user_ref.to_string()))
    }

    async fn roll_window(
        &self,
        account: &mut ConsumptionAccount,
        window_hours: i32,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if !ConsumptionWindowPolicy::is_stale(account.window_start, window_hours, now) {
            return Ok(());
        }

        let previous = account.consumed_grams;
        let mut reset = account.clone();
        reset.reset_window(now);
        self.accounts.save_account(&reset).await?;
        *account = reset;

        self.metrics.record_window_reset();
        info!(
            user_ref = %account.user_ref,
            previous_grams = %previous,
            "Consumption window elapsed, account reset"
        );
        Ok(())
    }

    /// Append `purchase` to the audit trail and, if approved, apply it to
    /// `account`.
    ///
    /// `account` is only updated in memory once the store has accepted it.
    pub async fn record_purchase(
        &self,
        guard: &AccountGuard,
        purchase: &BeveragePurchase,
        account: &mut ConsumptionAccount,
    ) -> LedgerResult<()> {
        debug_assert_eq!(guard.user_ref(), account.user_ref);
        debug_assert_eq!(purchase.user_ref, account.user_ref);

        self.purchases.append_purchase(purchase).await?;

        if !purchase.is_approved() {
            self.metrics.record_rejected();
            info!(
                purchase_id = %purchase.id,
                user_ref = %purchase.user_ref,
                grams = %purchase.pure_alcohol_grams,
                "Purchase rejected"
            );
            return Ok(());
        }

        let mut updated = account.clone();
        updated.consumed_grams += purchase.pure_alcohol_grams;
        updated.spent_amount += purchase.total_price;

        if let Err(e) = self.accounts.save_account(&updated).await {
            self.metrics.record_inconsistency();
            error!(
                purchase_id = %purchase.id,
                user_ref = %purchase.user_ref,
                grams = %purchase.pure_alcohol_grams,
                error = %e,
                "Approved purchase recorded but account increment was not saved"
            );
            return Err(LedgerError::Inconsistent {
                purchase_id: purchase.id,
                reason: e.to_string(),
            });
        }

        *account = updated;
        self.metrics.record_approved();
        info!(
            purchase_id = %purchase.id,
            user_ref = %purchase.user_ref,
            grams = %purchase.pure_alcohol_grams,
            consumed = %account.consumed_grams,
            "Purchase approved"
        );
        Ok(())
    }

    /// Register a new account with an empty window starting at `now`
    pub async fn open_account(
        &self,
        user_ref: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<ConsumptionAccount> {
        let account = ConsumptionAccount::open(user_ref, now);
        self.accounts.create_account(&account).await?;
        info!(user_ref = %user_ref, "Consumption account opened");
        Ok(account)
    }

    pub async fn set_account_active(
        &self,
        user_ref: &str,
        active: bool,
    ) -> LedgerResult<ConsumptionAccount> {
        let guard = self.lock_existing(user_ref).await?;
        let mut account = self.load_locked(&guard).await?;

        if account.is_active != active {
            account.is_active = active;
            self.accounts.save_account(&account).await?;
            info!(user_ref = %user_ref, active, "Account status changed");
        }

        Ok(account)
    }

    /// Current allowance position, resetting a stale window first.
    ///
    /// Deactivated accounts are reported as stored, without a reset.
    pub async fn status_for(
        &self,
        user_ref: &str,
        policy: &AllowancePolicy,
        now: DateTime<Utc>,
    ) -> LedgerResult<ConsumptionStatus> {
        let guard = self.lock_existing(user_ref).await?;
        let mut account = self.load_locked(&guard).await?;
        if account.is_active {
            self.roll_window(&mut account, policy.window_hours, now).await?;
        }
        Ok(ConsumptionStatus::from_account(&account, policy))
    }

    /// Allowance position for a credential presented at a vendor.
    ///
    /// Same checks as a purchase: deactivated accounts are refused.
    pub async fn scan_status(
        &self,
        user_ref: &str,
        policy: &AllowancePolicy,
        now: DateTime<Utc>,
    ) -> LedgerResult<ConsumptionStatus> {
        let guard = self.lock_existing(user_ref).await?;
        let account = self
            .prepare_for_decision(&guard, policy.window_hours, now)
            .await?;
        Ok(ConsumptionStatus::from_account(&account, policy))
    }

    /// Reset every account whose window has elapsed and that has consumption
    /// to clear. Returns the number of accounts reset.
    ///
    /// Each candidate is reloaded and re-checked under its lock, so a
    /// purchase that landed after the listing is never wiped. Failures on a
    /// single account are logged and skipped.
    pub async fn reset_stale_accounts(
        &self,
        window_hours: i32,
        now: DateTime<Utc>,
    ) -> LedgerResult<usize> {
        let candidates = self.accounts.list_consuming_accounts().await?;
        let mut reset = 0;

        for candidate in candidates {
            if !ConsumptionWindowPolicy::is_stale(candidate.window_start, window_hours, now) {
                continue;
            }

            let _guard = self.lock(&candidate.user_ref).await;
            match self.reset_if_stale(&candidate.user_ref, window_hours, now).await {
                Ok(true) => reset += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        user_ref = %candidate.user_ref,
                        error = %e,
                        "Failed to reset stale account, skipping"
                    );
                }
            }
        }

        self.metrics.record_sweep_resets(reset);
        self.prune_idle_locks().await;
        Ok(reset)
    }

    async fn reset_if_stale(
        &self,
        user_ref: &str,
        window_hours: i32,
        now: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        let Some(mut account) = self.accounts.load_account(user_ref).await? else {
            return Ok(false);
        };

        if account.consumed_grams.is_zero()
            || !ConsumptionWindowPolicy::is_stale(account.window_start, window_hours, now)
        {
            return Ok(false);
        }

        account.reset_window(now);
        self.accounts.save_account(&account).await?;
        debug!(user_ref = %user_ref, "Sweep reset account");
        Ok(true)
    }

    /// Drop registry entries nobody holds or waits on
    pub async fn prune_idle_locks(&self) {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        if locks.len() < before {
            debug!(pruned = before - locks.len(), "Pruned idle account locks");
        }
    }

    #[cfg(test)]
    pub(crate) async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::memory::{InMemoryAccountStore, InMemoryPurchaseStore};
    use crate::consumption::models::PurchaseOutcome;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct Fixture {
        accounts: Arc<InMemoryAccountStore>,
        purchases: Arc<InMemoryPurchaseStore>,
        metrics: LedgerMetrics,
        ledger: ConsumptionLedger,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let purchases = Arc::new(InMemoryPurchaseStore::new());
        let metrics = LedgerMetrics::new();
        let ledger = ConsumptionLedger::new(accounts.clone(), purchases.clone(), metrics.clone());
        Fixture {
            accounts,
            purchases,
            metrics,
            ledger,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-02T21:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn account(user_ref: &str, consumed: Decimal, window_start: DateTime<Utc>) -> ConsumptionAccount {
        ConsumptionAccount {
            consumed_grams: consumed,
            spent_amount: consumed * dec!(10),
            window_start,
            ..ConsumptionAccount::open(user_ref, window_start)
        }
    }

    fn purchase(user_ref: &str, grams: Decimal, outcome: PurchaseOutcome) -> BeveragePurchase {
        BeveragePurchase {
            id: Uuid::new_v4(),
            user_ref: user_ref.to_string(),
            vendor_ref: "VEN-1".to_string(),
            beverage_ref: Uuid::new_v4(),
            volume_ml: dec!(500),
            strength_percent: dec!(5),
            pure_alcohol_grams: grams,
            price_per_ml: dec!(0.4),
            total_price: dec!(200),
            outcome,
            rejection_reason: match outcome {
                PurchaseOutcome::Approved => None,
                PurchaseOutcome::Rejected => Some("over".to_string()),
            },
            consumed_before_purchase: Decimal::ZERO,
            limit_at_purchase: dec!(60),
            created_at: now(),
        }
    }

    #[tokio::test]
    async fn test_prepare_unknown_account() {
        let f = fixture();
        let guard = f.ledger.lock("ETH000404").await;
        let err = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount(ref u) if u == "ETH000404"));
    }

    #[tokio::test]
    async fn test_prepare_keeps_fresh_window() {
        let f = fixture();
        let start = now() - Duration::hours(19) - Duration::minutes(59);
        f.accounts.put(account("ETH000001", dec!(30), start)).await;

        let guard = f.ledger.lock("ETH000001").await;
        let prepared = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap();

        assert_eq!(prepared.consumed_grams, dec!(30));
        assert_eq!(prepared.window_start, start);
        assert_eq!(f.metrics.snapshot().window_resets, 0);
    }

    #[tokio::test]
    async fn test_prepare_resets_stale_window_once() {
        let f = fixture();
        f.accounts
            .put(account("ETH000001", dec!(30), now() - Duration::hours(20)))
            .await;

        let guard = f.ledger.lock("ETH000001").await;
        let first = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap();
        let second = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap();

        assert_eq!(first.consumed_grams, Decimal::ZERO);
        assert_eq!(first.spent_amount, Decimal::ZERO);
        assert_eq!(first.window_start, now());
        assert_eq!(first, second);
        assert_eq!(f.metrics.snapshot().window_resets, 1);

        let stored = f.accounts.load_account("ETH000001").await.unwrap().unwrap();
        assert_eq!(stored.consumed_grams, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_record_approved_increments_account() {
        let f = fixture();
        f.accounts.put(account("ETH000001", dec!(10), now())).await;
        let guard = f.ledger.lock("ETH000001").await;
        let mut acc = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap();

        let p = purchase("ETH000001", dec!(19.73), PurchaseOutcome::Approved);
        f.ledger.record_purchase(&guard, &p, &mut acc).await.unwrap();

        assert_eq!(acc.consumed_grams, dec!(29.73));
        assert_eq!(acc.spent_amount, dec!(300));
        let stored = f.accounts.load_account("ETH000001").await.unwrap().unwrap();
        assert_eq!(stored, acc);
        assert_eq!(f.purchases.all().await.len(), 1);
        assert_eq!(f.metrics.snapshot().approved, 1);
    }

    #[tokio::test]
    async fn test_record_rejected_leaves_account_untouched() {
        let f = fixture();
        f.accounts.put(account("ETH000001", dec!(55), now())).await;
        let guard = f.ledger.lock("ETH000001").await;
        let mut acc = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap();
        let before = acc.clone();

        let p = purchase("ETH000001", dec!(19.73), PurchaseOutcome::Rejected);
        f.ledger.record_purchase(&guard, &p, &mut acc).await.unwrap();

        assert_eq!(acc, before);
        let stored = f.accounts.load_account("ETH000001").await.unwrap().unwrap();
        assert_eq!(stored.consumed_grams, dec!(55));
        assert_eq!(f.purchases.all().await, vec![p]);
        assert_eq!(f.metrics.snapshot().rejected, 1);
    }

    #[tokio::test]
    async fn test_failed_append_has_no_effect() {
        let f = fixture();
        f.accounts.put(account("ETH000001", dec!(10), now())).await;
        f.purchases.fail_appends(true);
        let guard = f.ledger.lock("ETH000001").await;
        let mut acc = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap();

        let p = purchase("ETH000001", dec!(5), PurchaseOutcome::Approved);
        let err = f.ledger.record_purchase(&guard, &p, &mut acc).await.unwrap_err();

        assert!(matches!(err, LedgerError::Persistence(_)));
        assert_eq!(acc.consumed_grams, dec!(10));
        assert!(f.purchases.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_after_append_is_inconsistent() {
        let f = fixture();
        f.accounts.put(account("ETH000001", dec!(10), now())).await;
        let guard = f.ledger.lock("ETH000001").await;
        let mut acc = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap();
        f.accounts.fail_saves(true);

        let p = purchase("ETH000001", dec!(5), PurchaseOutcome::Approved);
        let err = f.ledger.record_purchase(&guard, &p, &mut acc).await.unwrap_err();

        assert!(err.is_retriable());
        match err {
            LedgerError::Inconsistent { purchase_id, .. } => assert_eq!(purchase_id, p.id),
            other => panic!("expected Inconsistent, got {:?}", other),
        }

        // The audit record survives even though the increment was lost
        assert!(f.purchases.all().await.iter().any(|stored| stored.id == p.id));
        assert_eq!(acc.consumed_grams, dec!(10));
        assert_eq!(f.metrics.snapshot().inconsistencies, 1);
    }

    #[tokio::test]
    async fn test_open_account_conflict() {
        let f = fixture();
        let opened = f.ledger.open_account("ETH123456", now()).await.unwrap();
        assert_eq!(opened.consumed_grams, Decimal::ZERO);
        assert_eq!(opened.window_start, now());

        let err = f.ledger.open_account("ETH123456", now()).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountExists(_)));
    }

    #[tokio::test]
    async fn test_set_account_active() {
        let f = fixture();
        f.ledger.open_account("ETH123456", now()).await.unwrap();

        let updated = f.ledger.set_account_active("ETH123456", false).await.unwrap();
        assert!(!updated.is_active);
        let stored = f.accounts.load_account("ETH123456").await.unwrap().unwrap();
        assert!(!stored.is_active);

        let err = f.ledger.set_account_active("ETH999999", true).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount(_)));
    }

    #[tokio::test]
    async fn test_status_for_resets_on_scan() {
        let f = fixture();
        f.accounts
            .put(account("ETH000001", dec!(42), now() - Duration::hours(21)))
            .await;
        let policy = AllowancePolicy::new(dec!(60), 20);

        let status = f.ledger.status_for("ETH000001", &policy, now()).await.unwrap();
        assert_eq!(status.consumed_grams, Decimal::ZERO);
        assert_eq!(status.remaining_grams, dec!(60));
        assert_eq!(status.window_start, now());
    }

    #[tokio::test]
    async fn test_prepare_refuses_inactive_account_untouched() {
        let f = fixture();
        let mut inactive = account("ETH000002", dec!(40), now() - Duration::hours(30));
        inactive.is_active = false;
        f.accounts.put(inactive.clone()).await;

        let guard = f.ledger.lock("ETH000002").await;
        let err = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap_err();

        assert!(matches!(err, LedgerError::InactiveAccount(ref u) if u == "ETH000002"));
        let stored = f.accounts.load_account("ETH000002").await.unwrap().unwrap();
        assert_eq!(stored, inactive);
        assert_eq!(f.metrics.snapshot().window_resets, 0);
    }

    #[tokio::test]
    async fn test_failed_reset_save_leaves_caller_copy_unchanged() {
        let f = fixture();
        let start = now() - Duration::hours(20);
        f.accounts.put(account("ETH000001", dec!(30), start)).await;
        f.accounts.fail_saves(true);

        let guard = f.ledger.lock("ETH000001").await;
        let err = f.ledger.prepare_for_decision(&guard, 20, now()).await.unwrap_err();

        assert!(err.is_retriable());
        let stored = f.accounts.load_account("ETH000001").await.unwrap().unwrap();
        assert_eq!(stored.consumed_grams, dec!(30));
        assert_eq!(stored.window_start, start);
    }

    #[tokio::test]
    async fn test_status_for_reports_inactive_as_stored() {
        let f = fixture();
        let mut inactive = account("ETH000002", dec!(40), now() - Duration::hours(30));
        inactive.is_active = false;
        f.accounts.put(inactive.clone()).await;
        let policy = AllowancePolicy::new(dec!(60), 20);

        let status = f.ledger.status_for("ETH000002", &policy, now()).await.unwrap();
        assert!(!status.is_active);
        assert_eq!(status.consumed_grams, dec!(40));

        let stored = f.accounts.load_account("ETH000002").await.unwrap().unwrap();
        assert_eq!(stored, inactive);
    }

    #[tokio::test]
    async fn test_scan_status_refuses_inactive() {
        let f = fixture();
        let mut inactive = account("ETH000002", dec!(40), now() - Duration::hours(30));
        inactive.is_active = false;
        f.accounts.put(inactive.clone()).await;
        let policy = AllowancePolicy::new(dec!(60), 20);

        let err = f.ledger.scan_status("ETH000002", &policy, now()).await.unwrap_err();
        assert!(matches!(err, LedgerError::InactiveAccount(_)));
        let stored = f.accounts.load_account("ETH000002").await.unwrap().unwrap();
        assert_eq!(stored, inactive);

        f.accounts.put(account("ETH000001", dec!(12), now())).await;
        let status = f.ledger.scan_status("ETH000001", &policy, now()).await.unwrap();
        assert_eq!(status.remaining_grams, dec!(48));
    }

    #[tokio::test]
    async fn test_unknown_reference_leaves_no_lock_entry() {
        let f = fixture();
        let policy = AllowancePolicy::new(dec!(60), 20);

        for user_ref in ["ETH000404", "ETH000405", "nobody"] {
            let err = f.ledger.status_for(user_ref, &policy, now()).await.unwrap_err();
            assert!(matches!(err, LedgerError::UnknownAccount(_)));
        }
        assert!(f.ledger.lock_existing("ETH000406").await.is_err());
        assert_eq!(f.ledger.lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_reset_stale_accounts_only_touches_stale_consumers() {
        let f = fixture();
        f.accounts
            .put(account("ETH000001", dec!(30), now() - Duration::hours(20)))
            .await;
        f.accounts
            .put(account("ETH000002", dec!(30), now() - Duration::hours(2)))
            .await;
        f.accounts
            .put(account("ETH000003", Decimal::ZERO, now() - Duration::hours(48)))
            .await;

        let reset = f.ledger.reset_stale_accounts(20, now()).await.unwrap();
        assert_eq!(reset, 1);

        let stale = f.accounts.load_account("ETH000001").await.unwrap().unwrap();
        assert_eq!(stale.consumed_grams, Decimal::ZERO);
        assert_eq!(stale.window_start, now());

        let fresh = f.accounts.load_account("ETH000002").await.unwrap().unwrap();
        assert_eq!(fresh.consumed_grams, dec!(30));

        let idle = f.accounts.load_account("ETH000003").await.unwrap().unwrap();
        assert_eq!(idle.window_start, now() - Duration::hours(48));

        assert_eq!(f.metrics.snapshot().sweep_resets, 1);
    }

    #[tokio::test]
    async fn test_reset_stale_accounts_skips_failed_saves() {
        let f = fixture();
        f.accounts
            .put(account("ETH000001", dec!(30), now() - Duration::hours(20)))
            .await;
        f.accounts.fail_saves(true);

        let reset = f.ledger.reset_stale_accounts(20, now()).await.unwrap();
        assert_eq!(reset, 0);
    }

    #[tokio::test]
    async fn test_reset_propagates_listing_failure() {
        let f = fixture();
        f.accounts.fail_listing(true);
        let err = f.ledger.reset_stale_accounts(20, now()).await.unwrap_err();
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let f = fixture();
        {
            let _a = f.ledger.lock("ETH000001").await;
            let _b = f.ledger.lock("ETH000002").await;
            assert_eq!(f.ledger.lock_count().await, 2);
        }
        let held = f.ledger.lock("ETH000003").await;
        f.ledger.prune_idle_locks().await;
        assert_eq!(f.ledger.lock_count().await, 1);
        drop(held);
    }

    #[tokio::test]
    async fn test_lock_serializes_same_account() {
        let f = Arc::new(fixture());
        let guard = f.ledger.lock("ETH000001").await;

        let f2 = f.clone();
        let waiter = tokio::spawn(async move {
            let _g = f2.ledger.lock("ETH000001").await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // Another account is not blocked
        let _other = f.ledger.lock("ETH000002").await;

        drop(guard);
        waiter.await.unwrap();
    }
}
