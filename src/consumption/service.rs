// Purchase Service
//
// Orchestrates one purchase from request to audit record, plus the read and
// admin operations around it. Business rules live in the calculator,
// decision engine and ledger; this layer sequences them.

use chrono::{DateTime, NaiveTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::consumption::calculator::PureAlcoholCalculator;
use crate::consumption::decision::LimitDecisionEngine;
use crate::consumption::error::{LedgerError, LedgerResult};
use crate::consumption::ledger::ConsumptionLedger;
use crate::consumption::metrics::{LedgerMetrics, MetricsSnapshot};
use crate::consumption::models::{
    AccountStatusRequest, AllowancePolicy, BeveragePurchase, ConsumptionAccount,
    ConsumptionStatus, OpenAccountRequest, PurchaseOutcome, PurchaseRequest, PurchaseResponse,
    PurchaseStats, ScanRequest, UpdatePolicyRequest, UserStats,
};
use crate::consumption::repository::{
    AccountStore, CatalogStore, PolicyStore, PurchaseScope, PurchaseStore,
};
use crate::consumption::window::ConsumptionWindowPolicy;
use crate::models::Beverage;
use crate::query::{HistoryPage, Page};

/// Attempts at finding a free generated user reference
const MAX_REF_ATTEMPTS: usize = 5;

pub struct PurchaseService {
    catalog: Arc<dyn CatalogStore>,
    policies: Arc<dyn PolicyStore>,
    accounts: Arc<dyn AccountStore>,
    purchases: Arc<dyn PurchaseStore>,
    ledger: Arc<ConsumptionLedger>,
    metrics: LedgerMetrics,
}

impl PurchaseService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        policies: Arc<dyn PolicyStore>,
        accounts: Arc<dyn AccountStore>,
        purchases: Arc<dyn PurchaseStore>,
        ledger: Arc<ConsumptionLedger>,
        metrics: LedgerMetrics,
    ) -> Self {
        Self {
            catalog,
            policies,
            accounts,
            purchases,
            ledger,
            metrics,
        }
    }

    /// Process one purchase attempt.
    ///
    /// Approved and limit-rejected attempts both return `Ok` and both leave
    /// exactly one audit record. Every `Err` returned before the record is
    /// appended leaves no trace.
    pub async fn process_purchase(
        &self,
        request: PurchaseRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<PurchaseResponse> {
        request.validate()?;

        let beverage = self.active_beverage(request.beverage_ref).await?;
        let _timer = self.metrics.start_decision();

        let guard = self.ledger.lock_existing(&request.user_ref).await?;
        let policy = self.policies.get_allowance_policy().await?;
        let mut account = self
            .ledger
            .prepare_for_decision(&guard, policy.window_hours, now)
            .await?;

        let grams = PureAlcoholCalculator::compute(request.volume_ml, beverage.strength_percent);
        let total_price = PureAlcoholCalculator::total_price(request.volume_ml, beverage.price_per_ml)
            .ok_or_else(|| {
                warn!(
                    volume_ml = %request.volume_ml,
                    price_per_ml = %beverage.price_per_ml,
                    "Purchase price out of range"
                );
                LedgerError::InvalidRequest(format!(
                    "price of {}ml of {} is out of range",
                    request.volume_ml, beverage.name
                ))
            })?;
        let decision =
            LimitDecisionEngine::decide(account.consumed_grams, grams, policy.daily_limit_grams);

        let purchase = BeveragePurchase {
            id: Uuid::new_v4(),
            user_ref: request.user_ref,
            vendor_ref: request.vendor_ref,
            beverage_ref: beverage.id,
            volume_ml: request.volume_ml,
            strength_percent: beverage.strength_percent,
            pure_alcohol_grams: grams,
            price_per_ml: beverage.price_per_ml,
            total_price,
            outcome: if decision.allowed {
                PurchaseOutcome::Approved
            } else {
                PurchaseOutcome::Rejected
            },
            rejection_reason: decision.reason.clone(),
            consumed_before_purchase: account.consumed_grams,
            limit_at_purchase: policy.daily_limit_grams,
            created_at: now,
        };

        self.ledger
            .record_purchase(&guard, &purchase, &mut account)
            .await?;

        Ok(PurchaseResponse {
            purchase_id: purchase.id,
            outcome: purchase.outcome,
            pure_alcohol_grams: purchase.pure_alcohol_grams,
            remaining_grams: decision.remaining_grams,
            reason: decision.reason,
            consumed_before_purchase: purchase.consumed_before_purchase,
            limit_at_purchase: purchase.limit_at_purchase,
            total_price: purchase.total_price,
        })
    }

    /// Consumption status for a credential presented at a vendor.
    /// Deactivated accounts are refused, as at purchase time.
    pub async fn scan(&self, request: ScanRequest, now: DateTime<Utc>) -> LedgerResult<ConsumptionStatus> {
        request.validate()?;
        let policy = self.policies.get_allowance_policy().await?;
        self.ledger.scan_status(&request.user_ref, &policy, now).await
    }

    pub async fn consumption_status(
        &self,
        user_ref: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<ConsumptionStatus> {
        let policy = self.policies.get_allowance_policy().await?;
        self.ledger.status_for(user_ref, &policy, now).await
    }

    pub async fn user_purchases(
        &self,
        user_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>> {
        if self.accounts.load_account(user_ref).await?.is_none() {
            return Err(LedgerError::UnknownAccount(user_ref.to_string()));
        }
        self.purchases.purchases_for_user(user_ref, page).await
    }

    pub async fn vendor_purchases(
        &self,
        vendor_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>> {
        self.purchases.purchases_for_vendor(vendor_ref, page).await
    }

    /// Purchase counts for a registered user plus their current window total.
    ///
    /// Read-only: an elapsed window is reported as zero but not reset.
    pub async fn user_stats(&self, user_ref: &str, now: DateTime<Utc>) -> LedgerResult<UserStats> {
        let account = self
            .accounts
            .load_account(user_ref)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(user_ref.to_string()))?;
        let policy = self.policies.get_allowance_policy().await?;

        let consumed_grams =
            if ConsumptionWindowPolicy::is_stale(account.window_start, policy.window_hours, now) {
                Decimal::ZERO
            } else {
                account.consumed_grams
            };

        Ok(UserStats {
            purchases: self.purchase_stats(PurchaseScope::User(user_ref), now).await?,
            user_ref: account.user_ref,
            consumed_grams,
        })
    }

    /// Purchase counts for a vendor; an unknown vendor has all-zero counts
    pub async fn vendor_stats(&self, vendor_ref: &str, now: DateTime<Utc>) -> LedgerResult<PurchaseStats> {
        self.purchase_stats(PurchaseScope::Vendor(vendor_ref), now).await
    }

    async fn purchase_stats(
        &self,
        scope: PurchaseScope<'_>,
        now: DateTime<Utc>,
    ) -> LedgerResult<PurchaseStats> {
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let all = self.purchases.count_by_outcome(scope, None).await?;
        let today = self.purchases.count_by_outcome(scope, Some(midnight)).await?;
        Ok(PurchaseStats::new(all, today.total()))
    }

    pub async fn allowance_policy(&self) -> LedgerResult<AllowancePolicy> {
        self.policies.get_allowance_policy().await
    }

    /// Replace the allowance; omitted window hours keep their current value
    pub async fn update_allowance_policy(
        &self,
        request: UpdatePolicyRequest,
    ) -> LedgerResult<AllowancePolicy> {
        request.validate()?;

        let current = self.policies.get_allowance_policy().await?;
        let policy = AllowancePolicy {
            daily_limit_grams: request.daily_limit_grams,
            window_hours: request.window_hours.unwrap_or(current.window_hours),
            updated_by: request.updated_by,
            updated_at: Utc::now(),
        };

        let updated = self.policies.update_allowance_policy(&policy).await?;
        info!(
            daily_limit_grams = %updated.daily_limit_grams,
            window_hours = updated.window_hours,
            updated_by = ?updated.updated_by,
            "Allowance policy updated"
        );
        Ok(updated)
    }

    /// Open an account, generating an `ETH` reference when none is supplied
    pub async fn open_account(
        &self,
        request: OpenAccountRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<ConsumptionAccount> {
        request.validate()?;

        if let Some(user_ref) = request.user_ref {
            return self.ledger.open_account(user_ref.trim(), now).await;
        }

        for _ in 0..MAX_REF_ATTEMPTS {
            let candidate = generate_user_ref();
            match self.ledger.open_account(&candidate, now).await {
                Err(LedgerError::AccountExists(_)) => {
                    debug!(user_ref = %candidate, "Generated reference taken, retrying");
                }
                result => return result,
            }
        }

        Err(LedgerError::Persistence(
            "could not allocate a free user reference".to_string(),
        ))
    }

    pub async fn set_account_status(
        &self,
        user_ref: &str,
        request: AccountStatusRequest,
    ) -> LedgerResult<ConsumptionAccount> {
        self.ledger
            .set_account_active(user_ref, request.is_active)
            .await
    }

    pub async fn list_beverages(&self) -> LedgerResult<Vec<Beverage>> {
        self.catalog.list_active_beverages().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn active_beverage(&self, beverage_ref: Uuid) -> LedgerResult<Beverage> {
        let beverage = self
            .catalog
            .get_beverage(beverage_ref)
            .await?
            .ok_or(LedgerError::UnknownBeverage(beverage_ref))?;

        if !beverage.is_active {
            return Err(LedgerError::InactiveBeverage(beverage_ref));
        }
        Ok(beverage)
    }
}

/// `ETH` followed by six random digits
fn generate_user_ref() -> String {
    format!("ETH{:06}", rand::thread_rng().gen_range(0..1_000_000))
}
