//! In-memory store implementations.
//!
//! Used by the test suites and for running the service without a database.
//! The account and purchase stores can be told to fail writes so partial
//! persistence paths can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::consumption::error::{LedgerError, LedgerResult};
use crate::consumption::models::{
    AllowancePolicy, BeveragePurchase, ConsumptionAccount, OutcomeCounts, PurchaseOutcome,
};
use crate::consumption::repository::{
    AccountStore, CatalogStore, PolicyStore, PurchaseScope, PurchaseStore,
};
use crate::models::Beverage;
use crate::query::{HistoryPage, Page};

/// Account store backed by a map
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, ConsumptionAccount>>,
    fail_saves: AtomicBool,
    fail_listing: AtomicBool,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save_account` fail
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `list_consuming_accounts` fail
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Insert or replace an account without going through the ledger
    pub async fn put(&self, account: ConsumptionAccount) {
        self.accounts
            .write()
            .await
            .insert(account.user_ref.clone(), account);
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn load_account(&self, user_ref: &str) -> LedgerResult<Option<ConsumptionAccount>> {
        Ok(self.accounts.read().await.get(user_ref).cloned())
    }

    async fn save_account(&self, account: &ConsumptionAccount) -> LedgerResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(LedgerError::Persistence("account store unavailable".to_string()));
        }

        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&account.user_ref) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(LedgerError::UnknownAccount(account.user_ref.clone())),
        }
    }

    async fn create_account(&self, account: &ConsumptionAccount) -> LedgerResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.user_ref) {
            return Err(LedgerError::AccountExists(account.user_ref.clone()));
        }
        accounts.insert(account.user_ref.clone(), account.clone());
        Ok(())
    }

    async fn list_consuming_accounts(&self) -> LedgerResult<Vec<ConsumptionAccount>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(LedgerError::Persistence("account store unavailable".to_string()));
        }

        let mut accounts: Vec<ConsumptionAccount> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|account| account.consumed_grams > rust_decimal::Decimal::ZERO)
            .cloned()
            .collect();
        accounts.sort_by_key(|account| account.window_start);
        Ok(accounts)
    }
}

/// Policy store holding a single value
pub struct InMemoryPolicyStore {
    policy: RwLock<AllowancePolicy>,
}

impl InMemoryPolicyStore {
    pub fn new(policy: AllowancePolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get_allowance_policy(&self) -> LedgerResult<AllowancePolicy> {
        Ok(self.policy.read().await.clone())
    }

    async fn update_allowance_policy(&self, policy: &AllowancePolicy) -> LedgerResult<AllowancePolicy> {
        policy.validate().map_err(LedgerError::InvalidPolicy)?;

        let mut stored = self.policy.write().await;
        *stored = AllowancePolicy {
            updated_at: chrono::Utc::now(),
            ..policy.clone()
        };
        Ok(stored.clone())
    }
}

/// Append-only purchase log kept in insertion order
#[derive(Default)]
pub struct InMemoryPurchaseStore {
    purchases: RwLock<Vec<BeveragePurchase>>,
    fail_appends: AtomicBool,
}

impl InMemoryPurchaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `append_purchase` fail
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Every record in insertion order
    pub async fn all(&self) -> Vec<BeveragePurchase> {
        self.purchases.read().await.clone()
    }

    async fn page_where<F>(&self, page: &HistoryPage, matches: F) -> Page<BeveragePurchase>
    where
        F: Fn(&BeveragePurchase) -> bool,
    {
        let purchases = self.purchases.read().await;
        let filtered: Vec<&BeveragePurchase> = purchases
            .iter()
            .rev()
            .filter(|p| matches(p))
            .filter(|p| page.outcome.map_or(true, |outcome| p.outcome == outcome))
            .collect();

        Page {
            total: filtered.len() as u64,
            items: filtered
                .into_iter()
                .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
                .take(page.limit as usize)
                .cloned()
                .collect(),
        }
    }
}

#[async_trait]
impl PurchaseStore for InMemoryPurchaseStore {
    async fn append_purchase(&self, purchase: &BeveragePurchase) -> LedgerResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::Persistence("purchase store unavailable".to_string()));
        }
        self.purchases.write().await.push(purchase.clone());
        Ok(())
    }

    async fn purchases_for_user(
        &self,
        user_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>> {
        let scope = PurchaseScope::User(user_ref);
        Ok(self.page_where(page, |p| scope.covers(p)).await)
    }

    async fn purchases_for_vendor(
        &self,
        vendor_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>> {
        let scope = PurchaseScope::Vendor(vendor_ref);
        Ok(self.page_where(page, |p| scope.covers(p)).await)
    }

    async fn count_by_outcome(
        &self,
        scope: PurchaseScope<'_>,
        since: Option<DateTime<Utc>>,
    ) -> LedgerResult<OutcomeCounts> {
        let purchases = self.purchases.read().await;
        let mut counts = OutcomeCounts::default();
        for purchase in purchases
            .iter()
            .filter(|p| scope.covers(p))
            .filter(|p| since.map_or(true, |since| p.created_at >= since))
        {
            match purchase.outcome {
                PurchaseOutcome::Approved => counts.approved += 1,
                PurchaseOutcome::Rejected => counts.rejected += 1,
            }
        }
        Ok(counts)
    }
}

/// Fixed catalog
#[derive(Default)]
pub struct InMemoryCatalogStore {
    beverages: RwLock<HashMap<Uuid, Beverage>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, beverage: Beverage) {
        self.beverages.write().await.insert(beverage.id, beverage);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_beverage(&self, beverage_ref: Uuid) -> LedgerResult<Option<Beverage>> {
        Ok(self.beverages.read().await.get(&beverage_ref).cloned())
    }

    async fn list_active_beverages(&self) -> LedgerResult<Vec<Beverage>> {
        let mut beverages: Vec<Beverage> = self
            .beverages
            .read()
            .await
            .values()
            .filter(|b| b.is_active)
            .cloned()
            .collect();
        beverages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(beverages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_then_duplicate_account() {
        let store = InMemoryAccountStore::new();
        let account = ConsumptionAccount::open("ETH200001", Utc::now());

        store.create_account(&account).await.unwrap();
        let err = store.create_account(&account).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountExists(_)));
    }

    #[tokio::test]
    async fn test_save_unknown_account_fails() {
        let store = InMemoryAccountStore::new();
        let account = ConsumptionAccount::open("ETH200002", Utc::now());

        let err = store.save_account(&account).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount(_)));
    }

    #[tokio::test]
    async fn test_listing_skips_idle_accounts() {
        let store = InMemoryAccountStore::new();
        let idle = ConsumptionAccount::open("ETH200003", Utc::now());
        let mut drinking = ConsumptionAccount::open("ETH200004", Utc::now());
        drinking.consumed_grams = dec!(9.5);
        store.put(idle).await;
        store.put(drinking).await;

        let listed = store.list_consuming_accounts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_ref, "ETH200004");
    }

    #[tokio::test]
    async fn test_policy_update_rejects_non_positive_limit() {
        let store = InMemoryPolicyStore::new(AllowancePolicy::new(dec!(60), 20));
        let err = store
            .update_allowance_policy(&AllowancePolicy::new(dec!(-1), 20))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPolicy(_)));
        assert_eq!(
            store.get_allowance_policy().await.unwrap().daily_limit_grams,
            dec!(60)
        );
    }

    #[tokio::test]
    async fn test_catalog_lists_only_active() {
        let store = InMemoryCatalogStore::new();
        let mut retired = Beverage::new("Retired Gin", "Gin", dec!(40), dec!(1));
        retired.is_active = false;
        store.put(retired).await;
        store.put(Beverage::new("Lager", "Beer", dec!(5), dec!(0.3))).await;

        let active = store.list_active_beverages().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Lager");
    }

    fn purchase(user_ref: &str, vendor_ref: &str, outcome: PurchaseOutcome, at: DateTime<Utc>) -> BeveragePurchase {
        BeveragePurchase {
            id: Uuid::new_v4(),
            user_ref: user_ref.to_string(),
            vendor_ref: vendor_ref.to_string(),
            beverage_ref: Uuid::new_v4(),
            volume_ml: dec!(330),
            strength_percent: dec!(5),
            pure_alcohol_grams: dec!(13.02),
            price_per_ml: dec!(0.4),
            total_price: dec!(132),
            outcome,
            rejection_reason: None,
            consumed_before_purchase: dec!(0),
            limit_at_purchase: dec!(60),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_count_by_outcome_scopes_and_since() {
        let store = InMemoryPurchaseStore::new();
        let now = Utc::now();
        let yesterday = now - chrono::Duration::days(1);
        for p in [
            purchase("ETH200005", "VEN-1", PurchaseOutcome::Approved, yesterday),
            purchase("ETH200005", "VEN-1", PurchaseOutcome::Approved, now),
            purchase("ETH200005", "VEN-2", PurchaseOutcome::Rejected, now),
            purchase("ETH200006", "VEN-1", PurchaseOutcome::Rejected, now),
        ] {
            store.append_purchase(&p).await.unwrap();
        }

        let user = store
            .count_by_outcome(PurchaseScope::User("ETH200005"), None)
            .await
            .unwrap();
        assert_eq!(user, OutcomeCounts { approved: 2, rejected: 1 });

        let vendor_today = store
            .count_by_outcome(PurchaseScope::Vendor("VEN-1"), Some(now))
            .await
            .unwrap();
        assert_eq!(vendor_today, OutcomeCounts { approved: 1, rejected: 1 });

        let nobody = store
            .count_by_outcome(PurchaseScope::Vendor("VEN-9"), None)
            .await
            .unwrap();
        assert_eq!(nobody.total(), 0);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let store = InMemoryPurchaseStore::new();
        store
            .append_purchase(&purchase("ETH200005", "VEN-1", PurchaseOutcome::Approved, Utc::now()))
            .await
            .unwrap();

        let page = HistoryPage {
            page: u32::MAX,
            limit: 100,
            outcome: None,
        };
        let result = store.purchases_for_user("ETH200005", &page).await.unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total, 1);
    }
}
