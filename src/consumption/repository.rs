// Store boundary for the consumption core
//
// The ledger and service only see these traits. PostgreSQL implementations
// live here; in-memory implementations are in `memory.rs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::consumption::error::{LedgerError, LedgerResult};
use crate::consumption::models::{
    AllowancePolicy, BeveragePurchase, ConsumptionAccount, OutcomeCounts,
};
use crate::models::Beverage;
use crate::query::{HistoryPage, Page};

/// Per-user consumption accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Returns `None` for an unknown user reference
    async fn load_account(&self, user_ref: &str) -> LedgerResult<Option<ConsumptionAccount>>;

    /// Overwrite the stored state of an existing account
    async fn save_account(&self, account: &ConsumptionAccount) -> LedgerResult<()>;

    /// Insert a new account; `AccountExists` if the reference is taken
    async fn create_account(&self, account: &ConsumptionAccount) -> LedgerResult<()>;

    /// Accounts with a non-zero counter, candidates for a window reset
    async fn list_consuming_accounts(&self) -> LedgerResult<Vec<ConsumptionAccount>>;
}

/// Allowance policy singleton
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_allowance_policy(&self) -> LedgerResult<AllowancePolicy>;

    async fn update_allowance_policy(&self, policy: &AllowancePolicy) -> LedgerResult<AllowancePolicy>;
}

/// Whose purchases a history or statistics query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseScope<'a> {
    User(&'a str),
    Vendor(&'a str),
}

impl<'a> PurchaseScope<'a> {
    fn column(&self) -> &'static str {
        match self {
            PurchaseScope::User(_) => "user_ref",
            PurchaseScope::Vendor(_) => "vendor_ref",
        }
    }

    pub fn reference(&self) -> &'a str {
        match self {
            PurchaseScope::User(reference) | PurchaseScope::Vendor(reference) => *reference,
        }
    }

    /// True if `purchase` falls inside this scope
    pub fn covers(&self, purchase: &BeveragePurchase) -> bool {
        match self {
            PurchaseScope::User(user_ref) => purchase.user_ref == *user_ref,
            PurchaseScope::Vendor(vendor_ref) => purchase.vendor_ref == *vendor_ref,
        }
    }
}

/// Append-only purchase audit trail
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn append_purchase(&self, purchase: &BeveragePurchase) -> LedgerResult<()>;

    /// Newest first
    async fn purchases_for_user(
        &self,
        user_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>>;

    /// Newest first
    async fn purchases_for_vendor(
        &self,
        vendor_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>>;

    /// Approved and rejected attempts in `scope`, optionally only those
    /// created at or after `since`
    async fn count_by_outcome(
        &self,
        scope: PurchaseScope<'_>,
        since: Option<DateTime<Utc>>,
    ) -> LedgerResult<OutcomeCounts>;
}

/// Read-only view of the beverage catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_beverage(&self, beverage_ref: Uuid) -> LedgerResult<Option<Beverage>>;

    async fn list_active_beverages(&self) -> LedgerResult<Vec<Beverage>>;
}

const ACCOUNT_COLUMNS: &str = "user_ref, consumed_grams, spent_amount, window_start, is_active";

const PURCHASE_COLUMNS: &str = "id, user_ref, vendor_ref, beverage_ref, volume_ml, strength_percent, \
     pure_alcohol_grams, price_per_ml, total_price, outcome, rejection_reason, \
     consumed_before_purchase, limit_at_purchase, created_at";

/// PostgreSQL account store
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Create a new PgAccountStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn load_account(&self, user_ref: &str) -> LedgerResult<Option<ConsumptionAccount>> {
        let account = sqlx::query_as::<_, ConsumptionAccount>(&format!(
            "SELECT {} FROM consumption_accounts WHERE user_ref = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(user_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn save_account(&self, account: &ConsumptionAccount) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE consumption_accounts
            SET consumed_grams = $2,
                spent_amount = $3,
                window_start = $4,
                is_active = $5,
                updated_at = NOW()
            WHERE user_ref = $1
            "#,
        )
        .bind(&account.user_ref)
        .bind(account.consumed_grams)
        .bind(account.spent_amount)
        .bind(account.window_start)
        .bind(account.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::UnknownAccount(account.user_ref.clone()));
        }
        Ok(())
    }

    async fn create_account(&self, account: &ConsumptionAccount) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO consumption_accounts (user_ref, consumed_grams, spent_amount, window_start, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_ref) DO NOTHING
            "#,
        )
        .bind(&account.user_ref)
        .bind(account.consumed_grams)
        .bind(account.spent_amount)
        .bind(account.window_start)
        .bind(account.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountExists(account.user_ref.clone()));
        }
        Ok(())
    }

    async fn list_consuming_accounts(&self) -> LedgerResult<Vec<ConsumptionAccount>> {
        let accounts = sqlx::query_as::<_, ConsumptionAccount>(&format!(
            "SELECT {} FROM consumption_accounts WHERE consumed_grams > 0 ORDER BY window_start",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }
}

/// PostgreSQL policy store
///
/// Reads create the default row on first access.
#[derive(Clone)]
pub struct PgPolicyStore {
    pool: PgPool,
    default_policy: AllowancePolicy,
}

impl PgPolicyStore {
    pub fn new(pool: PgPool, default_policy: AllowancePolicy) -> Self {
        Self {
            pool,
            default_policy,
        }
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn get_allowance_policy(&self) -> LedgerResult<AllowancePolicy> {
        let policy = sqlx::query_as::<_, AllowancePolicy>(
            r#"
            INSERT INTO allowance_policy (id, daily_limit_grams, window_hours, updated_at)
            VALUES (1, $1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET id = allowance_policy.id
            RETURNING daily_limit_grams, window_hours, updated_by, updated_at
            "#,
        )
        .bind(self.default_policy.daily_limit_grams)
        .bind(self.default_policy.window_hours)
        .fetch_one(&self.pool)
        .await?;

        Ok(policy)
    }

    async fn update_allowance_policy(&self, policy: &AllowancePolicy) -> LedgerResult<AllowancePolicy> {
        policy.validate().map_err(LedgerError::InvalidPolicy)?;

        let updated = sqlx::query_as::<_, AllowancePolicy>(
            r#"
            INSERT INTO allowance_policy (id, daily_limit_grams, window_hours, updated_by, updated_at)
            VALUES (1, $1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE
            SET daily_limit_grams = EXCLUDED.daily_limit_grams,
                window_hours = EXCLUDED.window_hours,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            RETURNING daily_limit_grams, window_hours, updated_by, updated_at
            "#,
        )
        .bind(policy.daily_limit_grams)
        .bind(policy.window_hours)
        .bind(&policy.updated_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }
}

/// PostgreSQL purchase store
#[derive(Clone)]
pub struct PgPurchaseStore {
    pool: PgPool,
}

impl PgPurchaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn page_by(
        &self,
        scope: PurchaseScope<'_>,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>> {
        // column is one of two fixed identifiers, never caller input
        let column = scope.column();
        let value = scope.reference();
        let items = sqlx::query_as::<_, BeveragePurchase>(&format!(
            r#"
            SELECT {columns}
            FROM beverage_purchases
            WHERE {column} = $1 AND ($2::text IS NULL OR outcome = $2)
            ORDER BY created_at DESC
            LIMIT {limit} OFFSET {offset}
            "#,
            columns = PURCHASE_COLUMNS,
            column = column,
            limit = page.limit,
            offset = page.offset(),
        ))
        .bind(value)
        .bind(page.outcome.map(|o| o.as_str()))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM beverage_purchases WHERE {} = $1 AND ($2::text IS NULL OR outcome = $2)",
            column
        ))
        .bind(value)
        .bind(page.outcome.map(|o| o.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
        })
    }
}

#[async_trait]
impl PurchaseStore for PgPurchaseStore {
    async fn append_purchase(&self, purchase: &BeveragePurchase) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO beverage_purchases (
                id, user_ref, vendor_ref, beverage_ref, volume_ml, strength_percent,
                pure_alcohol_grams, price_per_ml, total_price, outcome, rejection_reason,
                consumed_before_purchase, limit_at_purchase, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(purchase.id)
        .bind(&purchase.user_ref)
        .bind(&purchase.vendor_ref)
        .bind(purchase.beverage_ref)
        .bind(purchase.volume_ml)
        .bind(purchase.strength_percent)
        .bind(purchase.pure_alcohol_grams)
        .bind(purchase.price_per_ml)
        .bind(purchase.total_price)
        .bind(purchase.outcome)
        .bind(&purchase.rejection_reason)
        .bind(purchase.consumed_before_purchase)
        .bind(purchase.limit_at_purchase)
        .bind(purchase.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purchases_for_user(
        &self,
        user_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>> {
        self.page_by(PurchaseScope::User(user_ref), page).await
    }

    async fn purchases_for_vendor(
        &self,
        vendor_ref: &str,
        page: &HistoryPage,
    ) -> LedgerResult<Page<BeveragePurchase>> {
        self.page_by(PurchaseScope::Vendor(vendor_ref), page).await
    }

    async fn count_by_outcome(
        &self,
        scope: PurchaseScope<'_>,
        since: Option<DateTime<Utc>>,
    ) -> LedgerResult<OutcomeCounts> {
        let (approved, rejected): (i64, i64) = sqlx::query_as(&format!(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE outcome = 'approved'),
                COUNT(*) FILTER (WHERE outcome = 'rejected')
            FROM beverage_purchases
            WHERE {} = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)
            "#,
            scope.column()
        ))
        .bind(scope.reference())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(OutcomeCounts {
            approved: approved.max(0) as u64,
            rejected: rejected.max(0) as u64,
        })
    }
}

/// PostgreSQL catalog reader
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_beverage(&self, beverage_ref: Uuid) -> LedgerResult<Option<Beverage>> {
        let beverage = sqlx::query_as::<_, Beverage>(
            r#"
            SELECT id, name, category, strength_percent, price_per_ml, is_active, created_at
            FROM beverages
            WHERE id = $1
            "#,
        )
        .bind(beverage_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(beverage)
    }

    async fn list_active_beverages(&self) -> LedgerResult<Vec<Beverage>> {
        let beverages = sqlx::query_as::<_, Beverage>(
            r#"
            SELECT id, name, category, strength_percent, price_per_ml, is_active, created_at
            FROM beverages
            WHERE is_active = true
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Loaded {} active beverages", beverages.len());
        Ok(beverages)
    }
}
