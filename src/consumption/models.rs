use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Outcome of a single purchase attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOutcome {
    Approved,
    Rejected,
}

impl PurchaseOutcome {
    /// Convert outcome to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOutcome::Approved => "approved",
            PurchaseOutcome::Rejected => "rejected",
        }
    }

    /// Parse outcome from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "approved" => Ok(PurchaseOutcome::Approved),
            "rejected" => Ok(PurchaseOutcome::Rejected),
            _ => Err(format!("Invalid purchase outcome: {}", s)),
        }
    }
}

impl std::fmt::Display for PurchaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-user consumption counter, one per registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ConsumptionAccount {
    pub user_ref: String,
    pub consumed_grams: Decimal,
    pub spent_amount: Decimal,
    pub window_start: DateTime<Utc>,
    pub is_active: bool,
}

impl ConsumptionAccount {
    /// Fresh account with an empty window starting at `now`
    pub fn open(user_ref: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_ref: user_ref.into(),
            consumed_grams: Decimal::ZERO,
            spent_amount: Decimal::ZERO,
            window_start: now,
            is_active: true,
        }
    }

    /// Zero the counters and start a new window at `now`.
    /// `window_start` never moves backwards.
    pub(crate) fn reset_window(&mut self, now: DateTime<Utc>) {
        self.consumed_grams = Decimal::ZERO;
        self.spent_amount = Decimal::ZERO;
        if now > self.window_start {
            self.window_start = now;
        }
    }
}

/// System-wide allowance singleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AllowancePolicy {
    #[schema(example = "60")]
    pub daily_limit_grams: Decimal,
    #[schema(example = 20)]
    pub window_hours: i32,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AllowancePolicy {
    pub fn new(daily_limit_grams: Decimal, window_hours: i32) -> Self {
        Self {
            daily_limit_grams,
            window_hours,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    /// Both values must be strictly positive
    pub fn validate(&self) -> Result<(), String> {
        if self.daily_limit_grams <= Decimal::ZERO {
            return Err(format!(
                "daily_limit_grams must be positive, got {}",
                self.daily_limit_grams
            ));
        }
        if self.window_hours <= 0 {
            return Err(format!(
                "window_hours must be positive, got {}",
                self.window_hours
            ));
        }
        Ok(())
    }

    /// Length of the rolling window
    pub fn window(&self) -> Duration {
        Duration::hours(i64::from(self.window_hours))
    }
}

/// Immutable audit record, one per purchase attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BeveragePurchase {
    pub id: Uuid,
    #[schema(example = "ETH123456")]
    pub user_ref: String,
    pub vendor_ref: String,
    pub beverage_ref: Uuid,
    #[schema(example = "500")]
    pub volume_ml: Decimal,
    #[schema(example = "5")]
    pub strength_percent: Decimal,
    #[schema(example = "19.73")]
    pub pure_alcohol_grams: Decimal,
    pub price_per_ml: Decimal,
    pub total_price: Decimal,
    pub outcome: PurchaseOutcome,
    pub rejection_reason: Option<String>,
    pub consumed_before_purchase: Decimal,
    pub limit_at_purchase: Decimal,
    pub created_at: DateTime<Utc>,
}

impl BeveragePurchase {
    pub fn is_approved(&self) -> bool {
        self.outcome == PurchaseOutcome::Approved
    }
}

/// Request DTO presented by a vendor-facing caller
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseRequest {
    #[validate(length(min = 1, max = 64, message = "User ID is required"))]
    #[schema(example = "ETH123456")]
    pub user_ref: String,
    #[validate(length(min = 1, max = 64, message = "Vendor ID is required"))]
    #[schema(example = "VEN-0042")]
    pub vendor_ref: String,
    pub beverage_ref: Uuid,
    #[validate(custom = "crate::validation::validate_volume_ml")]
    #[schema(example = "500")]
    pub volume_ml: Decimal,
}

/// Response DTO for a processed purchase (approved or rejected)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseResponse {
    pub purchase_id: Uuid,
    pub outcome: PurchaseOutcome,
    pub pure_alcohol_grams: Decimal,
    pub remaining_grams: Decimal,
    pub reason: Option<String>,
    pub consumed_before_purchase: Decimal,
    pub limit_at_purchase: Decimal,
    pub total_price: Decimal,
}

/// Request DTO for a credential scan
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 64, message = "User ID is required"))]
    pub user_ref: String,
}

/// Request DTO for opening an account; the reference is generated when omitted
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct OpenAccountRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_ref: Option<String>,
}

/// Request DTO for activating or deactivating an account
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AccountStatusRequest {
    pub is_active: bool,
}

/// Request DTO for updating the allowance policy
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdatePolicyRequest {
    #[validate(custom = "crate::validation::validate_daily_limit")]
    #[schema(example = "60")]
    pub daily_limit_grams: Decimal,
    #[validate(range(min = 1, max = 168, message = "Window must be between 1 and 168 hours"))]
    pub window_hours: Option<i32>,
    #[validate(length(min = 1, max = 64))]
    pub updated_by: Option<String>,
}

/// Current allowance position of an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsumptionStatus {
    pub user_ref: String,
    pub is_active: bool,
    pub consumed_grams: Decimal,
    pub spent_amount: Decimal,
    pub daily_limit_grams: Decimal,
    pub remaining_grams: Decimal,
    /// Share of the allowance used, in percent with 2 decimal places
    pub percentage_used: Decimal,
    pub window_start: DateTime<Utc>,
    pub window_resets_at: DateTime<Utc>,
}

impl ConsumptionStatus {
    pub fn from_account(account: &ConsumptionAccount, policy: &AllowancePolicy) -> Self {
        let limit = policy.daily_limit_grams;
        let remaining = (limit - account.consumed_grams).max(Decimal::ZERO);
        let percentage_used = if limit > Decimal::ZERO {
            (account.consumed_grams / limit * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            user_ref: account.user_ref.clone(),
            is_active: account.is_active,
            consumed_grams: account.consumed_grams,
            spent_amount: account.spent_amount,
            daily_limit_grams: limit,
            remaining_grams: remaining,
            percentage_used,
            window_start: account.window_start,
            window_resets_at: account.window_start + policy.window(),
        }
    }
}

/// Approved and rejected attempt counts over some scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub approved: u64,
    pub rejected: u64,
}

impl OutcomeCounts {
    pub fn total(&self) -> u64 {
        self.approved + self.rejected
    }
}

/// Purchase statistics for one user or vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PurchaseStats {
    pub total: u64,
    pub approved: u64,
    pub rejected: u64,
    /// Attempts since midnight UTC
    pub today: u64,
    /// Approved share of all attempts, in percent with 2 decimal places
    #[schema(example = "87.50")]
    pub approval_rate: Decimal,
}

impl PurchaseStats {
    pub fn new(counts: OutcomeCounts, today: u64) -> Self {
        let total = counts.total();
        let approval_rate = if total == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(counts.approved) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
        };

        Self {
            total,
            approved: counts.approved,
            rejected: counts.rejected,
            today,
            approval_rate,
        }
    }
}

/// Purchase statistics of a user alongside their current window total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserStats {
    pub user_ref: String,
    /// Grams counted in the current window; zero once the window has elapsed
    pub consumed_grams: Decimal,
    pub purchases: PurchaseStats,
}
