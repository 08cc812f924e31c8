use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::consumption::{BeveragePurchase, PurchaseOutcome};

/// Default number of purchases per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on purchases per page
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters for purchase history endpoints
/// All fields are optional
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<u32>,
    /// Items per page (defaults to 20, max 100)
    pub limit: Option<u32>,
    /// Filter by outcome: "approved" or "rejected"
    pub status: Option<String>,
}

/// Validated paging and filter options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub page: u32,
    pub limit: u32,
    pub outcome: Option<PurchaseOutcome>,
}

impl Default for HistoryPage {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            outcome: None,
        }
    }
}

impl HistoryPage {
    /// Row offset for LIMIT/OFFSET queries
    ///
    /// Widened to `u64` so the largest page number cannot overflow.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Validation error type
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct QueryValidationError {
    pub message: String,
}

/// History query validator
pub struct QueryValidator;

impl QueryValidator {
    /// Validates and normalizes history parameters
    pub fn validate(params: HistoryQuery) -> Result<HistoryPage, QueryValidationError> {
        let page = params.page.unwrap_or(1);
        if page == 0 {
            return Err(QueryValidationError {
                message: "page must be a positive integer".to_string(),
            });
        }

        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(QueryValidationError {
                message: format!("limit must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }

        let outcome = match params.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(status) => Some(
                PurchaseOutcome::from_str(status)
                    .map_err(|message| QueryValidationError { message })?,
            ),
        };

        Ok(HistoryPage { page, limit, outcome })
    }
}

/// A slice of a larger result set
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Pagination metadata returned alongside a page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// Paged response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(PurchaseHistory = Paginated<BeveragePurchase>)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(page: Page<T>, request: &HistoryPage) -> Self {
        let limit = u64::from(request.limit);
        Self {
            data: page.items,
            pagination: Pagination {
                page: request.page,
                limit: request.limit,
                total: page.total,
                pages: page.total.div_ceil(limit),
            },
        }
    }
}
