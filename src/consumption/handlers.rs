// HTTP handlers for vendor, user and admin endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::consumption::{
    AccountStatusRequest, AllowancePolicy, ConsumptionAccount, ConsumptionStatus, MetricsSnapshot,
    OpenAccountRequest, PurchaseRequest, PurchaseResponse, PurchaseStats, ScanRequest,
    UpdatePolicyRequest, UserStats,
};
use crate::error::ApiError;
use crate::models::Beverage;
use crate::query::{HistoryQuery, Paginated, PurchaseHistory, QueryValidator};

/// Handler for POST /api/vendors/purchase
/// Checks a purchase against the daily allowance and records it
///
/// A limit rejection is a normal outcome and returns 200.
#[utoipa::path(
    post,
    path = "/api/vendors/purchase",
    request_body = PurchaseRequest,
    responses(
        (status = 200, description = "Purchase processed (approved or rejected)", body = PurchaseResponse),
        (status = 400, description = "Invalid request or deactivated resource", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown account or beverage", body = crate::error::ErrorResponse),
        (status = 500, description = "Storage failure, retriable", body = crate::error::ErrorResponse)
    ),
    tag = "vendors"
)]
pub async fn process_purchase(
    State(state): State<crate::AppState>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    tracing::debug!(
        "Purchase request: user {} vendor {} beverage {} volume {}ml",
        request.user_ref,
        request.vendor_ref,
        request.beverage_ref,
        request.volume_ml
    );

    let response = state.service.process_purchase(request, Utc::now()).await?;
    Ok(Json(response))
}

/// Handler for POST /api/vendors/scan
/// Current allowance for a scanned credential
#[utoipa::path(
    post,
    path = "/api/vendors/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Consumption status", body = ConsumptionStatus),
        (status = 400, description = "Deactivated account", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown account", body = crate::error::ErrorResponse)
    ),
    tag = "vendors"
)]
pub async fn scan_credential(
    State(state): State<crate::AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ConsumptionStatus>, ApiError> {
    let status = state.service.scan(request, Utc::now()).await?;
    Ok(Json(status))
}

/// Handler for GET /api/vendors/{vendor_ref}/purchases
#[utoipa::path(
    get,
    path = "/api/vendors/{vendor_ref}/purchases",
    params(
        ("vendor_ref" = String, Path, description = "Vendor reference"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Purchases by this vendor, newest first", body = PurchaseHistory),
        (status = 400, description = "Invalid paging parameters", body = crate::error::ErrorResponse)
    ),
    tag = "vendors"
)]
pub async fn vendor_purchases(
    State(state): State<crate::AppState>,
    Path(vendor_ref): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PurchaseHistory>, ApiError> {
    let page = QueryValidator::validate(query)?;
    let purchases = state.service.vendor_purchases(&vendor_ref, &page).await?;
    Ok(Json(Paginated::new(purchases, &page)))
}

/// Handler for GET /api/vendors/{vendor_ref}/stats
#[utoipa::path(
    get,
    path = "/api/vendors/{vendor_ref}/stats",
    params(("vendor_ref" = String, Path, description = "Vendor reference")),
    responses(
        (status = 200, description = "Purchase counts and approval rate for this vendor", body = PurchaseStats)
    ),
    tag = "vendors"
)]
pub async fn vendor_stats(
    State(state): State<crate::AppState>,
    Path(vendor_ref): Path<String>,
) -> Result<Json<PurchaseStats>, ApiError> {
    let stats = state.service.vendor_stats(&vendor_ref, Utc::now()).await?;
    Ok(Json(stats))
}

/// Handler for GET /api/beverages
#[utoipa::path(
    get,
    path = "/api/beverages",
    responses(
        (status = 200, description = "Active beverages", body = Vec<Beverage>)
    ),
    tag = "catalog"
)]
pub async fn list_beverages(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<Beverage>>, ApiError> {
    let beverages = state.service.list_beverages().await?;
    tracing::debug!("Retrieved {} beverages", beverages.len());
    Ok(Json(beverages))
}

/// Handler for POST /api/accounts
/// Opens a consumption account; a reference is generated when none is given
#[utoipa::path(
    post,
    path = "/api/accounts",
    request_body = OpenAccountRequest,
    responses(
        (status = 201, description = "Account opened", body = ConsumptionAccount),
        (status = 409, description = "Account already exists", body = crate::error::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn open_account(
    State(state): State<crate::AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<ConsumptionAccount>), ApiError> {
    let account = state.service.open_account(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Handler for GET /api/users/{user_ref}/consumption
#[utoipa::path(
    get,
    path = "/api/users/{user_ref}/consumption",
    params(("user_ref" = String, Path, description = "User reference")),
    responses(
        (status = 200, description = "Remaining allowance", body = ConsumptionStatus),
        (status = 404, description = "Unknown account", body = crate::error::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn consumption_status(
    State(state): State<crate::AppState>,
    Path(user_ref): Path<String>,
) -> Result<Json<ConsumptionStatus>, ApiError> {
    let status = state
        .service
        .consumption_status(&user_ref, Utc::now())
        .await?;
    Ok(Json(status))
}

/// Handler for GET /api/users/{user_ref}/purchases
#[utoipa::path(
    get,
    path = "/api/users/{user_ref}/purchases",
    params(
        ("user_ref" = String, Path, description = "User reference"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Purchases by this user, newest first", body = PurchaseHistory),
        (status = 400, description = "Invalid paging parameters", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown account", body = crate::error::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn user_purchases(
    State(state): State<crate::AppState>,
    Path(user_ref): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PurchaseHistory>, ApiError> {
    let page = QueryValidator::validate(query)?;
    let purchases = state.service.user_purchases(&user_ref, &page).await?;
    Ok(Json(Paginated::new(purchases, &page)))
}

/// Handler for GET /api/users/{user_ref}/stats
#[utoipa::path(
    get,
    path = "/api/users/{user_ref}/stats",
    params(("user_ref" = String, Path, description = "User reference")),
    responses(
        (status = 200, description = "Purchase counts and current window total", body = UserStats),
        (status = 404, description = "Unknown account", body = crate::error::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn user_stats(
    State(state): State<crate::AppState>,
    Path(user_ref): Path<String>,
) -> Result<Json<UserStats>, ApiError> {
    let stats = state.service.user_stats(&user_ref, Utc::now()).await?;
    Ok(Json(stats))
}

/// Handler for GET /api/admin/config/daily-limit
#[utoipa::path(
    get,
    path = "/api/admin/config/daily-limit",
    responses(
        (status = 200, description = "Current allowance policy", body = AllowancePolicy)
    ),
    tag = "admin"
)]
pub async fn get_daily_limit(
    State(state): State<crate::AppState>,
) -> Result<Json<AllowancePolicy>, ApiError> {
    Ok(Json(state.service.allowance_policy().await?))
}

/// Handler for PUT /api/admin/config/daily-limit
#[utoipa::path(
    put,
    path = "/api/admin/config/daily-limit",
    request_body = UpdatePolicyRequest,
    responses(
        (status = 200, description = "Policy updated", body = AllowancePolicy),
        (status = 400, description = "Non-positive limit or window", body = crate::error::ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn update_daily_limit(
    State(state): State<crate::AppState>,
    Json(request): Json<UpdatePolicyRequest>,
) -> Result<Json<AllowancePolicy>, ApiError> {
    let policy = state.service.update_allowance_policy(request).await?;
    Ok(Json(policy))
}

/// Handler for PUT /api/admin/accounts/{user_ref}/status
#[utoipa::path(
    put,
    path = "/api/admin/accounts/{user_ref}/status",
    params(("user_ref" = String, Path, description = "User reference")),
    request_body = AccountStatusRequest,
    responses(
        (status = 200, description = "Account updated", body = ConsumptionAccount),
        (status = 404, description = "Unknown account", body = crate::error::ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn set_account_status(
    State(state): State<crate::AppState>,
    Path(user_ref): Path<String>,
    Json(request): Json<AccountStatusRequest>,
) -> Result<Json<ConsumptionAccount>, ApiError> {
    let account = state.service.set_account_status(&user_ref, request).await?;
    Ok(Json(account))
}

/// Handler for GET /api/admin/metrics
#[utoipa::path(
    get,
    path = "/api/admin/metrics",
    responses(
        (status = 200, description = "Ledger counters", body = MetricsSnapshot)
    ),
    tag = "admin"
)]
pub async fn ledger_metrics(State(state): State<crate::AppState>) -> Json<MetricsSnapshot> {
    Json(state.service.metrics())
}
