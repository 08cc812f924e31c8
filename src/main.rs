pub mod config;
pub mod consumption;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::AppConfig;
use consumption::handlers;
use consumption::{
    AccountStatusRequest, AllowancePolicy, BeveragePurchase, CachedPolicyStore, ConsumptionAccount,
    ConsumptionLedger, ConsumptionStatus, LedgerMetrics, MetricsSnapshot, OpenAccountRequest,
    PeriodicResetSweep, PgAccountStore, PgCatalogStore, PgPolicyStore, PgPurchaseStore,
    PurchaseOutcome, PurchaseRequest, PurchaseResponse, PurchaseService, PurchaseStats,
    ScanRequest, UpdatePolicyRequest, UserStats,
};
use error::ErrorResponse;
use models::Beverage;
use query::{Pagination, PurchaseHistory};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::process_purchase,
        handlers::scan_credential,
        handlers::vendor_purchases,
        handlers::vendor_stats,
        handlers::list_beverages,
        handlers::open_account,
        handlers::consumption_status,
        handlers::user_purchases,
        handlers::user_stats,
        handlers::get_daily_limit,
        handlers::update_daily_limit,
        handlers::set_account_status,
        handlers::ledger_metrics,
    ),
    components(
        schemas(
            PurchaseRequest, PurchaseResponse, PurchaseOutcome, BeveragePurchase,
            ScanRequest, ConsumptionStatus, ConsumptionAccount, OpenAccountRequest,
            AccountStatusRequest, AllowancePolicy, UpdatePolicyRequest, Beverage,
            PurchaseStats, UserStats, MetricsSnapshot, PurchaseHistory, Pagination, ErrorResponse
        )
    ),
    tags(
        (name = "vendors", description = "Point-of-sale purchase checks"),
        (name = "catalog", description = "Beverage catalog"),
        (name = "accounts", description = "Account registration"),
        (name = "users", description = "User allowance and history"),
        (name = "admin", description = "Allowance policy and account administration")
    ),
    info(
        title = "AlcoSecure API",
        version = "1.0.0",
        description = "Daily pure-alcohol allowance enforcement for licensed vendors"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PurchaseService>,
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS and request tracing
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Vendor routes
        .route("/api/vendors/purchase", post(handlers::process_purchase))
        .route("/api/vendors/scan", post(handlers::scan_credential))
        .route("/api/vendors/:vendor_ref/purchases", get(handlers::vendor_purchases))
        .route("/api/vendors/:vendor_ref/stats", get(handlers::vendor_stats))
        // Catalog and registration
        .route("/api/beverages", get(handlers::list_beverages))
        .route("/api/accounts", post(handlers::open_account))
        // User routes
        .route("/api/users/:user_ref/consumption", get(handlers::consumption_status))
        .route("/api/users/:user_ref/purchases", get(handlers::user_purchases))
        .route("/api/users/:user_ref/stats", get(handlers::user_stats))
        // Admin routes
        .route(
            "/api/admin/config/daily-limit",
            get(handlers::get_daily_limit).put(handlers::update_daily_limit),
        )
        .route("/api/admin/accounts/:user_ref/status", put(handlers::set_account_status))
        .route("/api/admin/metrics", get(handlers::ledger_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // RUST_LOG controls verbosity, defaulting to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("AlcoSecure API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");
    tracing::info!(
        "Default allowance {}g per {}h window, sweep every {}s",
        config.default_daily_limit,
        config.window_hours,
        config.sweep_interval.as_secs()
    );

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let metrics = LedgerMetrics::new();
    let accounts = Arc::new(PgAccountStore::new(db_pool.clone()));
    let purchases = Arc::new(PgPurchaseStore::new(db_pool.clone()));
    let policies = Arc::new(CachedPolicyStore::with_metrics(
        Arc::new(PgPolicyStore::new(db_pool.clone(), config.default_policy())),
        config.policy_cache_ttl,
        metrics.clone(),
    ));
    let ledger = Arc::new(ConsumptionLedger::new(
        accounts.clone(),
        purchases.clone(),
        metrics.clone(),
    ));

    // Background reset of accounts whose window elapsed without a scan
    let sweep = PeriodicResetSweep::new(ledger.clone(), policies.clone(), metrics.clone())
        .with_interval(config.sweep_interval)
        .spawn();

    let service = Arc::new(PurchaseService::new(
        Arc::new(PgCatalogStore::new(db_pool)),
        policies,
        accounts,
        purchases,
        ledger,
        metrics,
    ));

    // Create the application router
    let app = create_router(AppState { service });

    // Start the Axum server
    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("AlcoSecure API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");

    sweep.abort();
}
