mod auth;
mod db;
mod error;
mod rewards;
mod validation;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use rewards::{
    CouponRepository, LedgerRepository, RedemptionService, RewardEngine, RuleRepository,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        rewards::handlers::process_order_handler,
        rewards::handlers::loyalty_progress_handler,
        rewards::handlers::list_coupons_handler,
        rewards::handlers::quote_coupon_handler,
        rewards::handlers::redeem_coupon_handler,
        rewards::handlers::create_rule_handler,
        rewards::handlers::list_rules_handler,
        rewards::handlers::update_rule_handler,
        rewards::handlers::toggle_rule_handler,
        rewards::handlers::delete_rule_handler,
    ),
    components(
        schemas(
            rewards::models::RewardRule,
            rewards::models::CreateRewardRule,
            rewards::models::UpdateRewardRule,
            rewards::models::CouponStatus,
            rewards::models::OrderLineItem,
            rewards::models::ProcessOrderRequest,
            rewards::models::ProcessOrderResponse,
            rewards::models::CouponIssued,
            rewards::models::LineOutcome,
            rewards::models::EligibleCoupon,
            rewards::models::QuoteRequest,
            rewards::models::QuoteResponse,
            rewards::models::RedeemResponse,
            rewards::models::LoyaltyProgressEntry,
        )
    ),
    tags(
        (name = "rewards", description = "Order reward processing and loyalty progress"),
        (name = "coupons", description = "Coupon listing, quoting and redemption"),
        (name = "rules", description = "Admin reward rule catalog")
    ),
    info(
        title = "Canteen Rewards API",
        version = "1.0.0",
        description = "Loyalty reward and coupon issuance service for the canteen ordering platform",
        contact(
            name = "API Support",
            email = "support@canteen.app"
        )
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub rules: RuleRepository,
    pub ledger: LedgerRepository,
    pub engine: RewardEngine,
    pub redemption: RedemptionService,
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
fn create_router(db: PgPool) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let rules = RuleRepository::new(db.clone());
    let ledger = LedgerRepository::new(db.clone());
    let coupons = CouponRepository::new(db.clone());
    let engine = RewardEngine::new(db.clone(), rules.clone());
    let redemption = RedemptionService::new(coupons);

    let state = AppState {
        db,
        rules,
        ledger,
        engine,
        redemption,
    };

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Order intake and user-facing reward routes
        .route("/api/rewards/process-order", post(rewards::handlers::process_order_handler))
        .route("/api/rewards/loyalty", get(rewards::handlers::loyalty_progress_handler))
        .route("/api/rewards/coupons", get(rewards::handlers::list_coupons_handler))
        .route("/api/rewards/coupons/:id/quote", post(rewards::handlers::quote_coupon_handler))
        .route("/api/rewards/coupons/:id/redeem", post(rewards::handlers::redeem_coupon_handler))
        // Admin rule catalog routes
        .route("/api/rewards/rules", post(rewards::handlers::create_rule_handler))
        .route("/api/rewards/rules", get(rewards::handlers::list_rules_handler))
        .route("/api/rewards/rules/:id", put(rewards::handlers::update_rule_handler))
        .route("/api/rewards/rules/:id", delete(rewards::handlers::delete_rule_handler))
        .route("/api/rewards/rules/:id/toggle", patch(rewards::handlers::toggle_rule_handler))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Canteen Rewards API - Starting...");

    // Get configuration from environment variables
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Create the application router
    let app = create_router(db_pool);

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Canteen Rewards API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
