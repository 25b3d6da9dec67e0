mod collaborators;
mod config;
mod models;
mod orders;
mod promos;
mod scheduling;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::NaiveTime;

use collaborators::{AutoApproveGateway, LogNotifier, LogRenderer};
use config::Settings;
use orders::repository::InMemoryOrderStore;
use orders::service::OrderService;
use promos::repository::InMemoryPromoRepository;
use scheduling::calendar::InMemoryCalendar;
use scheduling::capacity::SlotCapacityStore;
use scheduling::generator::SlotGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub order_service: OrderService,
    pub slot_store: Arc<SlotCapacityStore>,
    pub slot_generator: SlotGenerator,
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Order lifecycle
        .route("/api/orders", post(orders::handlers::create_order))
        .route("/api/orders", get(orders::handlers::list_orders))
        .route("/api/orders/:id", get(orders::handlers::get_order))
        .route("/api/orders/:id/advance", post(orders::handlers::advance_order))
        .route(
            "/api/orders/:id/reschedule",
            post(orders::handlers::reschedule_order),
        )
        .route("/api/orders/:id/refund", post(orders::handlers::refund_order))
        .route("/api/orders/:id/cancel", post(orders::handlers::cancel_order))
        // Timeslots
        .route("/api/slots/generate", post(scheduling::handlers::generate_slots))
        .route("/api/slots", get(scheduling::handlers::list_slots))
        .layer(cors)
        .with_state(state)
}

/// Wire the in-memory adapters into a ready-to-serve application state
fn build_state(settings: Settings) -> AppState {
    // Uniform 7:00-18:00 hours until per-weekday admin config lands
    let open = NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default();
    let close = NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default();
    let calendar = Arc::new(InMemoryCalendar::with_uniform_hours(open, close));

    let slot_store = Arc::new(SlotCapacityStore::new(
        calendar.clone(),
        settings.slot_lock_wait,
    ));
    let slot_generator = SlotGenerator::new(calendar);

    let order_service = OrderService::new(
        InMemoryOrderStore::new(),
        Arc::new(InMemoryPromoRepository::new()),
        slot_store.clone(),
        Arc::new(AutoApproveGateway),
        Arc::new(LogNotifier),
        Arc::new(LogRenderer),
        settings,
    );

    AppState {
        order_service,
        slot_store,
        slot_generator,
    }
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

    tracing::info!("Bakery API - Starting...");

    let settings = Settings::from_env();
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    let app = create_router(build_state(settings));

    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Bakery API is running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
