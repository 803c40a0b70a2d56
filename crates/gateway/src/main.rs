//! Seatwise API Gateway
//!
//! The HTTP surface of the booking core. Handles:
//! - Caller identification (X-User-ID)
//! - Rate limiting
//! - Request routing and validation
//! - Observability (logging, metrics, tracing)

mod extract;
mod handlers;
mod middleware;

use axum::{
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use seatwise_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    metrics,
    notify::{LogNotifier, Notifier, Queue, QueueSettings, SqsNotifier},
    BookingWorkflow,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub store: Arc<Repository>,
    pub workflow: Arc<BookingWorkflow<Repository>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Seatwise API Gateway v{}", seatwise_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let store = Arc::new(Repository::new(db.clone()));

    // Booking notifications go to SQS when a queue is configured,
    // otherwise to the log
    let notifier: Arc<dyn Notifier> = match QueueSettings::from_config(&config.notifications) {
        Some(settings) => {
            info!(url = %settings.url, "Connecting to notification queue...");
            Arc::new(SqsNotifier::new(Queue::new(settings).await?))
        }
        None => {
            info!("No notification queue configured, using log-only delivery");
            Arc::new(LogNotifier)
        }
    };

    let workflow = Arc::new(BookingWorkflow::new(Arc::clone(&store), notifier));

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        store,
        workflow,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        // Seat availability
        .route(
            "/showtimes/{id}/seats",
            get(handlers::seats::list_available_seats),
        )
        // Quotes
        .route("/quotes", post(handlers::quotes::quote))
        // Bookings
        .route(
            "/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route(
            "/bookings/{id}",
            get(handlers::bookings::get_booking).delete(handlers::bookings::cancel_booking),
        )
        .route(
            "/bookings/{id}/seats",
            put(handlers::bookings::update_booking_seats),
        )
        // Loyalty
        .route("/loyalty", get(handlers::loyalty::get_loyalty))
        // Discount codes
        .route(
            "/discount-codes",
            post(handlers::discounts::create_discount_code)
                .get(handlers::discounts::list_discount_codes),
        );

    if state.config.rate_limit.enabled {
        let limit = state.config.rate_limit.requests_per_second;
        let limiter = middleware::rate_limit::create_rate_limiter(
            limit,
            state.config.rate_limit.burst,
        );
        api_routes = api_routes.layer(axum::middleware::from_fn(move |request, next| {
            let limiter = Arc::clone(&limiter);
            async move {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter, limit).await
            }
        }));
    }

    // Compose the app; probes stay outside the rate limit
    Router::new()
        .nest("/v1", api_routes)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .layer(axum::middleware::from_fn(middleware::track::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
