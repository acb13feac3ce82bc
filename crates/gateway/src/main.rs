//! LeadForge API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use leadforge_common::{
    auth::JwtManager,
    cache::{Cache, CacheConfig},
    config::AppConfig,
    db::{DbPool, Repository},
    metrics,
    notify::{NoopNotifier, Notifier, WebhookNotifier},
    payment::{PaymentProcessor, StripeClient, UnconfiguredPayments},
};
use leadforge_fulfillment::{CsvWriter, ExtractWriter, LeadAggregator, OrderBuilder};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub cache: Option<Arc<Cache>>,
    pub jwt: Arc<JwtManager>,
    pub payments: Arc<dyn PaymentProcessor>,
    pub notifier: Arc<dyn Notifier>,
    pub writer: Arc<dyn ExtractWriter>,
}

impl AppState {
    /// Repository over the shared pool
    pub fn repository(&self) -> Repository {
        Repository::new(self.db.clone())
    }

    /// Order builder with the state's injected collaborators
    pub fn order_builder(&self) -> OrderBuilder {
        OrderBuilder::new(
            self.repository(),
            Arc::clone(&self.writer),
            Arc::clone(&self.notifier),
            self.config.storage.extract_dir.clone(),
        )
    }

    /// Lead aggregator with the state's cache
    pub fn aggregator(&self) -> LeadAggregator {
        LeadAggregator::new(
            self.repository(),
            self.cache.clone(),
            self.config.redis.lead_count_ttl_secs,
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level))
    };
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .init();
    }

    info!("Starting LeadForge API Gateway v{}", leadforge_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Prometheus exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Optional Redis cache
    let cache = match config.redis.url {
        Some(ref url) => {
            let cache_config = CacheConfig {
                url: url.clone(),
                default_ttl_secs: config.redis.default_ttl_secs,
                key_prefix: config.observability.service_name.clone(),
            };
            match Cache::new(cache_config).await {
                Ok(cache) => Some(Arc::new(cache)),
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unavailable, continuing without cache");
                    None
                }
            }
        }
        None => None,
    };

    // Authentication
    let jwt_secret = config
        .auth
        .jwt_secret
        .clone()
        .ok_or("APP__AUTH__JWT_SECRET must be set")?;
    let jwt = Arc::new(JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs));

    // Payment processor
    let payments: Arc<dyn PaymentProcessor> = match config.payment.stripe_secret_key {
        Some(ref key) => Arc::new(StripeClient::new(
            key.clone(),
            config.payment.api_base.clone(),
            config.payment.timeout_secs,
            config.payment.max_retries,
        )),
        None => {
            tracing::warn!("No payment provider configured; card payments disabled");
            Arc::new(UnconfiguredPayments)
        }
    };

    // Notifier
    let notifier: Arc<dyn Notifier> = match config.storage.notify_url {
        Some(ref url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NoopNotifier),
    };

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        cache,
        jwt,
        payments,
        notifier,
        writer: Arc::new(CsvWriter::default()),
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

    // Authenticated API routes
    let api_routes = Router::new()
        // Collection endpoints
        .route("/collections", get(handlers::collections::list_collections))
        .route("/collections", post(handlers::collections::create_collection))
        .route("/collections/{id}", get(handlers::collections::get_collection))
        .route("/collections/{id}/leads", get(handlers::collections::collection_leads))
        .route("/collections/{id}/quote", post(handlers::collections::quote_collection))

        // Table endpoints
        .route("/tables", post(handlers::tables::import_table))
        .route("/tables/{id}", get(handlers::tables::get_table))
        .route("/tables/{id}", delete(handlers::tables::delete_table))
        .route("/tables/{id}/rows", put(handlers::tables::reimport_table))

        // Order endpoints
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route("/orders/{id}/pay", post(handlers::orders::pay_order))

        // Delivery file endpoints
        .route("/files/{id}", get(handlers::files::get_file))
        .route("/files/{id}/download", get(handlers::files::download_file))

        // Wallet endpoints
        .route("/wallet", get(handlers::wallet::get_balance))
        .route("/wallet/transactions", get(handlers::wallet::list_transactions))
        .route("/wallet/topups", post(handlers::wallet::create_topup))
        .route("/wallet/topups/{id}/approve", post(handlers::wallet::approve_topup))

        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Public routes: health probes and the payment provider webhook
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/payments/webhook", post(handlers::payments::payment_webhook));

    // Rate limiting
    let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit);
    let rate_limit_enabled = state.config.rate_limit.enabled;

    // Compose the app
    let mut app = Router::new()
        .nest("/v1", public_routes.merge(api_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id);

    if rate_limit_enabled {
        app = app.layer(axum::middleware::from_fn(move |request, next| {
            let limiter = Arc::clone(&limiter);
            async move {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter).await
            }
        }));
    }

    app.with_state(state)
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
