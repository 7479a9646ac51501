//! Application startup: shared state, router assembly and server lifecycle.

use std::net::SocketAddr;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use hearth_core::error::AppError;
use hearth_core::middleware::metrics::metrics_middleware;
use hearth_core::middleware::request_id::request_id_middleware;
use hearth_core::middleware::security_headers::security_headers_middleware;

use crate::config::HearthConfig;
use crate::handlers;
use crate::middleware::{auth_middleware, JwtVerifier};
use crate::services::database::Database;
use crate::services::metrics::{get_metrics, init_metrics};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: HearthConfig,
    pub db: Database,
    pub jwt: JwtVerifier,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "hearth-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "hearth-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => {
            tracing::debug!("Readiness check passed");
            StatusCode::OK
        }
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = get_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Build the full HTTP router. Everything under /api requires a bearer
/// token carrying an organization claim.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Accounts
        .route(
            "/accounts",
            post(handlers::accounts::create_account).get(handlers::accounts::list_accounts),
        )
        .route(
            "/accounts/:account_id",
            get(handlers::accounts::get_account)
                .patch(handlers::accounts::update_account)
                .delete(handlers::accounts::delete_account),
        )
        // Transactions
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route(
            "/transactions/import",
            post(handlers::transactions::import_transactions),
        )
        .route(
            "/transactions/:transaction_id",
            get(handlers::transactions::get_transaction)
                .patch(handlers::transactions::update_transaction)
                .delete(handlers::transactions::delete_transaction),
        )
        .route(
            "/transactions/:transaction_id/labels/:label_id",
            put(handlers::transactions::add_transaction_label)
                .delete(handlers::transactions::remove_transaction_label),
        )
        // Labels
        .route(
            "/labels",
            post(handlers::labels::create_label).get(handlers::labels::list_labels),
        )
        .route("/labels/:label_id", delete(handlers::labels::delete_label))
        // Categorization rules
        .route(
            "/rules",
            post(handlers::rules::create_rule).get(handlers::rules::list_rules),
        )
        .route("/rules/apply", post(handlers::rules::apply_rules))
        .route(
            "/rules/:rule_id",
            get(handlers::rules::get_rule)
                .patch(handlers::rules::update_rule)
                .delete(handlers::rules::delete_rule),
        )
        .route(
            "/rules/:rule_id/preview",
            post(handlers::rules::preview_rule),
        )
        // Budgets
        .route(
            "/budgets",
            post(handlers::budgets::create_budget).get(handlers::budgets::list_budgets),
        )
        .route("/budgets/summary", get(handlers::budgets::budget_summary))
        .route("/budgets/alerts/run", post(handlers::budgets::run_alerts))
        .route(
            "/budgets/:budget_id",
            axum::routing::patch(handlers::budgets::update_budget)
                .delete(handlers::budgets::delete_budget),
        )
        // Savings goals
        .route(
            "/goals",
            post(handlers::goals::create_goal).get(handlers::goals::list_goals),
        )
        .route(
            "/goals/:goal_id",
            get(handlers::goals::get_goal)
                .patch(handlers::goals::update_goal)
                .delete(handlers::goals::delete_goal),
        )
        .route(
            "/goals/:goal_id/contributions",
            post(handlers::goals::add_contribution),
        )
        // Holdings
        .route(
            "/holdings",
            post(handlers::holdings::create_holding).get(handlers::holdings::list_holdings),
        )
        .route(
            "/holdings/summary",
            get(handlers::holdings::portfolio_summary),
        )
        .route(
            "/holdings/:holding_id",
            axum::routing::patch(handlers::holdings::update_holding)
                .delete(handlers::holdings::delete_holding),
        )
        // Debt payoff
        .route("/debts", get(handlers::debts::list_debts))
        .route("/debts/payoff-plan", get(handlers::debts::payoff_plan))
        // Net-worth snapshots
        .route(
            "/snapshots",
            post(handlers::snapshots::create_snapshot).get(handlers::snapshots::list_snapshots),
        )
        // Notifications
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/notifications/:notification_id/read",
            post(handlers::notifications::mark_read),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .with_state(state.clone())
        // Metrics middleware
        .layer(from_fn(metrics_middleware))
        // Tracing layer with request correlation
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Security headers middleware
        .layer(from_fn(security_headers_middleware))
        // CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<HeaderValue>>(),
                )
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: HearthConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: HearthConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: HearthConfig, run_migrations: bool) -> Result<Self, AppError> {
        // Initialize metrics
        init_metrics();

        // Connect to database
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        // Run migrations only if requested
        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let jwt = JwtVerifier::new(&config.auth.jwt_secret);

        let state = AppState { config: config.clone(), db, jwt };

        // Bind HTTP listener
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "hearth-service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state.clone());

        tracing::info!(
            service = "hearth-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
