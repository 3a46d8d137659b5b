//! HTTP API for the coaching wallet server.
//!
//! # Modules
//!
//! - [`wallet`]: Balance queries, top-ups, transaction history
//! - [`sessions`]: Billable session lifecycle (reserve, activate,
//!   complete, cancel, refund, settle)
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                                   - Health check
//! GET  /api/v1/wallet/{user_id}/balance          - Balance summary
//! GET  /api/v1/wallet/{user_id}/transactions     - Transaction history
//! POST /api/v1/wallet/{user_id}/topup            - Top up with bonus tiers
//! POST /api/v1/sessions/reserve                  - Reserve session funds
//! GET  /api/v1/sessions/{session_id}             - Session details
//! POST /api/v1/sessions/{session_id}/activate    - Mark session started
//! POST /api/v1/sessions/{session_id}/complete    - Charge the reservation
//! POST /api/v1/sessions/{session_id}/cancel      - Release the hold
//! POST /api/v1/sessions/{session_id}/refund      - Refund a completed session
//! POST /api/v1/sessions/{session_id}/settle      - Charge actual usage, refund rest
//! ```
//!
//! User identity arrives as a path parameter; authentication is handled
//! by the platform gateway in front of this service.
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production,
//! configure appropriate origins, methods, and headers.

pub mod sessions;
pub mod wallet;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use coaching_wallet::wallet::{WalletError, WalletService};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; cheap due to the Arc wrappers.
#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<WalletService>,
    pub pool: Arc<PgPool>,
}

/// JSON error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a wallet error onto an HTTP status and a client-safe body.
///
/// Internal detail (database errors, write conflicts) is sanitized by
/// `client_message`; the full error is logged server-side instead.
pub fn error_response(err: &WalletError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        WalletError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        WalletError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        WalletError::InvalidState { .. } | WalletError::Consistency(_) => StatusCode::CONFLICT,
        WalletError::WalletNotFound(_) | WalletError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        WalletError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("wallet operation failed: {err}");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.client_message(),
        }),
    )
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router();

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/wallet/{user_id}/balance", get(wallet::get_balance))
        .route(
            "/wallet/{user_id}/transactions",
            get(wallet::list_transactions),
        )
        .route("/wallet/{user_id}/topup", post(wallet::topup))
        .route("/sessions/reserve", post(sessions::reserve))
        .route("/sessions/{session_id}", get(sessions::get_session))
        .route("/sessions/{session_id}/activate", post(sessions::activate))
        .route("/sessions/{session_id}/complete", post(sessions::complete))
        .route("/sessions/{session_id}/cancel", post(sessions::cancel))
        .route("/sessions/{session_id}/refund", post(sessions::refund))
        .route("/sessions/{session_id}/settle", post(sessions::settle))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the database answers a trivial query, or
/// `503 Service Unavailable` otherwise.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = sqlx::query("SELECT 1")
        .fetch_one(&*state.pool)
        .await
        .is_ok();

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
