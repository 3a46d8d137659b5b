//! Billable session API handlers.
//!
//! The reservation cost is computed server-side from the configured
//! per-minute rates; clients submit kind, mode, and duration only.
//!
//! # Examples
//!
//! Reserve a 30-minute standard voice session:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/sessions/reserve \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": 42, "kind": "voice", "mode": "standard", "duration_minutes": 30}'
//! ```
//!
//! Settle after the session ran 20 minutes:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/sessions/<id>/settle \
//!   -H "Content-Type: application/json" \
//!   -d '{"actual_duration_minutes": 20}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use coaching_wallet::session::{BillableSession, ReserveRequest, SessionKind, VoiceMode};
use coaching_wallet::wallet::SettlementOutcome;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use uuid::Uuid;

use super::{AppState, ErrorResponse, error_response};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct ReservePayload {
    pub user_id: i64,
    pub kind: SessionKind,
    pub mode: Option<VoiceMode>,
    pub duration_minutes: i32,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RefundPayload {
    /// Omitted for a full refund of the charged amount
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SettlePayload {
    pub actual_duration_minutes: i32,
}

/// Reserve funds for a session.
///
/// Validates the duration against the configured bounds for the kind,
/// prices the session, and places a hold on the user's wallet.
///
/// # Errors
///
/// - `400 Bad Request`: Duration outside the configured bounds
/// - `402 Payment Required`: Available balance below the session cost
pub async fn reserve(
    State(state): State<AppState>,
    Json(payload): Json<ReservePayload>,
) -> Result<(StatusCode, Json<BillableSession>), (StatusCode, Json<ErrorResponse>)> {
    let cost = state
        .wallet
        .billing()
        .rates
        .cost_for(payload.kind, payload.mode, payload.duration_minutes)
        .map_err(|e| error_response(&e))?;

    let session = state
        .wallet
        .reserve(ReserveRequest {
            user_id: payload.user_id,
            session_id: Uuid::new_v4(),
            kind: payload.kind,
            mode: payload.mode,
            duration_minutes: payload.duration_minutes,
            cost,
            description: payload.description,
        })
        .await
        .map_err(|e| {
            if matches!(
                e,
                coaching_wallet::wallet::WalletError::InsufficientFunds { .. }
            ) {
                metrics::insufficient_funds_total();
            }
            error_response(&e)
        })?;

    metrics::session_transitions_total("reserve");
    Ok((StatusCode::CREATED, Json(session)))
}

/// Get session details.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<BillableSession>, (StatusCode, Json<ErrorResponse>)> {
    state
        .wallet
        .get_session(session_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// Mark a reserved session as started.
///
/// # Errors
///
/// - `409 Conflict`: Session is not in `reserved`
pub async fn activate(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<BillableSession>, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .wallet
        .activate(session_id)
        .await
        .map_err(|e| error_response(&e))?;

    metrics::session_transitions_total("activate");
    Ok(Json(session))
}

/// Convert an active session's hold into a permanent charge.
///
/// # Errors
///
/// - `409 Conflict`: Session is not in `active`
pub async fn complete(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<BillableSession>, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .wallet
        .complete(session_id)
        .await
        .map_err(|e| error_response(&e))?;

    metrics::session_transitions_total("complete");
    Ok(Json(session))
}

/// Cancel a session, releasing the held funds without charging.
///
/// # Errors
///
/// - `409 Conflict`: Session is not in `reserved` or `active`
pub async fn cancel(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<BillableSession>, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .wallet
        .cancel(session_id)
        .await
        .map_err(|e| error_response(&e))?;

    metrics::session_transitions_total("cancel");
    Ok(Json(session))
}

/// Refund a completed session, up to the charged amount.
///
/// # Request Body
///
/// ```json
/// {"amount": "50.00"}
/// ```
/// An empty body refunds the full charge.
///
/// # Errors
///
/// - `400 Bad Request`: Non-positive amount or amount above the charge
/// - `409 Conflict`: Session is not in `completed`
pub async fn refund(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    payload: Option<Json<RefundPayload>>,
) -> Result<Json<BillableSession>, (StatusCode, Json<ErrorResponse>)> {
    let amount = payload.map(|Json(p)| p.amount).unwrap_or_default();

    let session = state
        .wallet
        .refund(session_id, amount)
        .await
        .map_err(|e| error_response(&e))?;

    metrics::session_transitions_total("refund");
    if let Some(amount) = amount.or(session.charged_amount) {
        metrics::refunds_total(amount.to_f64().unwrap_or(0.0));
    }
    Ok(Json(session))
}

/// Settle a session against its actual duration: charge for the
/// minutes used, refund the unused remainder of the reservation.
pub async fn settle(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SettlePayload>,
) -> Result<Json<SettlementOutcome>, (StatusCode, Json<ErrorResponse>)> {
    let outcome = state
        .wallet
        .settle(session_id, payload.actual_duration_minutes)
        .await
        .map_err(|e| error_response(&e))?;

    metrics::session_transitions_total("settle");
    if outcome.refunded_amount > Decimal::ZERO {
        metrics::refunds_total(outcome.refunded_amount.to_f64().unwrap_or(0.0));
    }
    Ok(Json(outcome))
}
