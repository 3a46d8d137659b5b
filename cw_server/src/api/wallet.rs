//! Wallet API handlers: balance, top-up, and transaction history.
//!
//! # Examples
//!
//! Check a balance:
//! ```bash
//! curl http://localhost:8080/api/v1/wallet/42/balance
//! ```
//!
//! Top up:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/wallet/42/topup \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": "1000.00", "payment_method_id": "pm_abc"}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use coaching_wallet::wallet::{BalanceSummary, TopupReceipt, TransactionType, WalletTransaction};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

use super::{AppState, ErrorResponse, error_response};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct TopupRequest {
    pub amount: Decimal,
    pub payment_method_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Optional type filter: topup, reserve, charge, refund, bonus
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
}

fn default_limit() -> i64 {
    50
}

/// Get the balance summary for a user.
///
/// Creates the wallet with zero balances on first access.
///
/// # Response
///
/// ```json
/// {"wallet_id":"...","balance":"1100.00","reserved_balance":"200.00",
///  "available_balance":"900.00","currency":"NPR"}
/// ```
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<BalanceSummary>, (StatusCode, Json<ErrorResponse>)> {
    state
        .wallet
        .get_balance(user_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// Get transaction history for a user, most recent first.
///
/// # Query Parameters
///
/// - `limit`: Page size, 1-100 (default 50)
/// - `offset`: Rows to skip (default 0)
/// - `type`: Optional filter by transaction type
///
/// # Errors
///
/// - `400 Bad Request`: Unknown transaction type
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<WalletTransaction>>, (StatusCode, Json<ErrorResponse>)> {
    let type_filter = match query.transaction_type.as_deref() {
        None => None,
        Some(raw) => match TransactionType::parse(raw) {
            Some(ty) => Some(ty),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("Unknown transaction type: {raw}"),
                    }),
                ));
            }
        },
    };

    state
        .wallet
        .list_transactions(user_id, query.limit, query.offset, type_filter)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// Top up a wallet, applying the configured bonus tier.
///
/// # Request Body
///
/// ```json
/// {"amount": "1000.00", "payment_method_id": "pm_abc"}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Non-positive amount or unrecognized payment method
pub async fn topup(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<TopupRequest>,
) -> Result<Json<TopupReceipt>, (StatusCode, Json<ErrorResponse>)> {
    let receipt = state
        .wallet
        .topup(user_id, request.amount, &request.payment_method_id)
        .await
        .map_err(|e| error_response(&e))?;

    metrics::topups_total(
        receipt.total_credited.to_f64().unwrap_or(0.0),
        receipt.bonus.is_some(),
    );

    Ok(Json(receipt))
}
