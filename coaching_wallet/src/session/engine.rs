//! Reservation engine: the financial state machine for a billable
//! coaching session.
//!
//! Every transition runs as a single database transaction with the
//! session row and the owning wallet row locked, so two concurrent
//! reservations cannot both pass the available-balance check and a
//! failed transition leaves nothing behind.

use super::models::{BillableSession, ReserveRequest, SessionKind, SessionStatus, VoiceMode};
use crate::ledger::{AppendTransaction, LedgerStore};
use crate::wallet::{
    WalletError, WalletResult,
    models::TransactionType,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use uuid::Uuid;

/// Reservation engine
#[derive(Clone)]
pub struct ReservationEngine {
    pool: Arc<PgPool>,
    ledger: LedgerStore,
}

impl ReservationEngine {
    /// Create a new reservation engine sharing the service's pool and
    /// ledger store
    pub fn new(pool: Arc<PgPool>, ledger: LedgerStore) -> Self {
        Self { pool, ledger }
    }

    /// Reserve funds for a session.
    ///
    /// Requires `available_balance >= cost`. Raises `reserved_balance`
    /// by the cost, records a `reserve` transaction (no effect on
    /// `balance`), and creates the session in `reserved`.
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientFunds` - cost exceeds the available balance
    /// * `WalletError::InvalidAmount` - non-positive cost
    pub async fn reserve(&self, request: ReserveRequest) -> WalletResult<BillableSession> {
        if request.cost <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(format!(
                "reservation cost must be positive, got {}",
                request.cost
            )));
        }

        let mut tx = self.pool.begin().await?;

        let wallet = self
            .ledger
            .get_or_create_wallet(&mut tx, request.user_id)
            .await?;

        let available = wallet.available_balance();
        if available < request.cost {
            return Err(WalletError::InsufficientFunds {
                available,
                required: request.cost,
            });
        }

        let reserved_before = wallet.reserved_balance;
        let reserved_after = reserved_before + request.cost;

        let description = request.description.clone().unwrap_or_else(|| {
            format!(
                "Reserved {} {} for {} session",
                request.cost, wallet.currency, request.kind
            )
        });

        let transaction = self
            .ledger
            .append_transaction(
                &mut tx,
                AppendTransaction {
                    wallet_id: wallet.wallet_id,
                    user_id: request.user_id,
                    transaction_type: TransactionType::Reserve,
                    amount: request.cost,
                    balance_before: reserved_before,
                    balance_after: reserved_after,
                    session_id: Some(request.session_id),
                    payment_method_id: None,
                    description: Some(description),
                    expected_balance: wallet.balance,
                    expected_reserved: wallet.reserved_balance,
                    new_balance: wallet.balance,
                    new_reserved: reserved_after,
                },
            )
            .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO billable_sessions
                (session_id, user_id, kind, mode, duration_minutes, cost, status,
                 reserved_at, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, 'reserved', NOW(), $7)
            RETURNING session_id, user_id, kind, mode, duration_minutes, cost, status,
                      charged_amount, reserved_at, started_at, completed_at, cancelled_at,
                      refunded_at, transaction_id, created_at
            "#,
        )
        .bind(request.session_id)
        .bind(request.user_id)
        .bind(request.kind.to_string())
        .bind(request.mode.map(|m| m.to_string()))
        .bind(request.duration_minutes)
        .bind(request.cost)
        .bind(transaction.transaction_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "reserved {} for session {} (user {})",
            request.cost,
            request.session_id,
            request.user_id
        );
        Ok(session_from_row(&row))
    }

    /// Transition a session from `reserved` to `active`. No balance effect.
    pub async fn activate(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        let mut tx = self.pool.begin().await?;

        let session = self.lock_session(&mut tx, session_id).await?;
        if session.status != SessionStatus::Reserved {
            return Err(WalletError::InvalidState {
                session_id,
                status: session.status,
                attempted: "activate",
            });
        }

        let row = sqlx::query(
            r#"
            UPDATE billable_sessions
            SET status = 'active', started_at = NOW()
            WHERE session_id = $1
            RETURNING session_id, user_id, kind, mode, duration_minutes, cost, status,
                      charged_amount, reserved_at, started_at, completed_at, cancelled_at,
                      refunded_at, transaction_id, created_at
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session_from_row(&row))
    }

    /// Transition a session from `active` to `completed`, converting
    /// the reservation into a permanent charge.
    ///
    /// Moves the session's cost out of both `reserved_balance` and
    /// `balance` and records a `charge` transaction.
    pub async fn complete(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        let mut tx = self.pool.begin().await?;

        let session = self.lock_session(&mut tx, session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(WalletError::InvalidState {
                session_id,
                status: session.status,
                attempted: "complete",
            });
        }

        let wallet = self
            .ledger
            .get_or_create_wallet(&mut tx, session.user_id)
            .await?;
        if wallet.reserved_balance < session.cost {
            return Err(WalletError::Consistency(format!(
                "wallet {} reserves {} but session {} expects {}",
                wallet.wallet_id, wallet.reserved_balance, session_id, session.cost
            )));
        }

        let balance_before = wallet.balance;
        let balance_after = balance_before - session.cost;

        self.ledger
            .append_transaction(
                &mut tx,
                AppendTransaction {
                    wallet_id: wallet.wallet_id,
                    user_id: session.user_id,
                    transaction_type: TransactionType::Charge,
                    amount: session.cost,
                    balance_before,
                    balance_after,
                    session_id: Some(session_id),
                    payment_method_id: None,
                    description: Some(format!(
                        "Charged {} {} for {} session",
                        session.cost, wallet.currency, session.kind
                    )),
                    expected_balance: wallet.balance,
                    expected_reserved: wallet.reserved_balance,
                    new_balance: balance_after,
                    new_reserved: wallet.reserved_balance - session.cost,
                },
            )
            .await?;

        let row = sqlx::query(
            r#"
            UPDATE billable_sessions
            SET status = 'completed', completed_at = NOW(), charged_amount = $2
            WHERE session_id = $1
            RETURNING session_id, user_id, kind, mode, duration_minutes, cost, status,
                      charged_amount, reserved_at, started_at, completed_at, cancelled_at,
                      refunded_at, transaction_id, created_at
            "#,
        )
        .bind(session_id)
        .bind(session.cost)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!("charged {} for session {session_id}", session.cost);
        Ok(session_from_row(&row))
    }

    /// Cancel a session from `reserved` or `active`, releasing the
    /// held funds without charging.
    ///
    /// A zero-amount `refund` audit row is recorded so the release is
    /// visible in the transaction history while contributing nothing
    /// to balance reconstruction.
    pub async fn cancel(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        let mut tx = self.pool.begin().await?;

        let session = self.lock_session(&mut tx, session_id).await?;
        if !matches!(
            session.status,
            SessionStatus::Reserved | SessionStatus::Active
        ) {
            return Err(WalletError::InvalidState {
                session_id,
                status: session.status,
                attempted: "cancel",
            });
        }

        let wallet = self
            .ledger
            .get_or_create_wallet(&mut tx, session.user_id)
            .await?;
        if wallet.reserved_balance < session.cost {
            return Err(WalletError::Consistency(format!(
                "wallet {} reserves {} but session {} expects {}",
                wallet.wallet_id, wallet.reserved_balance, session_id, session.cost
            )));
        }

        let reserved_before = wallet.reserved_balance;
        let reserved_after = reserved_before - session.cost;

        self.ledger
            .append_transaction(
                &mut tx,
                AppendTransaction {
                    wallet_id: wallet.wallet_id,
                    user_id: session.user_id,
                    transaction_type: TransactionType::Refund,
                    amount: Decimal::ZERO,
                    balance_before: reserved_before,
                    balance_after: reserved_after,
                    session_id: Some(session_id),
                    payment_method_id: None,
                    description: Some(format!(
                        "Released hold of {} {} for cancelled {} session",
                        session.cost, wallet.currency, session.kind
                    )),
                    expected_balance: wallet.balance,
                    expected_reserved: wallet.reserved_balance,
                    new_balance: wallet.balance,
                    new_reserved: reserved_after,
                },
            )
            .await?;

        let row = sqlx::query(
            r#"
            UPDATE billable_sessions
            SET status = 'cancelled', cancelled_at = NOW()
            WHERE session_id = $1
            RETURNING session_id, user_id, kind, mode, duration_minutes, cost, status,
                      charged_amount, reserved_at, started_at, completed_at, cancelled_at,
                      refunded_at, transaction_id, created_at
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!("cancelled session {session_id}, released {}", session.cost);
        Ok(session_from_row(&row))
    }

    /// Refund a completed session, crediting `balance` and moving the
    /// session to terminal `refunded`.
    ///
    /// `amount` defaults to the full charged cost and must not exceed it.
    pub async fn refund(
        &self,
        session_id: Uuid,
        amount: Option<Decimal>,
    ) -> WalletResult<BillableSession> {
        let mut tx = self.pool.begin().await?;

        let session = self.lock_session(&mut tx, session_id).await?;
        if session.status != SessionStatus::Completed {
            return Err(WalletError::InvalidState {
                session_id,
                status: session.status,
                attempted: "refund",
            });
        }

        let charged = session.charged_amount.unwrap_or(session.cost);
        let amount = amount.unwrap_or(charged);
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(format!(
                "refund amount must be positive, got {amount}"
            )));
        }
        if amount > charged {
            return Err(WalletError::InvalidAmount(format!(
                "refund {amount} exceeds charged amount {charged}"
            )));
        }

        let wallet = self
            .ledger
            .get_or_create_wallet(&mut tx, session.user_id)
            .await?;

        let balance_before = wallet.balance;
        let balance_after = balance_before + amount;

        self.ledger
            .append_transaction(
                &mut tx,
                AppendTransaction {
                    wallet_id: wallet.wallet_id,
                    user_id: session.user_id,
                    transaction_type: TransactionType::Refund,
                    amount,
                    balance_before,
                    balance_after,
                    session_id: Some(session_id),
                    payment_method_id: None,
                    description: Some(format!(
                        "Refunded {} {} for {} session",
                        amount, wallet.currency, session.kind
                    )),
                    expected_balance: wallet.balance,
                    expected_reserved: wallet.reserved_balance,
                    new_balance: balance_after,
                    new_reserved: wallet.reserved_balance,
                },
            )
            .await?;

        let row = sqlx::query(
            r#"
            UPDATE billable_sessions
            SET status = 'refunded', refunded_at = NOW()
            WHERE session_id = $1
            RETURNING session_id, user_id, kind, mode, duration_minutes, cost, status,
                      charged_amount, reserved_at, started_at, completed_at, cancelled_at,
                      refunded_at, transaction_id, created_at
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!("refunded {amount} for session {session_id}");
        Ok(session_from_row(&row))
    }

    /// Get a session by ID. Read-only.
    pub async fn get_session(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        let row = sqlx::query(
            r#"
            SELECT session_id, user_id, kind, mode, duration_minutes, cost, status,
                   charged_amount, reserved_at, started_at, completed_at, cancelled_at,
                   refunded_at, transaction_id, created_at
            FROM billable_sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(WalletError::SessionNotFound(session_id))?;

        Ok(session_from_row(&row))
    }

    /// Select a session row with a lock for the current transaction
    async fn lock_session(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        session_id: Uuid,
    ) -> WalletResult<BillableSession> {
        let row = sqlx::query(
            r#"
            SELECT session_id, user_id, kind, mode, duration_minutes, cost, status,
                   charged_amount, reserved_at, started_at, completed_at, cancelled_at,
                   refunded_at, transaction_id, created_at
            FROM billable_sessions
            WHERE session_id = $1
            FOR UPDATE
            "#,
        )
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(WalletError::SessionNotFound(session_id))?;

        Ok(session_from_row(&row))
    }
}

fn session_from_row(row: &PgRow) -> BillableSession {
    let to_utc = |name: &str| {
        row.get::<Option<chrono::NaiveDateTime>, _>(name)
            .map(|dt| dt.and_utc())
    };

    BillableSession {
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        kind: SessionKind::parse(row.get::<String, _>("kind").as_str())
            .unwrap_or(SessionKind::Voice),
        mode: row
            .get::<Option<String>, _>("mode")
            .as_deref()
            .and_then(VoiceMode::parse),
        duration_minutes: row.get("duration_minutes"),
        cost: row.get("cost"),
        status: SessionStatus::parse(row.get::<String, _>("status").as_str())
            .unwrap_or(SessionStatus::Reserved),
        charged_amount: row.get("charged_amount"),
        reserved_at: to_utc("reserved_at"),
        started_at: to_utc("started_at"),
        completed_at: to_utc("completed_at"),
        cancelled_at: to_utc("cancelled_at"),
        refunded_at: to_utc("refunded_at"),
        transaction_id: row.get("transaction_id"),
        created_at: row
            .get::<chrono::NaiveDateTime, _>("created_at")
            .and_utc(),
    }
}
