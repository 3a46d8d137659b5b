//! Wallet service: the public API combining the ledger store, the
//! reservation engine, payment validation, and bonus-tier logic.

use super::{
    errors::{WalletError, WalletResult},
    models::{BalanceSummary, TopupReceipt, TransactionType, UserId, WalletTransaction},
};
use crate::costs::BillingConfig;
use crate::ledger::{AppendTransaction, LedgerStore};
use crate::payment::PaymentProvider;
use crate::session::{BillableSession, ReservationEngine, ReserveRequest, SessionStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum page size for transaction history queries
const MAX_TRANSACTION_PAGE: i64 = 100;

/// Result of settling a session against its actual duration: the
/// charge for the reserved cost plus a refund of any unused remainder.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SettlementOutcome {
    pub session: BillableSession,
    pub reserved_amount: Decimal,
    pub actual_cost: Decimal,
    pub refunded_amount: Decimal,
}

/// Wallet service
#[derive(Clone)]
pub struct WalletService {
    pool: Arc<PgPool>,
    ledger: LedgerStore,
    config: BillingConfig,
    payments: Arc<dyn PaymentProvider>,
    engine: ReservationEngine,
}

impl WalletService {
    /// Create a new wallet service
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `config` - Billing configuration (currency, bonus tiers, rates)
    /// * `payments` - External payment collaborator
    pub fn new(
        pool: Arc<PgPool>,
        config: BillingConfig,
        payments: Arc<dyn PaymentProvider>,
    ) -> Self {
        let ledger = LedgerStore::new(config.currency.clone());
        let engine = ReservationEngine::new(pool.clone(), ledger.clone());
        Self {
            pool,
            ledger,
            config,
            payments,
            engine,
        }
    }

    /// Billing configuration in effect
    pub fn billing(&self) -> &BillingConfig {
        &self.config
    }

    /// Get the balance summary for a user.
    ///
    /// Creates the wallet lazily on first access, per the data model.
    pub async fn get_balance(&self, user_id: UserId) -> WalletResult<BalanceSummary> {
        let mut tx = self.pool.begin().await?;
        let wallet = self.ledger.get_or_create_wallet(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(BalanceSummary::from(&wallet))
    }

    /// Get transaction history for a user, most recent first.
    ///
    /// Side-effect-free: a user with no wallet yet gets an empty page
    /// rather than a lazily created one. `limit` is capped at 100.
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
        type_filter: Option<TransactionType>,
    ) -> WalletResult<Vec<WalletTransaction>> {
        let Some(wallet) = self.ledger.fetch_wallet(self.pool.as_ref(), user_id).await? else {
            return Ok(Vec::new());
        };

        let limit = limit.clamp(1, MAX_TRANSACTION_PAGE);
        let offset = offset.max(0);
        self.ledger
            .list_transactions(self.pool.as_ref(), wallet.wallet_id, limit, offset, type_filter)
            .await
    }

    /// Top up a wallet, applying the configured bonus tier.
    ///
    /// Records a `topup` transaction for the base amount and, when a
    /// tier applies, a second `bonus` transaction; both credit
    /// `balance` and each row's `balance_after` equals its
    /// `balance_before` plus its own amount.
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - non-positive amount or a
    ///   payment method the payment collaborator does not recognize
    pub async fn topup(
        &self,
        user_id: UserId,
        amount: Decimal,
        payment_method_id: &str,
    ) -> WalletResult<TopupReceipt> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(format!(
                "top-up amount must be positive, got {amount}"
            )));
        }
        if !self.payments.verify_payment_method(payment_method_id).await? {
            return Err(WalletError::InvalidAmount(format!(
                "payment method not recognized: {payment_method_id}"
            )));
        }

        // The external charge happens before the ledger write; its
        // success/failure result is trusted as-is.
        self.payments
            .execute_charge(payment_method_id, amount, &self.config.currency)
            .await?;

        let bonus_percentage = self.config.bonus_percentage_for(amount);
        let bonus_amount = self.config.bonus_amount_for(amount);

        let mut tx = self.pool.begin().await?;
        let wallet = self.ledger.get_or_create_wallet(&mut tx, user_id).await?;

        let balance_after_topup = wallet.balance + amount;
        let topup = self
            .ledger
            .append_transaction(
                &mut tx,
                AppendTransaction {
                    wallet_id: wallet.wallet_id,
                    user_id,
                    transaction_type: TransactionType::Topup,
                    amount,
                    balance_before: wallet.balance,
                    balance_after: balance_after_topup,
                    session_id: None,
                    payment_method_id: Some(payment_method_id.to_string()),
                    description: Some(format!("Topup of {} {}", amount, self.config.currency)),
                    expected_balance: wallet.balance,
                    expected_reserved: wallet.reserved_balance,
                    new_balance: balance_after_topup,
                    new_reserved: wallet.reserved_balance,
                },
            )
            .await?;

        let bonus = if bonus_amount > Decimal::ZERO {
            let balance_after_bonus = balance_after_topup + bonus_amount;
            Some(
                self.ledger
                    .append_transaction(
                        &mut tx,
                        AppendTransaction {
                            wallet_id: wallet.wallet_id,
                            user_id,
                            transaction_type: TransactionType::Bonus,
                            amount: bonus_amount,
                            balance_before: balance_after_topup,
                            balance_after: balance_after_bonus,
                            session_id: None,
                            payment_method_id: Some(payment_method_id.to_string()),
                            description: Some(format!(
                                "Bonus {}% on topup of {} {}",
                                bonus_percentage, amount, self.config.currency
                            )),
                            expected_balance: balance_after_topup,
                            expected_reserved: wallet.reserved_balance,
                            new_balance: balance_after_bonus,
                            new_reserved: wallet.reserved_balance,
                        },
                    )
                    .await?,
            )
        } else {
            None
        };

        tx.commit().await?;

        let balance_after = bonus
            .as_ref()
            .map(|b| b.balance_after)
            .unwrap_or(topup.balance_after);

        log::info!(
            "topup of {amount} (+{bonus_amount} bonus) for user {user_id}, balance {balance_after}"
        );

        Ok(TopupReceipt {
            topup,
            bonus,
            bonus_percentage,
            total_credited: amount + bonus_amount,
            balance_after,
        })
    }

    // Reservation operations delegate to the engine; the service is
    // the single public seam for callers.

    /// Reserve funds for a billable session (see [`ReservationEngine::reserve`])
    pub async fn reserve(&self, request: ReserveRequest) -> WalletResult<BillableSession> {
        self.engine.reserve(request).await
    }

    /// Mark a reserved session as started
    pub async fn activate(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        self.engine.activate(session_id).await
    }

    /// Convert an active session's hold into a permanent charge
    pub async fn complete(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        self.engine.complete(session_id).await
    }

    /// Release a session's hold without charging
    pub async fn cancel(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        self.engine.cancel(session_id).await
    }

    /// Refund a completed session, up to the charged amount
    pub async fn refund(
        &self,
        session_id: Uuid,
        amount: Option<Decimal>,
    ) -> WalletResult<BillableSession> {
        self.engine.refund(session_id, amount).await
    }

    /// Get a session by ID
    pub async fn get_session(&self, session_id: Uuid) -> WalletResult<BillableSession> {
        self.engine.get_session(session_id).await
    }

    /// Settle a session against its actual duration.
    ///
    /// Charges the full reserved cost, then refunds the unused
    /// remainder when the session ran shorter than reserved. A session
    /// still in `reserved` is activated first (it started and ended
    /// between lifecycle callbacks). The net debit equals the actual
    /// per-minute cost, capped at the reserved amount.
    pub async fn settle(
        &self,
        session_id: Uuid,
        actual_duration_minutes: i32,
    ) -> WalletResult<SettlementOutcome> {
        if actual_duration_minutes < 0 {
            return Err(WalletError::InvalidAmount(format!(
                "actual duration must be non-negative, got {actual_duration_minutes}"
            )));
        }

        let session = self.engine.get_session(session_id).await?;
        if session.status == SessionStatus::Reserved {
            self.engine.activate(session_id).await?;
        }

        let per_minute = self.config.rates.rate_per_minute(session.kind, session.mode);
        let actual_cost = (per_minute * Decimal::from(actual_duration_minutes)).min(session.cost);

        let session = self.engine.complete(session_id).await?;
        let refund_amount = session.cost - actual_cost;

        let session = if refund_amount > Decimal::ZERO {
            self.engine.refund(session_id, Some(refund_amount)).await?
        } else {
            session
        };

        Ok(SettlementOutcome {
            reserved_amount: session.cost,
            actual_cost,
            refunded_amount: refund_amount,
            session,
        })
    }
}
