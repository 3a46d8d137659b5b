//! Ledger store: durable, consistent storage of wallets and the
//! append-only transaction log.
//!
//! Every mutating method takes the caller's `sqlx` transaction so the
//! wallet update and its paired transaction insert commit (or roll
//! back) as one unit. The wallet update is guarded against the
//! balances the caller read: if another writer got there first, zero
//! rows match and the append fails with a consistency error instead
//! of silently losing the update.

use crate::wallet::{
    WalletError, WalletResult,
    models::{TransactionType, UserId, Wallet, WalletTransaction},
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

/// Parameters for a single ledger append: the transaction row to
/// insert plus the wallet update it pairs with.
#[derive(Debug, Clone)]
pub struct AppendTransaction {
    pub wallet_id: Uuid,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    /// Snapshot of the mutated field before the write (`reserved_balance`
    /// for reserve-type rows, `balance` otherwise)
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub session_id: Option<Uuid>,
    pub payment_method_id: Option<String>,
    pub description: Option<String>,
    /// Wallet balances the caller read; the update only applies if
    /// they still hold
    pub expected_balance: Decimal,
    pub expected_reserved: Decimal,
    pub new_balance: Decimal,
    pub new_reserved: Decimal,
}

/// Ledger store
#[derive(Clone)]
pub struct LedgerStore {
    default_currency: String,
}

impl LedgerStore {
    /// Create a new ledger store
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            default_currency: default_currency.into(),
        }
    }

    /// Get the wallet for a user, creating one with zero balances if
    /// absent. Idempotent on the user identity.
    ///
    /// The returned row is locked `FOR UPDATE` for the lifetime of the
    /// caller's transaction, serializing concurrent mutations of the
    /// same wallet.
    pub async fn get_or_create_wallet(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT wallet_id, user_id, balance, reserved_balance, currency, created_at, updated_at
            FROM user_wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = row {
            return Ok(wallet_from_row(&row));
        }

        // Lazy creation; ON CONFLICT covers a concurrent creator, the
        // re-select then takes the row lock either way.
        sqlx::query(
            r#"
            INSERT INTO user_wallets (wallet_id, user_id, balance, reserved_balance, currency)
            VALUES ($1, $2, 0, 0, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&self.default_currency)
        .execute(&mut **tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT wallet_id, user_id, balance, reserved_balance, currency, created_at, updated_at
            FROM user_wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;

        log::debug!("created wallet for user {user_id}");
        Ok(wallet_from_row(&row))
    }

    /// Fetch a wallet without locking or creating it. Read-only.
    pub async fn fetch_wallet(
        &self,
        pool: &PgPool,
        user_id: UserId,
    ) -> WalletResult<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            SELECT wallet_id, user_id, balance, reserved_balance, currency, created_at, updated_at
            FROM user_wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| wallet_from_row(&r)))
    }

    /// Persist a transaction row and apply the paired wallet update
    /// atomically.
    ///
    /// # Errors
    ///
    /// * `WalletError::Consistency` - the wallet's balances no longer
    ///   match what the caller read (lost-update race), or the new
    ///   balances would violate the wallet invariants. Nothing is
    ///   persisted in either case.
    pub async fn append_transaction(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        append: AppendTransaction,
    ) -> WalletResult<WalletTransaction> {
        if append.new_balance < Decimal::ZERO
            || append.new_reserved < Decimal::ZERO
            || append.new_reserved > append.new_balance
        {
            return Err(WalletError::Consistency(format!(
                "balance invariant violated for wallet {}: balance {}, reserved {}",
                append.wallet_id, append.new_balance, append.new_reserved
            )));
        }

        let updated = sqlx::query(
            r#"
            UPDATE user_wallets
            SET balance = $1, reserved_balance = $2, updated_at = NOW()
            WHERE wallet_id = $3 AND balance = $4 AND reserved_balance = $5
            "#,
        )
        .bind(append.new_balance)
        .bind(append.new_reserved)
        .bind(append.wallet_id)
        .bind(append.expected_balance)
        .bind(append.expected_reserved)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(WalletError::Consistency(format!(
                "concurrent update detected on wallet {}",
                append.wallet_id
            )));
        }

        let transaction_id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_transactions
                (transaction_id, wallet_id, user_id, transaction_type, amount,
                 balance_before, balance_after, session_id, payment_method_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING created_at
            "#,
        )
        .bind(transaction_id)
        .bind(append.wallet_id)
        .bind(append.user_id)
        .bind(append.transaction_type.to_string())
        .bind(append.amount)
        .bind(append.balance_before)
        .bind(append.balance_after)
        .bind(append.session_id)
        .bind(&append.payment_method_id)
        .bind(&append.description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(WalletTransaction {
            transaction_id,
            wallet_id: append.wallet_id,
            user_id: append.user_id,
            transaction_type: append.transaction_type,
            amount: append.amount,
            balance_before: append.balance_before,
            balance_after: append.balance_after,
            session_id: append.session_id,
            payment_method_id: append.payment_method_id,
            description: append.description,
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        })
    }

    /// Get transactions for a wallet, most recent first. Read-only.
    pub async fn list_transactions(
        &self,
        pool: &PgPool,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
        type_filter: Option<TransactionType>,
    ) -> WalletResult<Vec<WalletTransaction>> {
        let rows = match type_filter {
            Some(ty) => {
                sqlx::query(
                    r#"
                    SELECT transaction_id, wallet_id, user_id, transaction_type, amount,
                           balance_before, balance_after, session_id, payment_method_id,
                           description, created_at
                    FROM wallet_transactions
                    WHERE wallet_id = $1 AND transaction_type = $2
                    ORDER BY created_at DESC
                    LIMIT $3 OFFSET $4
                    "#,
                )
                .bind(wallet_id)
                .bind(ty.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT transaction_id, wallet_id, user_id, transaction_type, amount,
                           balance_before, balance_after, session_id, payment_method_id,
                           description, created_at
                    FROM wallet_transactions
                    WHERE wallet_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(wallet_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
            }
        };

        Ok(rows.iter().map(transaction_from_row).collect())
    }
}

fn wallet_from_row(row: &PgRow) -> Wallet {
    Wallet {
        wallet_id: row.get("wallet_id"),
        user_id: row.get("user_id"),
        balance: row.get("balance"),
        reserved_balance: row.get("reserved_balance"),
        currency: row.get("currency"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

fn transaction_from_row(row: &PgRow) -> WalletTransaction {
    WalletTransaction {
        transaction_id: row.get("transaction_id"),
        wallet_id: row.get("wallet_id"),
        user_id: row.get("user_id"),
        transaction_type: TransactionType::parse(row.get::<String, _>("transaction_type").as_str())
            .unwrap_or(TransactionType::Topup),
        amount: row.get("amount"),
        balance_before: row.get("balance_before"),
        balance_after: row.get("balance_after"),
        session_id: row.get("session_id"),
        payment_method_id: row.get("payment_method_id"),
        description: row.get("description"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}
