//! Wallet data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User ID type (the user entity itself lives in an external system)
pub type UserId = i64;

/// Wallet model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: Uuid,
    pub user_id: UserId,
    /// Total funds ever credited minus total ever debited
    pub balance: Decimal,
    /// Funds earmarked for in-flight sessions, never exceeds `balance`
    pub reserved_balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// The only amount eligible for new reservations
    pub fn available_balance(&self) -> Decimal {
        self.balance - self.reserved_balance
    }
}

/// Balance summary returned by the wallet service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub wallet_id: Uuid,
    pub balance: Decimal,
    pub reserved_balance: Decimal,
    pub available_balance: Decimal,
    pub currency: String,
}

impl From<&Wallet> for BalanceSummary {
    fn from(wallet: &Wallet) -> Self {
        Self {
            wallet_id: wallet.wallet_id,
            balance: wallet.balance,
            reserved_balance: wallet.reserved_balance,
            available_balance: wallet.available_balance(),
            currency: wallet.currency.clone(),
        }
    }
}

/// Transaction type
///
/// `Topup`, `Bonus`, and `Refund` are credits against `balance`;
/// `Charge` is a debit. `Reserve` affects only `reserved_balance` and
/// is excluded from balance reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Topup,
    Reserve,
    Charge,
    Refund,
    Bonus,
}

impl TransactionType {
    /// Parse the database representation, `None` for unknown values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "topup" => Some(TransactionType::Topup),
            "reserve" => Some(TransactionType::Reserve),
            "charge" => Some(TransactionType::Charge),
            "refund" => Some(TransactionType::Refund),
            "bonus" => Some(TransactionType::Bonus),
            _ => None,
        }
    }

    /// Signed effect of `amount` on the wallet `balance`.
    ///
    /// Summing this over all transactions of a wallet reconstructs its
    /// current balance exactly.
    pub fn signed_effect(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Topup | TransactionType::Bonus | TransactionType::Refund => amount,
            TransactionType::Charge => -amount,
            TransactionType::Reserve => Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Topup => write!(f, "topup"),
            TransactionType::Reserve => write!(f, "reserve"),
            TransactionType::Charge => write!(f, "charge"),
            TransactionType::Refund => write!(f, "refund"),
            TransactionType::Bonus => write!(f, "bonus"),
        }
    }
}

/// Wallet transaction model (append-only audit record)
///
/// `balance_before`/`balance_after` snapshot the field the type
/// mutates: `reserved_balance` for `Reserve` (and the zero-amount
/// audit row a cancellation emits), `balance` for everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub session_id: Option<Uuid>,
    pub payment_method_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a top-up: the base transaction, the bonus transaction if
/// a tier applied, and the resulting balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupReceipt {
    pub topup: WalletTransaction,
    pub bonus: Option<WalletTransaction>,
    pub bonus_percentage: Decimal,
    pub total_credited: Decimal,
    pub balance_after: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transaction_type_roundtrip() {
        for ty in [
            TransactionType::Topup,
            TransactionType::Reserve,
            TransactionType::Charge,
            TransactionType::Refund,
            TransactionType::Bonus,
        ] {
            assert_eq!(TransactionType::parse(&ty.to_string()), Some(ty));
        }
        assert_eq!(TransactionType::parse("buy_in"), None);
    }

    #[test]
    fn signed_effect_convention() {
        let amount = dec!(50.00);
        assert_eq!(TransactionType::Topup.signed_effect(amount), amount);
        assert_eq!(TransactionType::Bonus.signed_effect(amount), amount);
        assert_eq!(TransactionType::Refund.signed_effect(amount), amount);
        assert_eq!(TransactionType::Charge.signed_effect(amount), -amount);
        assert_eq!(TransactionType::Reserve.signed_effect(amount), Decimal::ZERO);
    }

    #[test]
    fn available_balance_subtracts_reserved() {
        let wallet = Wallet {
            wallet_id: Uuid::new_v4(),
            user_id: 1,
            balance: dec!(1100.00),
            reserved_balance: dec!(200.00),
            currency: "NPR".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(wallet.available_balance(), dec!(900.00));

        let summary = BalanceSummary::from(&wallet);
        assert_eq!(summary.available_balance, dec!(900.00));
        assert_eq!(summary.currency, "NPR");
    }
}
