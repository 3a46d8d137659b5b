//! Wallet error types.

use crate::session::SessionStatus;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reservation requested beyond available balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    /// Session state machine transition attempted from a non-permitted state
    #[error("Session {session_id} is {status}, cannot {attempted}")]
    InvalidState {
        session_id: Uuid,
        status: SessionStatus,
        attempted: &'static str,
    },

    /// Non-positive amount, over-refund, or unrecognized payment method
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Concurrent-write conflict detected by the ledger store
    #[error("Write conflict: {0}")]
    Consistency(String),

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(i64),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database and write-conflict details are sanitized, and user IDs
    /// are redacted.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) => "Internal server error".to_string(),
            WalletError::Consistency(_) => "Concurrent update, please retry".to_string(),
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the caller may transparently retry the operation.
    ///
    /// Only write conflicts are safe to re-read and reapply; every
    /// other error is surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Consistency(_))
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn client_message_sanitizes_internals() {
        let err = WalletError::Consistency("balance drift on wallet abc".to_string());
        assert_eq!(err.client_message(), "Concurrent update, please retry");

        let err = WalletError::WalletNotFound(42);
        assert!(!err.client_message().contains("42"));
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(WalletError::Consistency("x".to_string()).is_retryable());
        assert!(
            !WalletError::InsufficientFunds {
                available: dec!(10),
                required: dec!(20),
            }
            .is_retryable()
        );
        assert!(!WalletError::InvalidAmount("-1".to_string()).is_retryable());
    }
}
