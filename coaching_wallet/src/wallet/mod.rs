//! Wallet module: balances, transaction history, top-ups with bonus
//! tiers, and the service tying the ledger and reservation layers
//! together.

pub mod errors;
pub mod models;
pub mod service;

pub use errors::{WalletError, WalletResult};
pub use models::{
    BalanceSummary, TopupReceipt, TransactionType, UserId, Wallet, WalletTransaction,
};
pub use service::{SettlementOutcome, WalletService};
