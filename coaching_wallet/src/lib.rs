//! # Coaching Wallet
//!
//! Wallet and session billing library for the coaching platform.
//!
//! The library is organized around three layers, leaf to root:
//!
//! - [`ledger`]: durable storage of wallets and the append-only
//!   transaction log, with an atomicity guarantee for each paired
//!   balance update + transaction insert.
//! - [`session`]: the reservation engine managing the financial state
//!   machine of a billable coaching session
//!   (`reserved -> active -> completed`, with `cancelled` and
//!   `refunded` as terminal states).
//! - [`wallet`]: the public wallet service (balance queries, top-ups
//!   with bonus tiers, transaction history) built on top of the two.
//!
//! All monetary amounts are `rust_decimal::Decimal` backed by
//! `NUMERIC(10,2)` columns. Every mutating operation runs as a single
//! PostgreSQL transaction; a failed call leaves both the wallet row
//! and the transaction log untouched.
//!
//! ## Example
//!
//! ```no_run
//! use coaching_wallet::db::{Database, DatabaseConfig};
//! use coaching_wallet::payment::StaticPaymentProvider;
//! use coaching_wallet::wallet::WalletService;
//! use coaching_wallet::costs::BillingConfig;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let service = WalletService::new(
//!         Arc::new(db.pool().clone()),
//!         BillingConfig::from_env(),
//!         Arc::new(StaticPaymentProvider::default()),
//!     );
//!
//!     let receipt = service.topup(1, Decimal::from(1000), "pm_demo").await?;
//!     println!("balance after top-up: {}", receipt.balance_after);
//!     Ok(())
//! }
//! ```

/// Database connection pooling and configuration.
pub mod db;
pub use db::{Database, DatabaseConfig};

/// Durable wallet + transaction storage.
pub mod ledger;
pub use ledger::LedgerStore;

/// Billable session reservation engine.
pub mod session;
pub use session::{
    BillableSession, ReservationEngine, ReserveRequest, SessionKind, SessionStatus, VoiceMode,
};

/// Public wallet service, models, and errors.
pub mod wallet;
pub use wallet::{SettlementOutcome, WalletError, WalletResult, WalletService};

/// Payment collaborator interface.
pub mod payment;
pub use payment::{PaymentProvider, StaticPaymentProvider};

/// Pricing configuration: session rates and top-up bonus tiers.
pub mod costs;
pub use costs::{BillingConfig, BonusTier, SessionRates};
