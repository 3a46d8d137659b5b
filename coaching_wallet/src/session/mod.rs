//! Billable session module: reservation engine and session models.
//!
//! A session's financial lifecycle is a strict state machine:
//!
//! ```text
//! reserved -> active -> completed -> refunded
//!     \          |
//!      \         v
//!       +--> cancelled
//! ```
//!
//! `cancelled` and `refunded` are terminal; no transition skips a
//! state. Funds move in three steps: `reserve` earmarks them in
//! `reserved_balance`, `complete` converts the hold into a permanent
//! `charge`, and `cancel`/`refund` give them back.

pub mod engine;
pub mod models;

pub use engine::ReservationEngine;
pub use models::{BillableSession, ReserveRequest, SessionKind, SessionStatus, VoiceMode};
