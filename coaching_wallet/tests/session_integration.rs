//! Integration tests for the reservation engine: the session state
//! machine, fund movement across reserve/complete/cancel/refund,
//! settlement, and concurrency safety.
//!
//! These tests need a PostgreSQL instance with the schema from
//! `migrations/` applied; point `DATABASE_URL` at it and run with
//! `cargo test -- --ignored`.

use coaching_wallet::costs::BillingConfig;
use coaching_wallet::db::{Database, DatabaseConfig};
use coaching_wallet::payment::StaticPaymentProvider;
use coaching_wallet::session::{ReserveRequest, SessionKind, SessionStatus, VoiceMode};
use coaching_wallet::wallet::{WalletError, WalletService};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Generate a unique test user id
fn unique_user_id() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap()
}

/// Helper to create a test database pool
async fn setup_test_db() -> Arc<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/coaching_wallet_test".to_string());

    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");

    Arc::new(db.pool().clone())
}

/// Helper to create the wallet service under test
async fn setup_service() -> (WalletService, Arc<PgPool>) {
    let pool = setup_test_db().await;
    let service = WalletService::new(
        pool.clone(),
        BillingConfig::default(),
        Arc::new(StaticPaymentProvider::default()),
    );
    (service, pool)
}

/// Helper to cleanup a test user's wallet data
async fn cleanup_user(pool: &PgPool, user_id: i64) {
    let _ = sqlx::query("DELETE FROM billable_sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM wallet_transactions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM user_wallets WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await;
}

/// Helper to build a standard voice reservation request
fn voice_request(user_id: i64, cost: Decimal) -> ReserveRequest {
    ReserveRequest {
        user_id,
        session_id: Uuid::new_v4(),
        kind: SessionKind::Voice,
        mode: Some(VoiceMode::Standard),
        duration_minutes: 30,
        cost,
        description: None,
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_reserve_earmarks_funds() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(1000.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    let session = service
        .reserve(voice_request(user_id, dec!(200.00)))
        .await
        .expect("Reserve should succeed");

    assert_eq!(session.status, SessionStatus::Reserved);
    assert!(session.reserved_at.is_some());
    assert!(session.transaction_id.is_some());

    // Balance untouched, hold reduces what's available
    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(1100.00));
    assert_eq!(summary.reserved_balance, dec!(200.00));
    assert_eq!(summary.available_balance, dec!(900.00));

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_reserve_rejects_insufficient_available_balance() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(100.00), "pm_test_card")
        .await
        .expect("Topup should succeed");
    service
        .reserve(voice_request(user_id, dec!(80.00)))
        .await
        .expect("First reserve should succeed");

    // 20 available, not 100
    let result = service.reserve(voice_request(user_id, dec!(50.00))).await;
    match result {
        Err(WalletError::InsufficientFunds {
            available,
            required,
        }) => {
            assert_eq!(available, dec!(20.00));
            assert_eq!(required, dec!(50.00));
        }
        other => panic!("Expected InsufficientFunds, got {other:?}"),
    }

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_full_lifecycle_reserve_to_refund() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(1000.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    let session = service
        .reserve(voice_request(user_id, dec!(200.00)))
        .await
        .expect("Reserve should succeed");

    let session = service
        .activate(session.session_id)
        .await
        .expect("Activate should succeed");
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.started_at.is_some());

    let session = service
        .complete(session.session_id)
        .await
        .expect("Complete should succeed");
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.charged_amount, Some(dec!(200.00)));

    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(900.00));
    assert_eq!(summary.reserved_balance, Decimal::ZERO);

    let session = service
        .refund(session.session_id, Some(dec!(50.00)))
        .await
        .expect("Refund should succeed");
    assert_eq!(session.status, SessionStatus::Refunded);
    assert!(session.refunded_at.is_some());

    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(950.00));

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_cancel_releases_hold_without_charging() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(500.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    let session = service
        .reserve(voice_request(user_id, dec!(120.00)))
        .await
        .expect("Reserve should succeed");

    let session = service
        .cancel(session.session_id)
        .await
        .expect("Cancel should succeed");
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session.cancelled_at.is_some());
    assert_eq!(session.charged_amount, None);

    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(500.00));
    assert_eq!(summary.reserved_balance, Decimal::ZERO);

    // Cancelling from active works too
    let session = service
        .reserve(voice_request(user_id, dec!(120.00)))
        .await
        .expect("Reserve should succeed");
    service
        .activate(session.session_id)
        .await
        .expect("Activate should succeed");
    let session = service
        .cancel(session.session_id)
        .await
        .expect("Cancel from active should succeed");
    assert_eq!(session.status, SessionStatus::Cancelled);

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_invalid_transitions_are_rejected() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(500.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    let session = service
        .reserve(voice_request(user_id, dec!(100.00)))
        .await
        .expect("Reserve should succeed");
    let session_id = session.session_id;

    // No skipping reserved -> completed
    let result = service.complete(session_id).await;
    assert!(matches!(
        result,
        Err(WalletError::InvalidState {
            status: SessionStatus::Reserved,
            ..
        })
    ));

    // No refund before completion
    let result = service.refund(session_id, None).await;
    assert!(matches!(result, Err(WalletError::InvalidState { .. })));

    service.cancel(session_id).await.expect("Cancel should succeed");

    // Terminal states admit nothing
    let result = service.activate(session_id).await;
    assert!(matches!(
        result,
        Err(WalletError::InvalidState {
            status: SessionStatus::Cancelled,
            ..
        })
    ));
    let result = service.cancel(session_id).await;
    assert!(matches!(result, Err(WalletError::InvalidState { .. })));

    // Balances untouched by all the rejected attempts
    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(500.00));
    assert_eq!(summary.reserved_balance, Decimal::ZERO);

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_refund_capped_at_charged_amount() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(500.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    let session = service
        .reserve(voice_request(user_id, dec!(100.00)))
        .await
        .expect("Reserve should succeed");
    service
        .activate(session.session_id)
        .await
        .expect("Activate should succeed");
    service
        .complete(session.session_id)
        .await
        .expect("Complete should succeed");

    let result = service.refund(session.session_id, Some(dec!(100.01))).await;
    assert!(matches!(result, Err(WalletError::InvalidAmount(_))));

    let result = service.refund(session.session_id, Some(Decimal::ZERO)).await;
    assert!(matches!(result, Err(WalletError::InvalidAmount(_))));

    // Omitted amount defaults to the full charge
    let session = service
        .refund(session.session_id, None)
        .await
        .expect("Full refund should succeed");
    assert_eq!(session.status, SessionStatus::Refunded);

    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(500.00));

    // Refunded is terminal, no second refund
    let result = service.refund(session.session_id, None).await;
    assert!(matches!(result, Err(WalletError::InvalidState { .. })));

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_get_session_not_found() {
    let (service, _pool) = setup_service().await;

    let result = service.get_session(Uuid::new_v4()).await;
    assert!(matches!(result, Err(WalletError::SessionNotFound(_))));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_settle_refunds_unused_minutes() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(500.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    // Voice standard at 2.00/min, reserved for 30 minutes
    let session = service
        .reserve(voice_request(user_id, dec!(60.00)))
        .await
        .expect("Reserve should succeed");
    service
        .activate(session.session_id)
        .await
        .expect("Activate should succeed");

    let outcome = service
        .settle(session.session_id, 20)
        .await
        .expect("Settle should succeed");

    assert_eq!(outcome.reserved_amount, dec!(60.00));
    assert_eq!(outcome.actual_cost, dec!(40.00));
    assert_eq!(outcome.refunded_amount, dec!(20.00));
    assert_eq!(outcome.session.status, SessionStatus::Refunded);

    // Net debit is the actual cost only
    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(460.00));
    assert_eq!(summary.reserved_balance, Decimal::ZERO);

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_settle_full_duration_charges_everything() {
    let (service, pool) = setup_service().await;
    let user_id = unique_user_id();

    service
        .topup(user_id, dec!(500.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    // Still in reserved: settle activates on the way through. Overruns
    // are capped at the reserved amount.
    let session = service
        .reserve(voice_request(user_id, dec!(60.00)))
        .await
        .expect("Reserve should succeed");

    let outcome = service
        .settle(session.session_id, 45)
        .await
        .expect("Settle should succeed");

    assert_eq!(outcome.actual_cost, dec!(60.00));
    assert_eq!(outcome.refunded_amount, Decimal::ZERO);
    assert_eq!(outcome.session.status, SessionStatus::Completed);

    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.balance, dec!(440.00));

    cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_concurrent_reserves_cannot_overdraw() {
    let (service, pool) = setup_service().await;
    let service = Arc::new(service);
    let user_id = unique_user_id();

    // 100 available; two 60-cost reservations cannot both fit
    service
        .topup(user_id, dec!(100.00), "pm_test_card")
        .await
        .expect("Topup should succeed");

    let mut handles = vec![];
    for _ in 0..2 {
        let svc = service.clone();
        handles.push(tokio::spawn(async move {
            svc.reserve(voice_request(user_id, dec!(60.00))).await
        }));
    }

    let mut success_count = 0;
    let mut insufficient_count = 0;
    for handle in handles {
        match handle.await.expect("Task should complete") {
            Ok(_) => success_count += 1,
            Err(WalletError::InsufficientFunds { .. }) => insufficient_count += 1,
            Err(e) => panic!("Unexpected error: {e:?}"),
        }
    }

    assert_eq!(success_count, 1, "Exactly one reservation should win");
    assert_eq!(insufficient_count, 1);

    let summary = service.get_balance(user_id).await.expect("Should get balance");
    assert_eq!(summary.reserved_balance, dec!(60.00));
    assert_eq!(summary.available_balance, dec!(40.00));

    cleanup_user(&pool, user_id).await;
}
