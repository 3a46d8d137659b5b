//! Payment collaborator interface.
//!
//! The wallet service trusts an external payment system to validate
//! payment methods and execute the real-money side of a top-up. The
//! trait keeps that system behind a seam so tests and development run
//! without it.

use crate::wallet::WalletResult;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// External payment collaborator
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Whether the payment method identifier is recognized
    async fn verify_payment_method(&self, payment_method_id: &str) -> WalletResult<bool>;

    /// Execute the external charge backing a top-up. The wallet
    /// service trusts the success/failure result.
    async fn execute_charge(
        &self,
        payment_method_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> WalletResult<()>;
}

/// Allow-list payment provider for development and tests.
///
/// Accepts any payment method whose identifier starts with one of the
/// configured prefixes and treats every charge as successful.
pub struct StaticPaymentProvider {
    allowed_prefixes: Vec<String>,
}

impl StaticPaymentProvider {
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }
}

impl Default for StaticPaymentProvider {
    fn default() -> Self {
        Self::new(vec!["pm_".to_string(), "test_".to_string()])
    }
}

#[async_trait]
impl PaymentProvider for StaticPaymentProvider {
    async fn verify_payment_method(&self, payment_method_id: &str) -> WalletResult<bool> {
        Ok(self
            .allowed_prefixes
            .iter()
            .any(|prefix| payment_method_id.starts_with(prefix)))
    }

    async fn execute_charge(
        &self,
        payment_method_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> WalletResult<()> {
        log::debug!("static provider charged {amount} {currency} via {payment_method_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_checks_prefixes() {
        let provider = StaticPaymentProvider::default();
        assert!(provider.verify_payment_method("pm_123").await.unwrap());
        assert!(provider.verify_payment_method("test_init").await.unwrap());
        assert!(!provider.verify_payment_method("card-999").await.unwrap());
    }
}
