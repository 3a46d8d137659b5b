//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use coaching_wallet::costs::BillingConfig;
use coaching_wallet::db::DatabaseConfig;
use rust_decimal::Decimal;
use std::net::SocketAddr;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus metrics bind address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Billing configuration (currency, bonus tiers, session rates)
    pub billing: BillingConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        // Bind address
        let bind = bind_override
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_else(|| {
                "127.0.0.1:8080"
                    .parse()
                    .expect("Default bind address is valid")
            });

        let metrics_bind = std::env::var("METRICS_BIND")
            .ok()
            .map(|s| {
                s.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("Not a valid socket address: {s}"),
                })
            })
            .transpose()?;

        // Database configuration (REQUIRED)
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "e.g. postgres://postgres@localhost/coaching_wallet".to_string(),
            })?;

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", 100),
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", 5),
            connection_timeout_secs: parse_env_or("DB_CONNECTION_TIMEOUT_SECS", 5),
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME_SECS", 1800),
        };

        let billing = BillingConfig::from_env();

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            billing,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.billing.currency.len() != 3 {
            return Err(ConfigError::Invalid {
                var: "WALLET_CURRENCY".to_string(),
                reason: format!(
                    "Must be a 3-letter ISO code, got {:?}",
                    self.billing.currency
                ),
            });
        }

        for tier in &self.billing.bonus_tiers {
            if tier.threshold <= Decimal::ZERO {
                return Err(ConfigError::Invalid {
                    var: "TOPUP_BONUS_TIER_*_AMOUNT".to_string(),
                    reason: "Tier thresholds must be greater than 0".to_string(),
                });
            }
            if tier.percentage < Decimal::ZERO || tier.percentage > Decimal::from(100) {
                return Err(ConfigError::Invalid {
                    var: "TOPUP_BONUS_TIER_*_PERCENTAGE".to_string(),
                    reason: "Tier percentages must be between 0 and 100".to_string(),
                });
            }
        }

        let rates = &self.billing.rates;
        for (var, rate) in [
            ("VOICE_STANDARD_COST_PER_MINUTE", rates.voice_standard_per_minute),
            ("VOICE_REALTIME_COST_PER_MINUTE", rates.voice_realtime_per_minute),
            ("VIDEO_COST_PER_MINUTE", rates.video_per_minute),
        ] {
            if rate <= Decimal::ZERO {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }
        }

        if rates.min_voice_minutes <= 0 || rates.max_voice_minutes <= rates.min_voice_minutes {
            return Err(ConfigError::Invalid {
                var: "MIN_VOICE_SESSION_MINUTES".to_string(),
                reason: format!(
                    "Voice duration bounds must satisfy 0 < min < max, got {}..{}",
                    rates.min_voice_minutes, rates.max_voice_minutes
                ),
            });
        }

        if rates.min_video_minutes <= 0 || rates.max_video_minutes <= rates.min_video_minutes {
            return Err(ConfigError::Invalid {
                var: "MIN_VIDEO_SESSION_MINUTES".to_string(),
                reason: format!(
                    "Video duration bounds must satisfy 0 < min < max, got {}..{}",
                    rates.min_video_minutes, rates.max_video_minutes
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coaching_wallet::costs::{BonusTier, SessionRates};

    fn base_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            metrics_bind: None,
            database: DatabaseConfig {
                database_url: "postgres://localhost/test".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_secs: 5,
                idle_timeout_secs: 300,
                max_lifetime_secs: 1800,
            },
            billing: BillingConfig::default(),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "DATABASE_URL".to_string(),
            hint: "Set a connection string".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DATABASE_URL"));
        assert!(msg.contains("Set a connection string"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_currency() {
        let mut config = base_config();
        config.billing.currency = "NEPALI".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_bad_tier_percentage() {
        let mut config = base_config();
        config.billing.bonus_tiers = vec![BonusTier {
            threshold: Decimal::from(1000),
            percentage: Decimal::from(150), // Invalid: over 100
        }];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_inverted_duration_bounds() {
        let mut config = base_config();
        config.billing.rates = SessionRates {
            min_voice_minutes: 60,
            max_voice_minutes: 5, // Invalid: max below min
            ..SessionRates::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
