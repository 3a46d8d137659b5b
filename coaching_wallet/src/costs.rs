//! Pricing configuration: per-minute session rates, duration bounds,
//! and top-up bonus tiers.
//!
//! Thresholds and rates are configuration with platform defaults, not
//! hard-coded business law. Every value can be overridden through
//! environment variables.

use crate::session::{SessionKind, VoiceMode};
use crate::wallet::{WalletError, WalletResult};
use rust_decimal::Decimal;

/// A single top-up bonus tier: top-ups at or above `threshold` earn
/// `percentage` percent extra credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BonusTier {
    pub threshold: Decimal,
    pub percentage: Decimal,
}

/// Per-minute session rates and duration bounds
#[derive(Debug, Clone)]
pub struct SessionRates {
    pub voice_standard_per_minute: Decimal,
    pub voice_realtime_per_minute: Decimal,
    pub video_per_minute: Decimal,
    pub min_voice_minutes: i32,
    pub max_voice_minutes: i32,
    pub min_video_minutes: i32,
    pub max_video_minutes: i32,
}

impl SessionRates {
    /// Per-minute rate for a session kind and voice mode. Voice
    /// sessions without an explicit mode bill at the standard rate.
    pub fn rate_per_minute(&self, kind: SessionKind, mode: Option<VoiceMode>) -> Decimal {
        match kind {
            SessionKind::Voice => match mode.unwrap_or(VoiceMode::Standard) {
                VoiceMode::Standard => self.voice_standard_per_minute,
                VoiceMode::Realtime => self.voice_realtime_per_minute,
            },
            SessionKind::Video => self.video_per_minute,
        }
    }

    /// Compute the cost of a session, validating the duration bounds
    /// for the session kind.
    pub fn cost_for(
        &self,
        kind: SessionKind,
        mode: Option<VoiceMode>,
        duration_minutes: i32,
    ) -> WalletResult<Decimal> {
        let (min, max) = match kind {
            SessionKind::Voice => (self.min_voice_minutes, self.max_voice_minutes),
            SessionKind::Video => (self.min_video_minutes, self.max_video_minutes),
        };
        if duration_minutes < min {
            return Err(WalletError::InvalidAmount(format!(
                "duration must be at least {min} minutes"
            )));
        }
        if duration_minutes > max {
            return Err(WalletError::InvalidAmount(format!(
                "duration must not exceed {max} minutes"
            )));
        }

        Ok(self.rate_per_minute(kind, mode) * Decimal::from(duration_minutes))
    }
}

impl Default for SessionRates {
    fn default() -> Self {
        Self {
            voice_standard_per_minute: Decimal::new(200, 2),  // 2.00 NPR
            voice_realtime_per_minute: Decimal::new(4000, 2), // 40.00 NPR
            video_per_minute: Decimal::new(1500, 2),          // 15.00 NPR
            min_voice_minutes: 5,
            max_voice_minutes: 60,
            min_video_minutes: 10,
            max_video_minutes: 120,
        }
    }
}

/// Billing configuration: wallet currency, bonus tiers, session rates
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub currency: String,
    /// Bonus tiers sorted by ascending threshold; the highest
    /// matching tier wins.
    pub bonus_tiers: Vec<BonusTier>,
    pub rates: SessionRates,
}

impl BillingConfig {
    /// Load configuration from environment variables, falling back to
    /// platform defaults (10% at 1000 NPR, 20% at 2000 NPR).
    ///
    /// Environment variables:
    /// - `WALLET_CURRENCY` (default: `NPR`)
    /// - `TOPUP_BONUS_TIER_1_AMOUNT` / `TOPUP_BONUS_TIER_1_PERCENTAGE`
    /// - `TOPUP_BONUS_TIER_2_AMOUNT` / `TOPUP_BONUS_TIER_2_PERCENTAGE`
    /// - `VOICE_STANDARD_COST_PER_MINUTE`, `VOICE_REALTIME_COST_PER_MINUTE`,
    ///   `VIDEO_COST_PER_MINUTE`
    pub fn from_env() -> Self {
        let mut bonus_tiers = vec![
            BonusTier {
                threshold: parse_env_or("TOPUP_BONUS_TIER_1_AMOUNT", Decimal::from(1000)),
                percentage: parse_env_or("TOPUP_BONUS_TIER_1_PERCENTAGE", Decimal::from(10)),
            },
            BonusTier {
                threshold: parse_env_or("TOPUP_BONUS_TIER_2_AMOUNT", Decimal::from(2000)),
                percentage: parse_env_or("TOPUP_BONUS_TIER_2_PERCENTAGE", Decimal::from(20)),
            },
        ];
        bonus_tiers.sort_by(|a, b| a.threshold.cmp(&b.threshold));

        let defaults = SessionRates::default();
        let rates = SessionRates {
            voice_standard_per_minute: parse_env_or(
                "VOICE_STANDARD_COST_PER_MINUTE",
                defaults.voice_standard_per_minute,
            ),
            voice_realtime_per_minute: parse_env_or(
                "VOICE_REALTIME_COST_PER_MINUTE",
                defaults.voice_realtime_per_minute,
            ),
            video_per_minute: parse_env_or("VIDEO_COST_PER_MINUTE", defaults.video_per_minute),
            min_voice_minutes: parse_env_or("MIN_VOICE_SESSION_MINUTES", defaults.min_voice_minutes),
            max_voice_minutes: parse_env_or("MAX_VOICE_SESSION_MINUTES", defaults.max_voice_minutes),
            min_video_minutes: parse_env_or("MIN_VIDEO_SESSION_MINUTES", defaults.min_video_minutes),
            max_video_minutes: parse_env_or("MAX_VIDEO_SESSION_MINUTES", defaults.max_video_minutes),
        };

        Self {
            currency: std::env::var("WALLET_CURRENCY").unwrap_or_else(|_| "NPR".to_string()),
            bonus_tiers,
            rates,
        }
    }

    /// Bonus percentage for a top-up amount: the highest tier whose
    /// threshold the amount reaches, or zero.
    pub fn bonus_percentage_for(&self, amount: Decimal) -> Decimal {
        self.bonus_tiers
            .iter()
            .rev()
            .find(|tier| amount >= tier.threshold)
            .map(|tier| tier.percentage)
            .unwrap_or(Decimal::ZERO)
    }

    /// Bonus amount for a top-up, rounded to two decimal places.
    pub fn bonus_amount_for(&self, amount: Decimal) -> Decimal {
        (amount * self.bonus_percentage_for(amount) / Decimal::from(100)).round_dp(2)
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: "NPR".to_string(),
            bonus_tiers: vec![
                BonusTier {
                    threshold: Decimal::from(1000),
                    percentage: Decimal::from(10),
                },
                BonusTier {
                    threshold: Decimal::from(2000),
                    percentage: Decimal::from(20),
                },
            ],
            rates: SessionRates::default(),
        }
    }
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
