use std::env;

/// Deployment-level settings, read once at startup by the embedding service.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_path: String,
    pub stripe_secret_key: Option<String>,
    /// Timeout for payment platform calls. A timed-out refund becomes a
    /// failed conversion outcome, never an indefinite hang.
    pub payment_timeout_secs: u64,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let payment_timeout_secs = env::var("KICKBACK_PAYMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        Self {
            database_path: env::var("KICKBACK_DATABASE_PATH")
                .unwrap_or_else(|_| "kickback.db".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok(),
            payment_timeout_secs,
        }
    }
}

/// Keys in the durable `engine_config` table, used for seeding new-code
/// defaults. Values are tunable at runtime without a redeploy.
pub mod keys {
    pub const DEFAULT_DISCOUNT_CENTS: &str = "default_discount_cents";
    pub const DEFAULT_DISCOUNT_PERCENT: &str = "default_discount_percent";
    pub const DEFAULT_REWARD_CENTS: &str = "default_reward_cents";
    pub const DEFAULT_REWARD_PERCENT: &str = "default_reward_percent";
}

/// Fallbacks used when a key has never been written.
pub mod defaults {
    pub const DEFAULT_DISCOUNT_CENTS: i64 = 1000;
    pub const DEFAULT_DISCOUNT_PERCENT: i64 = 10;
    pub const DEFAULT_REWARD_CENTS: i64 = 1000;
    pub const DEFAULT_REWARD_PERCENT: i64 = 10;
}
