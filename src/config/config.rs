use crate::core::services::ServiceSettings;
use dotenv::dotenv;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub jwt_secret: String,
    pub public_base_url: String,
    pub default_currency: String,
    pub settlement_fee_rate: Decimal,
    pub reconcile_max_attempts: u32,
    pub reconcile_backoff_ms: u64,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("jwt_secret", &"<redacted>")
            .field("public_base_url", &self.public_base_url)
            .field("default_currency", &self.default_currency)
            .field("settlement_fee_rate", &self.settlement_fee_rate)
            .field("reconcile_max_attempts", &self.reconcile_max_attempts)
            .field("reconcile_backoff_ms", &self.reconcile_backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            port: parsed("PORT", 8080),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
            settlement_fee_rate: parsed("SETTLEMENT_FEE_RATE", Decimal::new(2, 2)),
            reconcile_max_attempts: parsed("RECONCILE_MAX_ATTEMPTS", 3),
            reconcile_backoff_ms: parsed("RECONCILE_BACKOFF_MS", 50),
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", 30),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            public_base_url: self.public_base_url.trim_end_matches('/').to_string(),
            default_currency: self.default_currency.clone(),
            settlement_fee_rate: self.settlement_fee_rate,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            reconcile_max_attempts: self.reconcile_max_attempts.max(1),
            reconcile_backoff: Duration::from_millis(self.reconcile_backoff_ms),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
