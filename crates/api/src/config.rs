//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use checkout::{CheckoutConfig, WebhookConfig};
use domain::Money;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `APP_ENV`: deployment environment (default: `"production"`)
/// - `DATABASE_URL`: Postgres connection string; the in-memory store is used when unset
/// - `PAYMENT_WEBHOOK_SECRET`: shared secret for payment notification signatures
/// - `ALLOW_UNSIGNED_WEBHOOKS`: accept unsigned notifications outside production (default: `false`)
/// - `CHECKOUT_CURRENCY`: authorization currency (default: `"usd"`)
/// - `GATEWAY_TIMEOUT_MS`: upper bound per payment gateway call (default: `10000`)
/// - `PRICE_DRIFT_EPSILON_CENTS`: tolerated price drift (default: `1`)
/// - `ORDER_NUMBER_ATTEMPTS`: order number allocation attempts (default: `5`)
/// - `PENDING_ORDER_TTL_SECS`: age at which pending orders expire (default: `1800`)
/// - `EXPIRY_SWEEP_INTERVAL_SECS`: expiry sweep period, `0` disables it (default: `60`)
/// - `CATALOG_SEED_FILE`: JSON array of catalog items loaded at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub environment: String,
    pub database_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub allow_unsigned_webhooks: bool,
    pub currency: String,
    pub gateway_timeout: Duration,
    pub price_drift_epsilon_cents: i64,
    pub order_number_attempts: u32,
    pub pending_order_ttl: Duration,
    pub expiry_sweep_interval: Duration,
    pub catalog_seed_file: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset. Values that fail to parse fall back to
    /// the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| non_empty(&lookup, key);
        let defaults = Self::default();

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: get("LOG_FORMAT")
                .map(|value| LogFormat::parse(&value))
                .unwrap_or(defaults.log_format),
            environment: get("APP_ENV").unwrap_or(defaults.environment),
            database_url: get("DATABASE_URL"),
            webhook_secret: get("PAYMENT_WEBHOOK_SECRET"),
            allow_unsigned_webhooks: get("ALLOW_UNSIGNED_WEBHOOKS")
                .map(|value| parse_flag(&value))
                .unwrap_or(defaults.allow_unsigned_webhooks),
            currency: get("CHECKOUT_CURRENCY")
                .map(|value| value.to_lowercase())
                .unwrap_or(defaults.currency),
            gateway_timeout: parse_var(&lookup, "GATEWAY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.gateway_timeout),
            price_drift_epsilon_cents: parse_var(&lookup, "PRICE_DRIFT_EPSILON_CENTS")
                .unwrap_or(defaults.price_drift_epsilon_cents),
            order_number_attempts: parse_var(&lookup, "ORDER_NUMBER_ATTEMPTS")
                .unwrap_or(defaults.order_number_attempts),
            pending_order_ttl: parse_var(&lookup, "PENDING_ORDER_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pending_order_ttl),
            expiry_sweep_interval: parse_var(&lookup, "EXPIRY_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry_sweep_interval),
            catalog_seed_file: get("CATALOG_SEED_FILE").map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true unless `APP_ENV` names a development environment.
    pub fn is_production(&self) -> bool {
        !matches!(
            self.environment.to_ascii_lowercase().as_str(),
            "development" | "dev" | "local" | "test"
        )
    }

    /// Settings for the checkout coordinator.
    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig::default()
            .with_currency(self.currency.clone())
            .with_price_drift_epsilon(Money::from_cents(self.price_drift_epsilon_cents.max(0)))
            .with_gateway_timeout(self.gateway_timeout)
            .with_order_number_attempts(self.order_number_attempts)
            .with_pending_order_ttl(self.pending_order_ttl)
    }

    /// Settings for payment notification verification.
    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            secret: self.webhook_secret.clone(),
            allow_unsigned: self.allow_unsigned_webhooks,
            production: self.is_production(),
            ..WebhookConfig::default()
        }
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    non_empty(lookup, key).and_then(|value| value.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Default for Config {
    fn default() -> Self {
        let checkout = CheckoutConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            environment: "production".to_string(),
            database_url: None,
            webhook_secret: None,
            allow_unsigned_webhooks: false,
            currency: checkout.currency,
            gateway_timeout: checkout.gateway_timeout,
            price_drift_epsilon_cents: checkout.price_drift_epsilon.cents(),
            order_number_attempts: checkout.order_number_attempts,
            pending_order_ttl: checkout.pending_order_ttl,
            expiry_sweep_interval: Duration::from_secs(60),
            catalog_seed_file: None,
        }
    }
}
