//! Checkout tunables.

use std::time::Duration;

use domain::Money;

/// Settings for the checkout coordinator.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Currency used for payment authorizations.
    pub currency: String,

    /// Largest allowed difference between the captured and current price.
    pub price_drift_epsilon: Money,

    /// Upper bound for each payment gateway call.
    pub gateway_timeout: Duration,

    /// Attempts at allocating a unique order number.
    pub order_number_attempts: u32,

    /// Attempts at settling an order when a concurrent write wins.
    pub settle_attempts: u32,

    /// Attempts at creating or mutating the active cart under contention.
    pub active_cart_attempts: u32,

    /// Age after which a pending order is expired.
    pub pending_order_ttl: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            price_drift_epsilon: Money::from_cents(1),
            gateway_timeout: Duration::from_secs(10),
            order_number_attempts: 5,
            settle_attempts: 3,
            active_cart_attempts: 3,
            pending_order_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl CheckoutConfig {
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_price_drift_epsilon(mut self, epsilon: Money) -> Self {
        self.price_drift_epsilon = epsilon;
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn with_order_number_attempts(mut self, attempts: u32) -> Self {
        self.order_number_attempts = attempts.max(1);
        self
    }

    pub fn with_pending_order_ttl(mut self, ttl: Duration) -> Self {
        self.pending_order_ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckoutConfig::default();
        assert_eq!(config.currency, "usd");
        assert_eq!(config.price_drift_epsilon.cents(), 1);
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.order_number_attempts, 5);
        assert_eq!(config.pending_order_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_builders() {
        let config = CheckoutConfig::default()
            .with_currency("eur")
            .with_order_number_attempts(0)
            .with_gateway_timeout(Duration::from_millis(50));

        assert_eq!(config.currency, "eur");
        assert_eq!(config.order_number_attempts, 1);
        assert_eq!(config.gateway_timeout, Duration::from_millis(50));
    }
}
