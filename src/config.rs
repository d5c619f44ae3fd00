use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

// ============================================================================
// Platform Configuration
// ============================================================================

/// Deploy-time knobs, loaded once at startup from `PLATTER_*` environment
/// variables. Everything that changes at runtime (the commission rate) lives
/// in the settings document instead, so it can move without a redeploy.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Flat delivery fee added to every order.
    pub delivery_fee: Decimal,
    /// Per-unit platform markup shown in the cart.
    pub item_markup: Decimal,
    /// Shared secret for the developer console. `None` disables the prompt.
    pub developer_secret: Option<String>,
    /// Upper bound on any single store operation.
    pub op_timeout: Duration,
    /// Port for the metrics exposition server.
    pub metrics_port: u16,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            delivery_fee: Decimal::from(7),
            item_markup: Decimal::ONE,
            developer_secret: None,
            op_timeout: Duration::from_secs(10),
            metrics_port: 9090,
        }
    }
}

impl PlatformConfig {
    /// Reads configuration from the environment, keeping the default for any
    /// variable that is unset or unreadable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            delivery_fee: read_env("PLATTER_DELIVERY_FEE", defaults.delivery_fee),
            item_markup: read_env("PLATTER_ITEM_MARKUP", defaults.item_markup),
            developer_secret: env::var("PLATTER_DEV_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            op_timeout: Duration::from_millis(read_env(
                "PLATTER_OP_TIMEOUT_MS",
                defaults.op_timeout.as_millis() as u64,
            )),
            metrics_port: read_env("PLATTER_METRICS_PORT", defaults.metrics_port),
        }
    }
}

fn read_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(%key, %raw, "unreadable config value, keeping default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_platform_fee_schedule() {
        let config = PlatformConfig::default();
        assert_eq!(config.delivery_fee, Decimal::from(7));
        assert_eq!(config.item_markup, Decimal::ONE);
        assert_eq!(config.developer_secret, None);
        assert_eq!(config.op_timeout, Duration::from_secs(10));
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn env_overrides_apply_and_bad_values_fall_back() {
        // One test owns all PLATTER_* variables to avoid races between
        // parallel tests mutating the process environment.
        env::set_var("PLATTER_DELIVERY_FEE", "5.50");
        env::set_var("PLATTER_ITEM_MARKUP", "not-a-number");
        env::set_var("PLATTER_DEV_SECRET", "  ");
        env::set_var("PLATTER_OP_TIMEOUT_MS", "2500");

        let config = PlatformConfig::from_env();
        assert_eq!(config.delivery_fee, Decimal::new(550, 2));
        assert_eq!(config.item_markup, Decimal::ONE);
        assert_eq!(config.developer_secret, None);
        assert_eq!(config.op_timeout, Duration::from_millis(2500));

        env::remove_var("PLATTER_DELIVERY_FEE");
        env::remove_var("PLATTER_ITEM_MARKUP");
        env::remove_var("PLATTER_DEV_SECRET");
        env::remove_var("PLATTER_OP_TIMEOUT_MS");
    }
}
