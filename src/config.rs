// Runtime settings loaded from the environment
//
// Tax rate and delivery fee are supplied as already-resolved flat values;
// jurisdiction lookup is out of scope for this service.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Default tax rate applied to the taxable amount (8.25%)
const DEFAULT_TAX_RATE: &str = "0.0825";

/// Default flat delivery fee in dollars
const DEFAULT_DELIVERY_FEE: &str = "5.00";

/// Default bound on waiting for a slot lock before failing fast
const DEFAULT_SLOT_LOCK_WAIT_MS: u64 = 250;

/// Application settings shared by the pricing engine and the slot store
#[derive(Debug, Clone)]
pub struct Settings {
    /// Flat tax rate as a fraction (0.0825 = 8.25%)
    pub tax_rate: Decimal,
    /// Flat fee added to delivery orders
    pub delivery_fee: Decimal,
    /// Maximum time a caller waits on a per-slot lock before the operation
    /// fails with SlotUnavailable
    pub slot_lock_wait: Duration,
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults
    ///
    /// Recognized variables: TAX_RATE, DELIVERY_FEE, SLOT_LOCK_WAIT_MS.
    /// Unparseable values are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self {
            tax_rate: decimal_env("TAX_RATE", DEFAULT_TAX_RATE),
            delivery_fee: decimal_env("DELIVERY_FEE", DEFAULT_DELIVERY_FEE),
            slot_lock_wait: Duration::from_millis(
                std::env::var("SLOT_LOCK_WAIT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SLOT_LOCK_WAIT_MS),
            ),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::from_str(DEFAULT_TAX_RATE).unwrap(),
            delivery_fee: Decimal::from_str(DEFAULT_DELIVERY_FEE).unwrap(),
            slot_lock_wait: Duration::from_millis(DEFAULT_SLOT_LOCK_WAIT_MS),
        }
    }
}

/// Read a Decimal environment variable with a default
fn decimal_env(name: &str, default: &str) -> Decimal {
    match std::env::var(name) {
        Ok(raw) => Decimal::from_str(&raw).unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value '{}', using default {}", name, raw, default);
            Decimal::from_str(default).unwrap()
        }),
        Err(_) => Decimal::from_str(default).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.tax_rate, dec!(0.0825));
        assert_eq!(settings.delivery_fee, dec!(5.00));
        assert_eq!(settings.slot_lock_wait, Duration::from_millis(250));
    }
}
