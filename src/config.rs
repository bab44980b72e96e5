//! Configuration for throttling.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Throttler`](crate::Throttler).
///
/// The only required field is `rate_per_second`; the remaining fields have
/// defaults suitable for per-item limiting. Capacity units are whatever the
/// caller's cost function measures: items, bytes, request weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Target sustained throughput in capacity units per second.
    pub rate_per_second: f64,

    /// Granularity at which refills are computed.
    ///
    /// Smaller intervals give finer timing at the cost of more refill
    /// computations.
    #[serde(default = "default_tic_interval")]
    pub tic_interval: Duration,

    /// Multiplier on the per-tic refill used to seed the starting token
    /// count. The allowed initial burst is
    /// `rate_per_second * tic_interval * initial_bucket_size`.
    #[serde(default = "default_initial_bucket_size")]
    pub initial_bucket_size: f64,
}

fn default_tic_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_initial_bucket_size() -> f64 {
    1.0
}

impl ThrottleConfig {
    /// Create a configuration at the given rate with default tic interval
    /// and initial bucket size.
    #[must_use]
    pub fn new(rate_per_second: f64) -> Self {
        Self {
            rate_per_second,
            tic_interval: default_tic_interval(),
            initial_bucket_size: default_initial_bucket_size(),
        }
    }

    /// Set the tic interval.
    #[must_use]
    pub fn with_tic_interval(mut self, tic_interval: Duration) -> Self {
        self.tic_interval = tic_interval;
        self
    }

    /// Set the initial bucket size multiplier.
    #[must_use]
    pub fn with_initial_bucket_size(mut self, multiplier: f64) -> Self {
        self.initial_bucket_size = multiplier;
        self
    }

    /// Refill credited per tic, in capacity units.
    #[must_use]
    pub fn tokens_per_tic(&self) -> f64 {
        self.rate_per_second * self.tic_interval.as_secs_f64()
    }

    /// Token count the bucket starts with.
    #[must_use]
    pub fn initial_tokens(&self) -> f64 {
        self.tokens_per_tic() * self.initial_bucket_size
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.rate_per_second.is_finite() || self.rate_per_second <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_per_second",
                message: format!("must be positive, got {}", self.rate_per_second),
            });
        }

        if self.tic_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "tic_interval",
                message: "must be greater than zero".to_string(),
            });
        }

        if !self.initial_bucket_size.is_finite() || self.initial_bucket_size < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_bucket_size",
                message: format!("must be non-negative, got {}", self.initial_bucket_size),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ThrottleConfig::new(100.0);
        assert_eq!(config.rate_per_second, 100.0);
        assert_eq!(config.tic_interval, Duration::from_millis(10));
        assert_eq!(config.initial_bucket_size, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ThrottleConfig::new(50.0)
            .with_tic_interval(Duration::from_millis(100))
            .with_initial_bucket_size(4.0);

        assert_eq!(config.tic_interval, Duration::from_millis(100));
        assert_eq!(config.tokens_per_tic(), 5.0);
        assert_eq!(config.initial_tokens(), 20.0);
    }

    #[test]
    fn test_config_rejects_non_positive_rate() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = ThrottleConfig::new(rate).validate().unwrap_err();
            assert_eq!(err.field(), "rate_per_second");
        }
    }

    #[test]
    fn test_config_rejects_zero_tic_interval() {
        let err = ThrottleConfig::new(10.0)
            .with_tic_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), "tic_interval");
    }

    #[test]
    fn test_config_rejects_negative_bucket_size() {
        let err = ThrottleConfig::new(10.0)
            .with_initial_bucket_size(-0.5)
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), "initial_bucket_size");
    }

    #[test]
    fn test_config_from_toml_applies_defaults() {
        let config: ThrottleConfig = toml::from_str("rate_per_second = 250.0").unwrap();
        assert_eq!(config.rate_per_second, 250.0);
        assert_eq!(config.tic_interval, Duration::from_millis(10));
        assert_eq!(config.initial_bucket_size, 1.0);
    }

    #[test]
    fn test_config_from_toml_full() {
        let config: ThrottleConfig = toml::from_str(
            r#"
            rate_per_second = 8.0
            tic_interval = { secs = 0, nanos = 500000000 }
            initial_bucket_size = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.tic_interval, Duration::from_millis(500));
        assert_eq!(config.tokens_per_tic(), 4.0);
        assert_eq!(config.initial_tokens(), 8.0);
    }

    #[test]
    fn test_config_missing_rate_is_a_parse_error() {
        assert!(toml::from_str::<ThrottleConfig>("initial_bucket_size = 2.0").is_err());
    }
}
