//! # Overpass Module
//!
//! Talks to an Overpass interpreter on behalf of the web endpoints.
//!
//! ## Sub-modules
//! - `query`: validated place names and the building footprint query
//! - `client`: fetch with timeout, retry, backoff and response classification
//! - `transport`: the single POST, behind a trait so it can be scripted in tests
//!
//! A client is built once from [`FetchConfig`] and shared; it holds no
//! mutable state, so concurrent requests for different places never
//! coordinate.

mod client;
mod query;
mod transport;

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

pub use client::*;
pub use query::*;
pub use transport::*;

pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Retry policy and endpoint for one [`OverpassClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub endpoint_url: String,
    /// Per attempt.
    pub timeout_seconds: f64,
    pub max_retries: u32,
    /// Delay before retry n is `backoff_base_seconds * 2^(n-1)`.
    pub backoff_base_seconds: f64,
    /// Ceiling on the whole fetch, retries and sleeps included.
    pub deadline_seconds: f64,
    /// Rendered as `[timeout:N]`. Falls back to `timeout_seconds` when unset.
    pub server_timeout_seconds: Option<u64>,
    pub max_body_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: 25.0,
            max_retries: 2,
            backoff_base_seconds: 1.0,
            deadline_seconds: 90.0,
            server_timeout_seconds: None,
            max_body_bytes: 256 * 1024 * 1024,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Longest accepted `deadline_seconds`: one day.
pub const MAX_DEADLINE_SECONDS: f64 = 86_400.0;

/// Seconds to `Duration`, saturating instead of panicking on values an
/// unvalidated config may carry (negative and NaN become zero).
fn saturating_secs(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        saturating_secs(self.timeout_seconds)
    }

    pub fn deadline(&self) -> Duration {
        saturating_secs(self.deadline_seconds)
    }

    pub fn server_timeout(&self) -> u64 {
        self.server_timeout_seconds
            .unwrap_or_else(|| self.timeout_seconds.ceil() as u64)
    }

    /// Sleep before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        saturating_secs(self.backoff_base_seconds).saturating_mul(factor)
    }

    /// Checks the values that would otherwise make `Duration` panic or the
    /// client misbehave.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint_url.trim().is_empty() {
            return Err("overpass.endpoint_url must not be empty".into());
        }
        if !(self.timeout_seconds.is_finite() && self.timeout_seconds > 0.0) {
            return Err("overpass.timeout_seconds must be a positive number".into());
        }
        if !(self.backoff_base_seconds.is_finite() && self.backoff_base_seconds >= 0.0) {
            return Err("overpass.backoff_base_seconds must not be negative".into());
        }
        if !(self.deadline_seconds.is_finite() && self.deadline_seconds >= self.timeout_seconds) {
            return Err("overpass.deadline_seconds must be at least overpass.timeout_seconds".into());
        }
        if self.deadline_seconds > MAX_DEADLINE_SECONDS {
            return Err(format!(
                "overpass.deadline_seconds must be at most {MAX_DEADLINE_SECONDS}"
            ));
        }
        if self.backoff_base_seconds > self.deadline_seconds {
            return Err("overpass.backoff_base_seconds must not exceed overpass.deadline_seconds".into());
        }
        if self.max_body_bytes == 0 {
            return Err("overpass.max_body_bytes must be greater than zero".into());
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct OverpassClient {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
}

impl Default for OverpassClient {
    fn default() -> Self {
        OverpassClient::new(FetchConfig::default())
    }
}

impl OverpassClient {
    pub fn new(config: FetchConfig) -> Self {
        let transport = UreqTransport::new(&config.user_agent, config.max_body_bytes);
        OverpassClient {
            config,
            transport: Arc::new(transport),
        }
    }

    pub fn with_transport(config: FetchConfig, transport: Arc<dyn Transport>) -> Self {
        OverpassClient { config, transport }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.config.endpoint_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_retry() {
        let config = FetchConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn backoff_exponent_is_capped() {
        let config = FetchConfig {
            backoff_base_seconds: 1.0e9,
            ..FetchConfig::default()
        };
        assert_eq!(config.backoff(200), config.backoff(17));
    }

    #[test]
    fn server_timeout_defaults_to_attempt_timeout() {
        let mut config = FetchConfig {
            timeout_seconds: 12.5,
            ..FetchConfig::default()
        };
        assert_eq!(config.server_timeout(), 13);
        config.server_timeout_seconds = Some(180);
        assert_eq!(config.server_timeout(), 180);
    }

    #[test]
    fn validate_rejects_unusable_values() {
        assert!(FetchConfig::default().validate().is_ok());

        let zero_timeout = FetchConfig {
            timeout_seconds: 0.0,
            ..FetchConfig::default()
        };
        assert!(zero_timeout.validate().is_err());

        let short_deadline = FetchConfig {
            deadline_seconds: 5.0,
            ..FetchConfig::default()
        };
        assert!(short_deadline.validate().unwrap_err().contains("deadline"));

        let no_endpoint = FetchConfig {
            endpoint_url: " ".into(),
            ..FetchConfig::default()
        };
        assert!(no_endpoint.validate().is_err());
    }

    #[test]
    fn validate_rejects_values_beyond_duration_range() {
        let huge_backoff = FetchConfig {
            backoff_base_seconds: 1.0e300,
            ..FetchConfig::default()
        };
        assert!(huge_backoff.validate().unwrap_err().contains("backoff"));

        let huge_deadline = FetchConfig {
            deadline_seconds: 1.0e20,
            ..FetchConfig::default()
        };
        assert!(huge_deadline.validate().unwrap_err().contains("at most"));

        let huge_timeout = FetchConfig {
            timeout_seconds: 1.0e20,
            deadline_seconds: 1.0e20,
            ..FetchConfig::default()
        };
        assert!(huge_timeout.validate().is_err());
    }

    #[test]
    fn durations_saturate_for_unvalidated_values() {
        let config = FetchConfig {
            timeout_seconds: f64::NAN,
            backoff_base_seconds: 1.0e300,
            deadline_seconds: -1.0,
            ..FetchConfig::default()
        };
        assert_eq!(config.timeout(), Duration::ZERO);
        assert_eq!(config.deadline(), Duration::ZERO);
        assert_eq!(config.backoff(3), Duration::MAX);
    }
}
