//! Engine-wide defaults applied to new descriptors.

use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};

use super::descriptor::RequestDescriptorBuilder;

/// Defaults for requests built through an engine.
///
/// Durations are given in milliseconds so the struct reads naturally from JSON.
/// Missing fields fall back to [`EngineConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeout_ms: u64,

    /// Retries after the first attempt.
    pub retry_count: u32,

    /// Cap for backoff delays; 0 disables waiting between attempts.
    pub max_retry_interval_ms: u64,

    /// Base delay of the default exponential backoff.
    pub backoff_base_ms: u64,

    pub log_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            retry_count: 0,
            max_retry_interval_ms: 0,
            backoff_base_ms: 1000,
            log_enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_millis(self.max_retry_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Start a descriptor seeded with these defaults.
    pub fn descriptor(&self, method: Method, url: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(method, url)
            .timeout(self.timeout())
            .retry_count(self.retry_count)
            .max_retry_interval(self.max_retry_interval())
            .log_enabled(self.log_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_reasonable() {
        let c = EngineConfig::default();
        assert_eq!(c.timeout(), Duration::from_secs(3));
        assert_eq!(c.retry_count, 0);
        assert_eq!(c.max_retry_interval(), Duration::ZERO);
        assert!(c.log_enabled);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "retry_count": 2, "log_enabled": false }"#;
        let c: EngineConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(c.retry_count, 2);
        assert!(!c.log_enabled);
        assert_eq!(c.timeout_ms, 3000);
        assert_eq!(c.backoff_base_ms, 1000);
    }

    #[test]
    fn descriptor_inherits_config() {
        let c = EngineConfig {
            timeout_ms: 500,
            retry_count: 4,
            max_retry_interval_ms: 250,
            backoff_base_ms: 10,
            log_enabled: false,
        };
        let d = c.descriptor(Method::POST, "http://h/x").build().unwrap();
        assert_eq!(d.timeout(), Duration::from_millis(500));
        assert_eq!(d.retry_count(), 4);
        assert_eq!(d.max_retry_interval(), Duration::from_millis(250));
        assert!(!d.is_log_enabled());
    }
}
