//! Analytics layer configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults for development. All components receive their configuration by
//! injection at process start; there are no module-level globals.

use std::time::Duration;

use crate::IsolationPolicy;

/// Configuration for the analytics query & cache layer.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Tenant isolation policy. `GlobalView` must be an explicit opt-in.
    pub isolation_policy: IsolationPolicy,

    /// TTL applied to cached aggregate results.
    pub cache_ttl: Duration,

    /// Deadline for a single store query; queries exceeding it fail fast
    /// as a store outage so the stale-cache path can take over.
    pub query_timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            isolation_policy: IsolationPolicy::Enforced,
            cache_ttl: Duration::from_secs(300),
            query_timeout: Duration::from_secs(3),
        }
    }
}

impl AnalyticsConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BEACON_ISOLATION_POLICY`: "enforced" or "global_view" (default: enforced)
    /// - `BEACON_CACHE_TTL_SECS`: cache TTL in seconds (default: 300)
    /// - `BEACON_QUERY_TIMEOUT_SECS`: store query deadline in seconds (default: 3)
    pub fn from_env() -> Self {
        let isolation_policy = std::env::var("BEACON_ISOLATION_POLICY")
            .ok()
            .and_then(|s| IsolationPolicy::parse(&s))
            .unwrap_or_default();

        if isolation_policy == IsolationPolicy::GlobalView {
            tracing::warn!(
                "BEACON_ISOLATION_POLICY=global_view: tenant isolation is disabled for all principals"
            );
        }

        let cache_ttl = std::env::var("BEACON_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        let query_timeout = std::env::var("BEACON_QUERY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3));

        Self {
            isolation_policy,
            cache_ttl,
            query_timeout,
        }
    }

    /// Override the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Override the query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Override the isolation policy.
    pub fn with_isolation_policy(mut self, policy: IsolationPolicy) -> Self {
        self.isolation_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.isolation_policy, IsolationPolicy::Enforced);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.query_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_builder_overrides() {
        let config = AnalyticsConfig::default()
            .with_cache_ttl(Duration::from_secs(60))
            .with_query_timeout(Duration::from_secs(1))
            .with_isolation_policy(IsolationPolicy::GlobalView);

        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.query_timeout, Duration::from_secs(1));
        assert_eq!(config.isolation_policy, IsolationPolicy::GlobalView);
    }
}
