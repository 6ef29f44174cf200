//! Vault Metrics
//!
//! Counters for stored and retrieved secrets and for rejected requests,
//! labelled by error category.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::ErrorCategory;

const NAMESPACE: &str = "secret_vault";

/// Service metrics on a private registry.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// Secrets written
    pub secrets_stored: IntCounter,
    /// Secrets handed out (each at most once)
    pub secrets_retrieved: IntCounter,
    /// Rejected requests by category
    pub requests_rejected: IntCounterVec,
}

impl VaultMetrics {
    /// Creates the metrics and registers them on a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let secrets_stored = IntCounter::with_opts(
            Opts::new("secrets_stored_total", "Total secrets stored").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(secrets_stored.clone()))?;

        let secrets_retrieved = IntCounter::with_opts(
            Opts::new("secrets_retrieved_total", "Total secrets retrieved").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(secrets_retrieved.clone()))?;

        let requests_rejected = IntCounterVec::new(
            Opts::new("requests_rejected_total", "Total rejected requests by error category")
                .namespace(NAMESPACE),
            &["category"],
        )?;
        registry.register(Box::new(requests_rejected.clone()))?;

        // Pre-create every series so dashboards see zeros instead of gaps.
        for category in ErrorCategory::ALL {
            requests_rejected.with_label_values(&[category.as_str()]);
        }

        Ok(Self {
            registry,
            secrets_stored,
            secrets_retrieved,
            requests_rejected,
        })
    }

    /// Records a stored secret
    pub fn record_stored(&self) {
        self.secrets_stored.inc();
    }

    /// Records a retrieved secret
    pub fn record_retrieved(&self) {
        self.secrets_retrieved.inc();
    }

    /// Records a rejected request
    pub fn record_rejected(&self, category: ErrorCategory) {
        self.requests_rejected
            .with_label_values(&[category.as_str()])
            .inc();
    }

    /// Renders every metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for VaultMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultMetrics")
            .field("secrets_stored", &self.secrets_stored.get())
            .field("secrets_retrieved", &self.secrets_retrieved.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = VaultMetrics::new().unwrap();
        metrics.record_stored();
        metrics.record_retrieved();
        metrics.record_rejected(ErrorCategory::NotFound);

        let text = metrics.render().unwrap();
        assert!(text.contains("secret_vault_secrets_stored_total 1"));
        assert!(text.contains("secret_vault_secrets_retrieved_total 1"));
        assert!(text.contains(r#"secret_vault_requests_rejected_total{category="not_found"} 1"#));
        assert!(text.contains(r#"secret_vault_requests_rejected_total{category="auth"} 0"#));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = VaultMetrics::new().unwrap();
        let b = VaultMetrics::new().unwrap();
        a.record_stored();
        assert_eq!(a.secrets_stored.get(), 1);
        assert_eq!(b.secrets_stored.get(), 0);
    }
}
