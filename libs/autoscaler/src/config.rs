//! Autoscaler configuration.

use std::time::Duration;

/// Static configuration for the fleet autoscaler.
///
/// Collaborators (state accessor, fleet scaler, vpod lister, evictor) are
/// passed to [`FleetAutoscaler::new`](crate::FleetAutoscaler::new) directly.
#[derive(Debug, Clone)]
pub struct AutoscalerConfig {
    /// Namespace of the worker fleet StatefulSet.
    pub stateful_set_namespace: String,

    /// Name of the worker fleet StatefulSet.
    pub stateful_set_name: String,

    /// Virtual replicas each worker pod can host.
    pub pod_capacity: i32,

    /// Tick interval; doubles as the compaction grace window.
    pub refresh_period: Duration,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            stateful_set_namespace: "knative-eventing".to_string(),
            stateful_set_name: "vfleet-worker".to_string(),
            pod_capacity: 20,
            refresh_period: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = AutoscalerConfig::default();
        assert_eq!(config.pod_capacity, 20);
        assert_eq!(config.refresh_period, Duration::from_secs(10));
    }
}
