//! Host redelivery of lifecycle events.
//!
//! The host redelivers the same event while the failure is retryable. This is
//! only correct because reconcile is replay-safe; fatal failures are returned
//! at once.

use std::time::Duration;

use descope_auth_config::RedeliverySettings;
use descope_auth_core::{LifecycleEvent, Result};

use crate::orchestrator::{LifecycleOrchestrator, ReconcileOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct RedeliveryPolicy {
    /// Total deliveries, including the first (minimum 1)
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RedeliveryPolicy {
    /// A policy that delivers exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before delivery number `attempt + 1`, `attempt` starting at 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * exp)
            .min(self.max_delay.as_millis() as f64)
            .max(0.0);
        Duration::from_millis(millis.round() as u64)
    }
}

impl From<&RedeliverySettings> for RedeliveryPolicy {
    fn from(settings: &RedeliverySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
        }
    }
}

/// Deliver `event` until it succeeds, fails fatally, or attempts run out.
pub async fn deliver(
    orchestrator: &LifecycleOrchestrator,
    event: &LifecycleEvent,
    policy: &RedeliveryPolicy,
) -> Result<ReconcileOutcome> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match orchestrator.reconcile(event).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    request_id = %event.request_id,
                    logical_id = %event.logical_resource_id,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "delivery failed, redelivering"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    request_id = %event.request_id,
                    logical_id = %event.logical_resource_id,
                    attempt,
                    error = %e,
                    "delivery failed"
                );
                return Err(e);
            }
        }
    }
}
