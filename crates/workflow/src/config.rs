//! Timing configuration for the workflow runtime.

use std::time::Duration;

/// Intervals and timeouts that drive every periodic task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Delay before an order's first wake-up and between later ones.
    pub order_wakeup_period: Duration,
    /// Delay before a restock pipeline's first wake-up.
    pub restock_first_wakeup: Duration,
    /// Period of restock pipeline wake-ups after the first.
    pub restock_wakeup_period: Duration,
    /// Pause between dispatcher drains when the queue is empty.
    pub dispatcher_interval: Duration,
    /// Timeout of the dispatcher's dequeue transaction.
    pub dispatcher_dequeue_timeout: Duration,
    /// Period of the stock-threshold sweep.
    pub threshold_sweep_interval: Duration,
    /// Period of the request-history sweep.
    pub history_sweep_interval: Duration,
    /// How long removal history is kept.
    pub history_retention: Duration,
    /// Timeout of each ledger and workflow transaction.
    pub transaction_timeout: Duration,
    /// How often the scheduler looks for due reminders.
    pub scheduler_poll_interval: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            order_wakeup_period: Duration::from_secs(10),
            restock_first_wakeup: Duration::from_secs(5),
            restock_wakeup_period: Duration::from_secs(10),
            dispatcher_interval: Duration::from_secs(1),
            dispatcher_dequeue_timeout: Duration::from_secs(4),
            threshold_sweep_interval: Duration::from_secs(30),
            history_sweep_interval: Duration::from_secs(5 * 60),
            history_retention: Duration::from_secs(2 * 60 * 60),
            transaction_timeout: Duration::from_secs(4),
            scheduler_poll_interval: Duration::from_secs(1),
        }
    }
}

impl WorkflowConfig {
    /// Loads configuration from environment variables, falling back to the
    /// defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            order_wakeup_period: millis("ORDER_WAKEUP_PERIOD_MS", defaults.order_wakeup_period),
            restock_first_wakeup: millis("RESTOCK_FIRST_WAKEUP_MS", defaults.restock_first_wakeup),
            restock_wakeup_period: millis(
                "RESTOCK_WAKEUP_PERIOD_MS",
                defaults.restock_wakeup_period,
            ),
            dispatcher_interval: millis("DISPATCHER_INTERVAL_MS", defaults.dispatcher_interval),
            dispatcher_dequeue_timeout: millis(
                "DISPATCHER_DEQUEUE_TIMEOUT_MS",
                defaults.dispatcher_dequeue_timeout,
            ),
            threshold_sweep_interval: secs(
                "THRESHOLD_SWEEP_INTERVAL_SECS",
                defaults.threshold_sweep_interval,
            ),
            history_sweep_interval: secs(
                "HISTORY_SWEEP_INTERVAL_SECS",
                defaults.history_sweep_interval,
            ),
            history_retention: secs("HISTORY_RETENTION_SECS", defaults.history_retention),
            transaction_timeout: millis("TRANSACTION_TIMEOUT_MS", defaults.transaction_timeout),
            scheduler_poll_interval: millis("SCHEDULER_POLL_MS", defaults.scheduler_poll_interval),
        }
    }
}

fn millis(name: &str, default: Duration) -> Duration {
    parse_env(name).map_or(default, Duration::from_millis)
}

fn secs(name: &str, default: Duration) -> Duration {
    parse_env(name).map_or(default, Duration::from_secs)
}

fn parse_env(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.order_wakeup_period, Duration::from_secs(10));
        assert_eq!(config.restock_first_wakeup, Duration::from_secs(5));
        assert_eq!(config.history_retention, Duration::from_secs(7200));
        assert_eq!(config.transaction_timeout, Duration::from_secs(4));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides_and_falls_back() {
        // SAFETY: serialized with the other env tests.
        unsafe {
            std::env::set_var("ORDER_WAKEUP_PERIOD_MS", "250");
            std::env::set_var("THRESHOLD_SWEEP_INTERVAL_SECS", "not-a-number");
        }

        let config = WorkflowConfig::from_env();
        assert_eq!(config.order_wakeup_period, Duration::from_millis(250));
        assert_eq!(config.threshold_sweep_interval, Duration::from_secs(30));

        unsafe {
            std::env::remove_var("ORDER_WAKEUP_PERIOD_MS");
            std::env::remove_var("THRESHOLD_SWEEP_INTERVAL_SECS");
        }
    }
}
