// Process configuration for the Scheduler (spec §6 `scheduler.*` options).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the sweep ticker scans `scheduled_jobs` for due rows.
    pub sweep_interval: Duration,
    /// Max rows claimed per sweep.
    pub batch_size: i64,
    /// Attempts before a job moves to `failed` instead of being requeued.
    pub max_attempts: i32,
    /// How long a terminal `scheduled_jobs` row survives before cleanup.
    pub cleanup_after: chrono::Duration,
    /// How often the cleanup ticker runs.
    pub cleanup_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            batch_size: 100,
            max_attempts: 5,
            cleanup_after: chrono::Duration::days(30),
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

impl SchedulerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let sweep_interval = std::env::var("SCHEDULER_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.sweep_interval);

        let batch_size = std::env::var("SCHEDULER_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.batch_size);

        let max_attempts = std::env::var("SCHEDULER_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.max_attempts);

        let cleanup_after = std::env::var("SCHEDULER_CLEANUP_AFTER_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(chrono::Duration::days)
            .unwrap_or(default.cleanup_after);

        let cleanup_interval = std::env::var("SCHEDULER_CLEANUP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.cleanup_interval);

        Self {
            sweep_interval,
            batch_size,
            max_attempts,
            cleanup_after,
            cleanup_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sweep_interval_is_60_seconds() {
        assert_eq!(SchedulerConfig::default().sweep_interval, Duration::from_secs(60));
    }
}
