//! Scheduler configuration

use crate::error::{Result, TweenError};
use serde::{Deserialize, Serialize};

/// Tunables for a [`Scheduler`](crate::Scheduler)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Multiplier applied to every tick's delta
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,

    /// Timelines pre-reserved in the free list
    #[serde(default = "default_pool_capacity")]
    pub timeline_pool_capacity: usize,

    /// Actions pre-reserved in the free list
    #[serde(default = "default_pool_capacity")]
    pub action_pool_capacity: usize,

    /// Minimum lane count before the batch is split across worker threads
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Worker threads for the batch (0 = available parallelism)
    #[serde(default)]
    pub max_workers: usize,
}

fn default_time_scale() -> f32 {
    1.0
}

fn default_pool_capacity() -> usize {
    8
}

fn default_parallel_threshold() -> usize {
    1024
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            timeline_pool_capacity: default_pool_capacity(),
            action_pool_capacity: default_pool_capacity(),
            parallel_threshold: default_parallel_threshold(),
            max_workers: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(TweenError::InvalidConfig(format!(
                "time_scale must be finite and non-negative, got {}",
                self.time_scale
            )));
        }

        if self.parallel_threshold == 0 {
            return Err(TweenError::InvalidConfig(
                "parallel_threshold must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Worker count with `0` resolved against the host
    pub fn resolved_workers(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }

        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.timeline_pool_capacity, 8);
        assert_eq!(config.parallel_threshold, 1024);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: SchedulerConfig = toml::from_str("time_scale = 0.5\nmax_workers = 3").unwrap();
        assert_eq!(config.time_scale, 0.5);
        assert_eq!(config.resolved_workers(), 3);
        assert_eq!(config.action_pool_capacity, 8);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SchedulerConfig {
            time_scale: -1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TweenError::InvalidConfig(_))));

        let config = SchedulerConfig {
            time_scale: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SchedulerConfig {
            parallel_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_auto_workers_is_at_least_one() {
        assert!(SchedulerConfig::default().resolved_workers() >= 1);
    }
}
