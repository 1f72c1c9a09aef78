use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Measurements older than this are discarded.
pub const DEFAULT_MAX_MEASUREMENT_AGE: Duration = Duration::from_secs(2 * 60 * 60);
/// Each bucket depth needs this many measurements before an estimate is made.
pub const DEFAULT_MIN_MEASUREMENTS: usize = 5;
/// Each bucket depth keeps at most this many (most recent) measurements.
pub const DEFAULT_MAX_MEASUREMENTS: usize = 150;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Network size [Estimator](super::Estimator) configurations
pub struct Config {
    /// Retention window of measurements.
    ///
    /// Older measurements are dropped whenever the estimator tracks new peers
    /// or calculates a fresh estimate.
    ///
    /// Defaults to [DEFAULT_MAX_MEASUREMENT_AGE]
    pub max_measurement_age: Duration,
    /// Minimum number of measurements per bucket depth before the estimator
    /// trusts its data. Must be at least `2`.
    ///
    /// Defaults to [DEFAULT_MIN_MEASUREMENTS]
    pub min_measurements: usize,
    /// Maximum number of measurements retained per bucket depth, favouring
    /// the most recent ones. Bounds the estimator's memory to
    /// `bucket_size * max_measurements` samples.
    ///
    /// Defaults to [DEFAULT_MAX_MEASUREMENTS]
    pub max_measurements: usize,
}

impl Config {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_measurements < 2 {
            return Err(Error::InvalidConfig("min_measurements must be at least 2"));
        }
        if self.max_measurements < self.min_measurements {
            return Err(Error::InvalidConfig(
                "max_measurements must not be smaller than min_measurements",
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_measurement_age: DEFAULT_MAX_MEASUREMENT_AGE,
            min_measurements: DEFAULT_MIN_MEASUREMENTS,
            max_measurements: DEFAULT_MAX_MEASUREMENTS,
        }
    }
}
