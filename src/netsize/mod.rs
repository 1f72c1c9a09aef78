//! Network size estimation from the distances of the closest peers found by lookups.
//!
//! Every finished lookup yields the `k` closest peers to its target. In a
//! network of `N` peers spread uniformly over the keyspace, the `i`-th closest
//! peer is expected at a normed distance of `i / (N + 1)`. The [Estimator]
//! averages the observed distance per bucket depth `i` over many lookups, fits
//! a line through the origin over `(i, average distance)` and inverts its slope.
//!
//! Read more at [A New Method for Estimating P2P Network Size](https://eli.sohl.com/2020/06/05/dht-size-estimation.html)

mod config;

use std::convert::TryFrom;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::common::{BucketOccupancy, Key, PeerId};
use crate::{Error, Result};

pub use config::*;

/// Largest bucket size an [Estimator] accepts.
///
/// The weight of a lookup into an empty bucket is `2^-bucket_size`, which must
/// stay a positive `f64`.
pub const MAX_ESTIMATOR_BUCKET_SIZE: usize = 1024;

/// Normed XOR distance between two keys, from `0` (same key) to `1`.
pub fn normed_distance(a: &Key, b: &Key) -> f64 {
    a.distance(b).normed()
}

#[derive(Debug, Clone, Copy)]
struct Measurement {
    distance: f64,
    weight: f64,
    timestamp: Instant,
}

#[derive(Debug)]
struct Measurements {
    /// Measurements per bucket depth, each sorted by timestamp.
    by_depth: Vec<Vec<Measurement>>,
    cache: Option<f64>,
}

/// Estimates the number of peers in the network from the closest peers
/// returned by lookups.
///
/// Safe to share between concurrent lookups (wrap it in an [Arc](std::sync::Arc)),
/// [Estimator::track] and [Estimator::network_size] are serialized by one lock.
pub struct Estimator<R> {
    local_key: Key,
    routing_table: R,
    bucket_size: usize,
    config: Config,
    measurements: Mutex<Measurements>,
}

impl<R: BucketOccupancy> Estimator<R> {
    /// Create a new estimator for the node `local_id`, whose routing table
    /// holds at most `bucket_size` peers per bucket.
    pub fn new(
        local_id: &PeerId,
        routing_table: R,
        bucket_size: usize,
        config: Config,
    ) -> Result<Self> {
        if bucket_size == 0 {
            return Err(Error::InvalidConfig("bucket_size must be positive"));
        }
        if bucket_size > MAX_ESTIMATOR_BUCKET_SIZE {
            return Err(Error::InvalidConfig(
                "bucket_size must not exceed MAX_ESTIMATOR_BUCKET_SIZE",
            ));
        }
        config.validate()?;

        Ok(Estimator {
            local_key: local_id.key(),
            routing_table,
            bucket_size,
            measurements: Mutex::new(Measurements {
                by_depth: vec![Vec::with_capacity(config.max_measurements); bucket_size],
                cache: None,
            }),
            config,
        })
    }

    /// Create a new estimator with the default [Config].
    pub fn with_defaults(
        local_id: &PeerId,
        routing_table: R,
        bucket_size: usize,
    ) -> Result<Self> {
        Self::new(local_id, routing_table, bucket_size, Config::default())
    }

    // === Getters ===

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of retained measurements per bucket depth.
    pub fn measurement_counts(&self) -> Vec<usize> {
        self.lock().by_depth.iter().map(Vec::len).collect()
    }

    // === Public Methods ===

    /// Track the closest peers to `target` found by a lookup, to be used in
    /// the next network size estimate.
    ///
    /// `peers` must be exactly `bucket_size` long and sorted by distance to
    /// `target`, closest first: `peers[i]` is attributed to bucket depth `i`.
    pub fn track(&self, target: &Key, peers: &[PeerId]) -> Result<()> {
        self.track_at(target, peers, Instant::now())
    }

    /// Calculate the network size estimate, or return the cached one if
    /// nothing was tracked since the last calculation.
    ///
    /// Fails with [Error::InsufficientData] until every bucket depth holds at
    /// least [Config::min_measurements] measurements within the retention window.
    pub fn network_size(&self) -> Result<f64> {
        self.network_size_at(Instant::now())
    }

    // === Private Methods ===

    pub(crate) fn track_at(&self, target: &Key, peers: &[PeerId], now: Instant) -> Result<()> {
        if peers.len() != self.bucket_size {
            return Err(Error::WrongPeerCount {
                expected: self.bucket_size,
                got: peers.len(),
            });
        }

        let weight = self.weight(target);

        let mut measurements = self.lock();

        debug!(?target, ?weight, "Tracking peers for key");

        measurements.cache = None;

        for (depth, peer) in measurements.by_depth.iter_mut().zip(peers) {
            depth.push(Measurement {
                distance: normed_distance(&peer.key(), target),
                weight,
                timestamp: now,
            });

            retain_window(depth, now, self.config.max_measurement_age);

            // Favour the most recent measurements.
            if depth.len() > self.config.max_measurements {
                let excess = depth.len() - self.config.max_measurements;
                depth.drain(..excess);
            }
        }

        Ok(())
    }

    pub(crate) fn network_size_at(&self, now: Instant) -> Result<f64> {
        let mut measurements = self.lock();

        if let Some(estimate) = measurements.cache {
            trace!(?estimate, "Cached network size estimate");
            return Ok(estimate);
        }

        self.garbage_collect(&mut measurements.by_depth, now);

        let mut xy_sum = 0.0;
        let mut x2_sum = 0.0;

        for (index, depth) in measurements.by_depth.iter().enumerate() {
            let count = depth.len();

            if count < self.config.min_measurements {
                return Err(Error::InsufficientData {
                    index,
                    count,
                    required: self.config.min_measurements,
                });
            }

            let (avg, std) = weighted_mean_and_std(depth);
            let x = (index + 1) as f64;

            // Linear fit through the origin, each point weighted by its standard deviation.
            xy_sum += std * x * avg;
            x2_sum += std * x * x;
        }

        let slope = xy_sum / x2_sum;
        let estimate = 1.0 / slope - 1.0;

        if x2_sum <= 0.0 || !estimate.is_finite() {
            return Err(Error::DegenerateFit);
        }

        measurements.cache = Some(estimate);

        debug!(?estimate, "New network size estimate");

        Ok(estimate)
    }

    /// Weigh a lookup exponentially less if its target falls into a bucket that isn't full.
    ///
    /// Bucket occupancy 20 of 20 -> 1/2^0 -> weight: 1
    /// Bucket occupancy 17 of 20 -> 1/2^3 -> weight: 1/8
    /// Bucket occupancy 10 of 20 -> 1/2^10 -> weight: 1/1024
    fn weight(&self, target: &Key) -> f64 {
        let cpl = target.common_prefix_len(&self.local_key);
        let occupancy = self
            .routing_table
            .peers_for_cpl(cpl)
            .min(self.bucket_size);

        // Bounded by MAX_ESTIMATOR_BUCKET_SIZE.
        let missing = i32::try_from(self.bucket_size - occupancy).unwrap_or(i32::MAX);

        0.5_f64.powi(missing)
    }

    fn garbage_collect(&self, by_depth: &mut [Vec<Measurement>], now: Instant) {
        let removed: usize = by_depth
            .iter_mut()
            .map(|depth| retain_window(depth, now, self.config.max_measurement_age))
            .sum();

        trace!(?removed, "Garbage collected measurements");
    }

    fn lock(&self) -> MutexGuard<'_, Measurements> {
        // Measurements are only ever appended or pruned, so they remain
        // consistent even if another thread panicked while holding the lock.
        self.measurements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R> Debug for Estimator<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estimator")
            .field("local_key", &self.local_key)
            .field("bucket_size", &self.bucket_size)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Drop measurements that fell out of the retention window, returning how many.
///
/// Timestamps are non-decreasing, so all obsolete measurements are at the head.
fn retain_window(measurements: &mut Vec<Measurement>, now: Instant, max_age: Duration) -> usize {
    let cutoff = match now.checked_sub(max_age) {
        Some(cutoff) => cutoff,
        None => return 0,
    };

    let obsolete = measurements.partition_point(|m| m.timestamp <= cutoff);
    measurements.drain(..obsolete);

    obsolete
}

/// Weighted mean and bias-corrected weighted standard deviation of the distances.
fn weighted_mean_and_std(measurements: &[Measurement]) -> (f64, f64) {
    let n = measurements.len() as f64;

    let (sum_distances, sum_weights) = measurements
        .iter()
        .fold((0.0, 0.0), |(d, w), m| (d + m.weight * m.distance, w + m.weight));
    let avg = sum_distances / sum_weights;

    let sum_weighted_diffs: f64 = measurements
        .iter()
        .map(|m| {
            let diff = m.distance - avg;
            m.weight * diff * diff
        })
        .sum();
    let variance = sum_weighted_diffs / ((n - 1.0) / n * sum_weights);

    (avg, variance.sqrt())
}
