//! Main Crate Error

use crate::common::PeerId;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Kademlia lookup core error enum.
pub enum Error {
    /// [crate::netsize::Estimator::track] expects exactly one peer per
    /// bucket-depth index, i.e. `bucket_size` peers.
    #[error("Expected {expected} peers (bucket size), got {got}")]
    WrongPeerCount { expected: usize, got: usize },

    /// Not enough measurements to estimate the network size yet.
    ///
    /// This is a normal condition while the node warms up, callers should
    /// try again after more lookups were tracked.
    #[error("Not enough data: bucket depth {index} has {count} measurements, need {required}")]
    InsufficientData {
        index: usize,
        count: usize,
        required: usize,
    },

    /// Measurements show no spread at any bucket depth, so the regression
    /// has nothing to fit. Should not happen with real lookups.
    #[error("Degenerate fit: measurements have no spread")]
    DegenerateFit,

    /// The peer was never added to the [crate::lookup::QueryPeerSet].
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// Invalid estimator configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
