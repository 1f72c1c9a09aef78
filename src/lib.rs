#![doc = include_str!("../README.md")]

// Public modules
mod common;
mod error;

pub mod lookup;
pub mod netsize;

pub use crate::common::{
    BucketOccupancy, Distance, KBucket, Key, PeerId, RoutingTable, KEY_BITS, KEY_SIZE,
    MAX_BUCKET_SIZE_K,
};
pub use crate::error::{Error, Result};
pub use crate::lookup::{PeerState, QueryPeerSet, QueryPeerState};
pub use crate::netsize::{normed_distance, Estimator};
