//! Simplified Kademlia routing table, and the bucket occupancy query the
//! network size estimator depends on.

use std::collections::BTreeMap;
use std::slice::Iter;
use std::sync::{Arc, PoisonError, RwLock};

use crate::common::{Distance, Key, PeerId};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;

/// Answers "how many peers does the routing table hold at this common prefix length".
///
/// This is the only thing the [crate::netsize::Estimator] needs to know about
/// the routing table. Implement it for your own table, or use [RoutingTable].
pub trait BucketOccupancy: Send + Sync {
    /// Number of peers currently known whose common prefix length with the
    /// local key is `cpl`.
    fn peers_for_cpl(&self, cpl: usize) -> usize;
}

impl<T: BucketOccupancy + ?Sized> BucketOccupancy for Arc<T> {
    fn peers_for_cpl(&self, cpl: usize) -> usize {
        (**self).peers_for_cpl(cpl)
    }
}

impl<T: BucketOccupancy> BucketOccupancy for RwLock<T> {
    fn peers_for_cpl(&self, cpl: usize) -> usize {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers_for_cpl(cpl)
    }
}

#[derive(Debug, Clone)]
/// Simplified Kademlia routing table, bucketed by common prefix length with
/// the local key. Full buckets reject new peers.
pub struct RoutingTable {
    id: Key,
    bucket_size: usize,
    buckets: BTreeMap<usize, KBucket>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given local key.
    pub fn new(id: Key) -> Self {
        RoutingTable {
            id,
            bucket_size: MAX_BUCKET_SIZE_K,
            buckets: BTreeMap::new(),
        }
    }

    // === Options ===

    pub fn with_bucket_size(mut self, k: usize) -> Self {
        self.bucket_size = k;
        self
    }

    // === Getters ===

    /// Returns the [Key] of this node, where the common prefix is measured from.
    pub fn id(&self) -> &Key {
        &self.id
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    // === Public Methods ===

    /// Attempts to add a peer to this routing table, and return `true` if it did.
    pub fn add(&mut self, peer: PeerId) -> bool {
        let key = peer.key();

        if key == self.id {
            // Do not add self to the routing_table
            return false;
        }

        let cpl = self.id.common_prefix_len(&key);
        let bucket_size = self.bucket_size;

        self.buckets
            .entry(cpl)
            .or_insert_with(|| KBucket::new(bucket_size))
            .add(peer)
    }

    /// Remove a peer from this routing table.
    pub fn remove(&mut self, peer: &PeerId) {
        let cpl = self.id.common_prefix_len(&peer.key());

        if let Some(bucket) = self.buckets.get_mut(&cpl) {
            bucket.remove(peer)
        }
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.is_empty())
    }

    /// Return the number of peers in this routing table.
    pub fn size(&self) -> usize {
        self.buckets
            .values()
            .fold(0, |acc, bucket| acc + bucket.peers.len())
    }

    /// Return up to `n` peers closest to the target, closest first.
    pub fn closest(&self, target: &Key, n: usize) -> Vec<PeerId> {
        let mut closest: Vec<(Distance, &PeerId)> = self
            .peers()
            .map(|peer| (peer.key().distance(target), peer))
            .collect();

        closest.sort_by(|a, b| a.0.cmp(&b.0));

        closest
            .into_iter()
            .take(n)
            .map(|(_, peer)| peer.clone())
            .collect()
    }

    /// Returns an iterator over the peers in this routing table.
    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        let cpl = self.id.common_prefix_len(&peer.key());

        self.buckets
            .get(&cpl)
            .map(|bucket| bucket.contains(peer))
            .unwrap_or(false)
    }
}

impl BucketOccupancy for RoutingTable {
    fn peers_for_cpl(&self, cpl: usize) -> usize {
        self.buckets
            .get(&cpl)
            .map(|bucket| bucket.peers.len())
            .unwrap_or(0)
    }
}

/// Peers sharing the same common prefix length with the local key.
#[derive(Debug, Clone)]
pub struct KBucket {
    capacity: usize,
    /// Peers in the k-bucket, sorted by the least recently added.
    peers: Vec<PeerId>,
}

impl KBucket {
    pub fn new(capacity: usize) -> Self {
        KBucket {
            capacity,
            peers: Vec::with_capacity(capacity),
        }
    }

    // === Public Methods ===

    pub fn add(&mut self, incoming: PeerId) -> bool {
        if self.contains(&incoming) || self.peers.len() >= self.capacity {
            return false;
        }

        self.peers.push(incoming);
        true
    }

    pub fn remove(&mut self, peer: &PeerId) {
        self.peers.retain(|p| p != peer);
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn iter(&self) -> Iter<'_, PeerId> {
        self.peers.iter()
    }

    fn contains(&self, peer: &PeerId) -> bool {
        self.peers.iter().any(|p| p == peer)
    }
}
