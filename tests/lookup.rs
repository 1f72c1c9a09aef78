//! Drive simulated iterative lookups over an in-memory network, and feed
//! their results into a shared network size estimator.
//!
//! Run with: cargo test --test lookup

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use kad_lookup::{
    Error, Estimator, Key, PeerId, PeerState, QueryPeerSet, RoutingTable, MAX_BUCKET_SIZE_K,
};
use rayon::prelude::*;

const K: usize = MAX_BUCKET_SIZE_K;
const ALPHA: usize = 3;

/// Every peer's routing table, filled with every other peer it has room for.
///
/// Buckets are twice the usual size, so lookups reliably converge on the
/// exact closest peers in networks of a few hundred peers.
struct Network {
    tables: BTreeMap<PeerId, RoutingTable>,
}

impl Network {
    fn new(size: usize) -> Self {
        let peers: Vec<PeerId> = (0..size).map(|_| PeerId::random()).collect();

        let tables = peers
            .iter()
            .map(|peer| {
                let mut table = RoutingTable::new(peer.key()).with_bucket_size(2 * K);
                for other in &peers {
                    table.add(other.clone());
                }
                (peer.clone(), table)
            })
            .collect();

        Self { tables }
    }

    fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.tables.keys()
    }

    fn closest(&self, target: &Key, n: usize, reachable: impl Fn(&PeerId) -> bool) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.peers().filter(|p| reachable(p)).cloned().collect();
        peers.sort_by_cached_key(|peer| peer.key().distance(target));
        peers.truncate(n);
        peers
    }

    /// The local peer's view of the network, with regular k-buckets.
    fn local_table(&self, local: &PeerId) -> RoutingTable {
        let mut table = RoutingTable::new(local.key());
        for peer in self.peers() {
            table.add(peer.clone());
        }
        table
    }

    /// Iterative lookup from `local`, returning the closest peers that responded.
    fn lookup(
        &self,
        local: &PeerId,
        target: &Key,
        reachable: impl Fn(&PeerId) -> bool,
    ) -> QueryPeerSet {
        let mut set = QueryPeerSet::new(*target);

        for seed in self.tables[local].closest(target, K) {
            set.try_add(seed, local.clone());
        }

        loop {
            let candidates = set.get_closest_n_in_states(
                K,
                &[PeerState::Heard, PeerState::Waiting, PeerState::Queried],
            );

            let to_query: Vec<PeerId> = candidates
                .into_iter()
                .filter(|p| set.get_state(p) == Ok(PeerState::Heard))
                .take(ALPHA)
                .collect();

            if to_query.is_empty() {
                return set;
            }

            for peer in &to_query {
                set.set_state(peer, PeerState::Waiting).expect("known peer");
            }
            assert_eq!(set.num_waiting(), to_query.len());

            for peer in to_query {
                if !reachable(&peer) {
                    set.set_state(&peer, PeerState::Unreachable)
                        .expect("known peer");
                    continue;
                }

                for closer in self.tables[&peer].closest(target, K) {
                    set.try_add(closer, peer.clone());
                }
                set.set_state(&peer, PeerState::Queried).expect("known peer");
            }
        }
    }
}

#[test]
fn lookup_finds_closest_peers() {
    let network = Network::new(300);
    let local = network.peers().next().cloned().expect("non empty network");

    for _ in 0..5 {
        let target = Key::random();
        let mut set = network.lookup(&local, &target, |_| true);

        assert_eq!(set.num_waiting(), 0);
        assert_eq!(
            set.get_closest_n_in_states(K, &[PeerState::Queried]),
            network.closest(&target, K, |_| true)
        );

        for state in set.all_states() {
            let referrer = set.get_referrer(&state.id).expect("known peer");
            assert!(referrer == &local || set.contains(referrer));
        }
    }
}

#[test]
fn lookup_skips_unreachable_peers() {
    let network = Network::new(300);
    let local = network.peers().next().cloned().expect("non empty network");

    let reachable = |peer: &PeerId| peer.as_bytes()[0] % 4 != 0;

    for _ in 0..5 {
        let target = Key::random();
        let mut set = network.lookup(&local, &target, reachable);

        assert_eq!(set.num_waiting(), 0);

        let queried = set.get_closest_in_states(&[PeerState::Queried]);
        assert!(queried.len() >= K);
        assert!(queried.iter().all(|peer| reachable(peer)));

        for peer in set.get_closest_in_states(&[PeerState::Unreachable]) {
            assert!(!reachable(&peer));
        }

        let distances: Vec<_> = queried.iter().map(|p| p.key().distance(&target)).collect();
        assert!(distances.windows(2).all(|w| w[0] < w[1]));

        // The lookup only stops once no heard peer is closer than the k-th responder.
        let kth = distances[K - 1];
        for peer in set.get_closest_in_states(&[PeerState::Heard]) {
            assert!(peer.key().distance(&target) > kth);
        }
    }
}

#[test]
fn estimate_from_simulated_lookups() {
    let size = 500;
    let network = Network::new(size);
    let local = network.peers().next().cloned().expect("non empty network");

    let table = Arc::new(RwLock::new(network.local_table(&local)));
    let estimator = Estimator::with_defaults(&local, table, K).expect("valid config");

    let mut tracked = 0;
    while tracked < 40 {
        let target = Key::random();
        let mut set = network.lookup(&local, &target, |_| true);
        let closest = set.get_closest_n_in_states(K, &[PeerState::Queried]);

        if tracked < 4 {
            assert!(matches!(
                estimator.network_size(),
                Err(Error::InsufficientData { .. })
            ));
        }

        estimator.track(&target, &closest).expect("k peers");
        tracked += 1;
    }

    let estimate = estimator.network_size().expect("enough data");

    assert!(
        estimate > size as f64 / 2.0 && estimate < size as f64 * 2.0,
        "estimate {} too far from {}",
        estimate,
        size
    );
}

#[test]
fn estimator_shared_between_lookups() {
    let network = Network::new(200);
    let local = network.peers().next().cloned().expect("non empty network");

    let table = Arc::new(RwLock::new(network.local_table(&local)));
    let estimator =
        Arc::new(Estimator::with_defaults(&local, table, K).expect("valid config"));

    let targets: Vec<Key> = (0..64).map(|_| Key::random()).collect();
    let results: Vec<(Key, Vec<PeerId>)> = targets
        .into_iter()
        .map(|target| (target, network.closest(&target, K, |_| true)))
        .collect();

    results.par_iter().for_each(|(target, closest)| {
        estimator.track(target, closest).expect("k peers");
        // Interleave reads, which populate the cache.
        let _ = estimator.network_size();
    });

    assert_eq!(estimator.measurement_counts(), vec![64; K]);

    let first = estimator.network_size().expect("enough data");
    let second = estimator.network_size().expect("enough data");
    assert_eq!(first.to_bits(), second.to_bits());
}
