use serde::{Deserialize, Serialize};

use crate::common::{Distance, Key, PeerId};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// State of a peer during the lifecycle of a single lookup.
///
/// The lookup driver moves peers along `Heard -> Waiting -> Queried | Unreachable`,
/// [QueryPeerSet] records whatever it is told.
pub enum PeerState {
    /// Heard of, not queried yet.
    Heard,
    /// Query in flight.
    Waiting,
    /// Queried and responded.
    Queried,
    /// Queried and failed to respond.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPeerState {
    pub id: PeerId,
    /// Exact XOR distance to the lookup target.
    pub distance: Distance,
    pub state: PeerState,
    /// The peer whose response introduced this one, or the local peer for seeds.
    pub referred_by: PeerId,
}

/// Peers known to a single lookup, each labeled with a [PeerState].
///
/// Owned by the lookup driver; responses from concurrent requests have to be
/// applied to it one at a time.
#[derive(Debug, Clone)]
pub struct QueryPeerSet {
    target: Key,
    all: Vec<QueryPeerState>,
    /// `all` is sorted by distance to target.
    sorted: bool,
}

impl QueryPeerSet {
    /// Create an empty peer set for a lookup of `target`.
    pub fn new(target: Key) -> Self {
        Self {
            target,
            all: Vec::new(),
            sorted: true,
        }
    }

    // === Getters ===

    pub fn target(&self) -> &Key {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.find(peer).is_some()
    }

    /// All peers and their states, in the order of the last sort.
    pub fn all_states(&self) -> &[QueryPeerState] {
        &self.all
    }

    // === Public Methods ===

    /// Add `peer` in state [PeerState::Heard], and return `true` if it wasn't
    /// already present. Known peers are left untouched.
    pub fn try_add(&mut self, peer: PeerId, referred_by: PeerId) -> bool {
        if self.contains(&peer) {
            return false;
        }

        let distance = peer.key().distance(&self.target);

        self.all.push(QueryPeerState {
            id: peer,
            distance,
            state: PeerState::Heard,
            referred_by,
        });
        self.sorted = false;

        true
    }

    pub fn set_state(&mut self, peer: &PeerId, state: PeerState) -> Result<()> {
        let index = self.index_of(peer)?;
        self.all[index].state = state;

        Ok(())
    }

    pub fn get_state(&self, peer: &PeerId) -> Result<PeerState> {
        Ok(self.all[self.index_of(peer)?].state)
    }

    /// Returns the peer that referred us to `peer`.
    pub fn get_referrer(&self, peer: &PeerId) -> Result<&PeerId> {
        Ok(&self.all[self.index_of(peer)?].referred_by)
    }

    /// Returns up to `n` peers in any of the given `states`, closest to the target first.
    pub fn get_closest_n_in_states(&mut self, n: usize, states: &[PeerState]) -> Vec<PeerId> {
        self.sort();

        self.all
            .iter()
            .filter(|p| states.contains(&p.state))
            .take(n)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Returns all peers in any of the given `states`, closest to the target first.
    pub fn get_closest_in_states(&mut self, states: &[PeerState]) -> Vec<PeerId> {
        self.get_closest_n_in_states(self.all.len(), states)
    }

    pub fn num_heard(&mut self) -> usize {
        self.get_closest_in_states(&[PeerState::Heard]).len()
    }

    pub fn num_waiting(&mut self) -> usize {
        self.get_closest_in_states(&[PeerState::Waiting]).len()
    }

    // === Private Methods ===

    fn sort(&mut self) {
        if self.sorted {
            return;
        }

        self.all.sort_by(|a, b| a.distance.cmp(&b.distance));
        self.sorted = true;
    }

    fn find(&self, peer: &PeerId) -> Option<usize> {
        self.all.iter().position(|p| &p.id == peer)
    }

    fn index_of(&self, peer: &PeerId) -> Result<usize> {
        self.find(peer)
            .ok_or_else(|| Error::UnknownPeer(peer.clone()))
    }
}
