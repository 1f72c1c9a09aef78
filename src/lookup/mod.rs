//! Bookkeeping for a single iterative lookup.
//!
//! A lookup driver seeds a [QueryPeerSet] with the closest peers from its
//! routing table, then repeatedly picks the closest [PeerState::Heard] peers,
//! marks them [PeerState::Waiting] while their request is in flight, and adds
//! the peers they return. It terminates once the closest `k` peers have all
//! been queried or turned out unreachable.

mod peer_set;

pub use peer_set::*;
