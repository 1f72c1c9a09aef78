//! Keyspace primitives and the routing table surface shared by the lookup core.

mod key;
mod peer;
mod routing_table;

pub use key::*;
pub use peer::*;
pub use routing_table::*;
