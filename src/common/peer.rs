//! Opaque peer identifier
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

use crate::common::key::{write_hex, Key, KEY_SIZE};

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of a peer, as handed out by the transport layer (a public key hash,
/// a multihash, ..).
///
/// Its position in the keyspace is the SHA-256 digest of these bytes, see [PeerId::key].
pub struct PeerId(Bytes);

impl PeerId {
    pub fn new<T: Into<Bytes>>(bytes: T) -> PeerId {
        PeerId(bytes.into())
    }

    pub fn random() -> PeerId {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; KEY_SIZE] = rng.gen();

        PeerId(Bytes::copy_from_slice(&random_bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// This peer's position in the keyspace.
    pub fn key(&self) -> Key {
        Key::digest(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl Debug for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}
