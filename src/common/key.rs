//! Kademlia keyspace point and XOR distance
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug, Display, Formatter};

/// The size of keyspace points in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of keyspace points in bits.
pub const KEY_BITS: usize = KEY_SIZE * 8;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// A point in the 256-bit Kademlia keyspace, either a peer's position or a lookup target.
pub struct Key(#[serde(with = "serde_bytes")] pub [u8; KEY_SIZE]);

impl Key {
    pub fn random() -> Key {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; KEY_SIZE] = rng.gen();

        Key(random_bytes)
    }

    /// Map arbitrary bytes (a peer identifier, a content key, ..) into the keyspace.
    pub fn digest<T: AsRef<[u8]>>(bytes: T) -> Key {
        Key(Sha256::digest(bytes.as_ref()).into())
    }

    /// XOR distance between this key and another key.
    pub fn distance(&self, other: &Key) -> Distance {
        let mut xor = [0_u8; KEY_SIZE];

        for (i, byte) in xor.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }

        Distance(xor)
    }

    /// Number of leading bits this key shares with `other`.
    ///
    /// Common prefix length with self is [KEY_BITS].
    pub fn common_prefix_len(&self, other: &Key) -> usize {
        self.distance(other).leading_zeros()
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Exact XOR distance between two [Key]s, as a 256-bit big-endian unsigned integer.
///
/// Ordering is numeric and lossless, so distances that differ only in their
/// lowest bits never compare as equal.
pub struct Distance([u8; KEY_SIZE]);

impl Distance {
    pub const ZERO: Distance = Distance([0; KEY_SIZE]);
    /// The largest distance in the keyspace, `2^256 - 1`.
    pub const MAX: Distance = Distance([u8::MAX; KEY_SIZE]);

    pub fn leading_zeros(&self) -> usize {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return i * 8 + byte.leading_zeros() as usize;
            }
        }

        KEY_BITS
    }

    /// Lossy conversion to a float, monotone in the distance.
    pub fn to_f64(&self) -> f64 {
        self.0
            .iter()
            .fold(0.0_f64, |acc, byte| acc * 256.0 + *byte as f64)
    }

    /// This distance divided by [Distance::MAX], in `[0, 1]`.
    pub fn normed(&self) -> f64 {
        self.to_f64() / Distance::MAX.to_f64()
    }
}

impl Debug for Distance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Distance(")?;
        write_hex(f, &self.0)?;
        write!(f, ")")
    }
}

pub(crate) fn write_hex(f: &mut Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }

    Ok(())
}
