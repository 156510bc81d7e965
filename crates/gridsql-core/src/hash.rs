//! Stable hashing helpers for plan fingerprints and run digests.

use blake3::Hasher;

use crate::types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }

    /// First 8 hex chars; enough to correlate log lines.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(8);
        hex
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

/// Digest of a scalar tuple, e.g. a sorted-prefix value of an aggregate run.
pub fn hash_scalars(values: &[Scalar]) -> Hash256 {
    let mut h = Hasher::new();
    for v in values {
        hash_scalar(v, &mut h);
    }
    Hash256(h.finalize().into())
}

fn hash_scalar(scalar: &Scalar, hasher: &mut Hasher) {
    use Scalar::*;

    // Write type discriminant first
    let tag: u8 = match scalar {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F64(_) => 4,
        Str(_) => 5,
    };
    hasher.update(&[tag]);

    match scalar {
        Null => {}
        Bool(b) => {
            hasher.update(&[*b as u8]);
        }
        I32(i) => {
            hasher.update(&i.to_le_bytes());
        }
        I64(i) => {
            hasher.update(&i.to_le_bytes());
        }
        F64(f) => {
            let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
            hasher.update(&bits.to_le_bytes());
        }
        Str(s) => {
            // Length first so ("ab","c") and ("a","bc") differ.
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
    }
}
