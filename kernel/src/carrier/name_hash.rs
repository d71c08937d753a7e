//! `NameHash`: 32-bit identifier of an action or effect capability.
//!
//! Descriptors name capabilities by human-readable strings (`"note"`,
//! `"color"`); the runtime only ever compares their hashes. Hashing is
//! FNV-1a (32-bit), computable in `const` context so capability tables can
//! be keyed at compile time.
//!
//! # Constants
//!
//! | Name          | Value        |
//! |---------------|--------------|
//! | offset basis  | `0x811c9dc5` |
//! | prime         | `0x01000193` |

use std::fmt;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// A 32-bit capability name hash.
///
/// Derives `Ord` for use as `BTreeMap` keys (deterministic registry order).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameHash(u32);

impl NameHash {
    /// Hash a capability name.
    #[must_use]
    pub const fn of(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Wrap a precomputed hash value.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash(0x{:08x})", self.0)
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
