//! Opaque ID newtypes for circuit entities.
//!
//! [`BlockId`], [`NetId`], and [`BlockTypeId`] are thin `u32` wrappers
//! used as arena indices into the [`Circuit`](crate::Circuit). They are
//! `Copy`, `Hash`, and `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize` for direct arena access.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a block (cell instance).
    BlockId
);

define_id!(
    /// Opaque, copyable ID for a net.
    NetId
);

define_id!(
    /// Opaque, copyable ID for a block type (library cell).
    BlockTypeId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn roundtrip() {
        let id = BlockId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn equality() {
        assert_eq!(NetId::from_raw(3), NetId::from_raw(3));
        assert_ne!(NetId::from_raw(3), NetId::from_raw(4));
    }

    #[test]
    fn ordering_follows_raw_index() {
        assert!(BlockId::from_raw(1) < BlockId::from_raw(2));
    }

    #[test]
    fn hash_in_set() {
        let mut set = HashSet::new();
        set.insert(BlockTypeId::from_raw(1));
        set.insert(BlockTypeId::from_raw(2));
        set.insert(BlockTypeId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", NetId::from_raw(7)), "7");
    }

    #[test]
    fn serde_roundtrip() {
        let id = BlockId::from_raw(55);
        let json = serde_json::to_string(&id).unwrap();
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
