//! Server identifiers
//!
//! Every record the remote owns is addressed by a `u64` newtype. The client
//! never sends an identifier it made up: optimistic creates use
//! *provisional* ids from the upper half of the range, and those are swapped
//! for the server's id on reconciliation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First value of the provisional id range.
pub const PROVISIONAL_BASE: u64 = 1 << 63;

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw server id
            #[inline]
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Provisional id for an optimistic record
            #[inline]
            #[must_use]
            pub const fn provisional(seq: u64) -> Self {
                Self(PROVISIONAL_BASE | seq)
            }

            /// Raw value
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Whether this id was minted locally and is not yet known to the remote
            #[inline]
            #[must_use]
            pub const fn is_provisional(self) -> bool {
                self.0 & PROVISIONAL_BASE != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_provisional() {
                    write!(f, "{}~{}", $prefix, self.0 & !PROVISIONAL_BASE)
                } else {
                    write!(f, "{}{}", $prefix, self.0)
                }
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

server_id!(
    /// Catalog directory identifier
    DirectoryId,
    "dir:"
);
server_id!(
    /// Uploaded layer identifier
    LayerId,
    "layer:"
);
server_id!(
    /// Map project identifier
    ProjectId,
    "project:"
);
server_id!(
    /// Identifier of one slot in a project's layer stack
    ProjectLayerId,
    "entry:"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_are_disjoint_from_server_ids() {
        let server = DirectoryId::new(42);
        let local = DirectoryId::provisional(42);

        assert!(!server.is_provisional());
        assert!(local.is_provisional());
        assert_ne!(server, local);
    }

    #[test]
    fn display_marks_provisional() {
        assert_eq!(LayerId::new(7).to_string(), "layer:7");
        assert_eq!(ProjectLayerId::provisional(3).to_string(), "entry:~3");
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&DirectoryId::new(12)).unwrap();
        assert_eq!(json, "12");

        let back: DirectoryId = serde_json::from_str("12").unwrap();
        assert_eq!(back, DirectoryId::new(12));
    }
}
