//! Identifier newtypes used throughout the core.
//!
//! These wrap the raw wire-sized integers in distinct types so that,
//! for example, a `SessionId` and an `ExchangeId` (both `u16`) can never
//! be silently swapped at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! wire_id {
    ($name:ident, $repr:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
        pub struct $name(pub $repr);

        impl $name {
            /// The raw wire representation.
            pub fn value(self) -> $repr {
                self.0
            }
        }

        impl From<$repr> for $name {
            fn from(v: $repr) -> Self {
                Self(v)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

wire_id!(NodeId, u64, "A 64-bit operational node identifier.");
wire_id!(SessionId, u16, "A locally-scoped 16-bit secure session identifier.");
wire_id!(ExchangeId, u16, "A 16-bit exchange identifier, scoped to (session, role).");
wire_id!(GroupId, u16, "A 16-bit multicast group identifier.");

/// Fabric index (Matter fabrics are indexed 1..=254 within a node's
/// fabric table; 0 is reserved/unspecified).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Debug, Serialize, Deserialize)]
pub struct FabricIndex(pub u8);

impl FabricIndex {
    /// The reserved "no fabric" index.
    pub const NONE: FabricIndex = FabricIndex(0);

    /// Whether this index refers to an actual commissioned fabric.
    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

/// Role of an endpoint within an exchange.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum Role {
    /// The side that allocated the exchange and sent the first message.
    Initiator,
    /// The side that received the first message.
    Responder,
}

impl Role {
    /// The role the far end of the conversation sees: initiator traffic
    /// is handled by a responder, and vice versa.
    pub fn complementary(is_initiator_traffic: bool) -> Role {
        if is_initiator_traffic {
            Role::Responder
        } else {
            Role::Initiator
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_roundtrip() {
        let id = NodeId::from(42u64);
        assert_eq!(id.value(), 42);
        assert_eq!(format!("{id}"), "42");
    }

    #[test]
    fn fabric_index_none() {
        assert!(!FabricIndex::NONE.is_some());
        assert!(FabricIndex(1).is_some());
    }

    #[test]
    fn role_complementary() {
        assert_eq!(Role::complementary(true), Role::Responder);
        assert_eq!(Role::complementary(false), Role::Initiator);
    }
}
