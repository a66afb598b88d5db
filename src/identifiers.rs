use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifier Types
// ============================================================================
//
// One newtype per identifier role so a FlashId can never be passed where a
// TimeUuid is expected. All of them serialize as the canonical hyphenated
// UUID string, and the nil UUID is the "unset" value.
//
// The store-assigned document id is a BSON ObjectId and is used directly.
//
// ============================================================================

pub use bson::oid::ObjectId;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// The "unset" identifier.
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Parse the canonical string form.
            pub fn parse_str(input: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(input).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_str(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_identifier!(
    /// Identifies one flash sale offer.
    FlashId
);

uuid_identifier!(
    /// Identifies the retail item on sale.
    ItemId
);

uuid_identifier!(
    /// Identifies the sensor device reporting ethylene readings.
    DeviceId
);

uuid_identifier!(
    /// Groups every event belonging to one logical transaction.
    CorrelationId
);

uuid_identifier!(
    /// Identifies the user who emitted an event.
    UserId
);

uuid_identifier!(
    /// Per-event, time-sortable identifier.
    ///
    /// Unique for each published event, which makes it the precise key for
    /// matching a query with its one response.
    TimeUuid
);

impl TimeUuid {
    /// Generate a fresh UUIDv7. Values generated by this process sort in
    /// creation order.
    pub fn now() -> Self {
        Self(Uuid::now_v7())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
