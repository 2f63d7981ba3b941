//! Opaque 64-bit identifiers.
//!
//! Equality and hashing follow the raw value. `Ord` exists so the ids can key
//! ordered maps; it carries no meaning beyond that.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Reserved value that never names a real entity.
            pub const INVALID: Self = Self(0);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn value(self) -> u64 {
                self.0
            }

            pub const fn is_valid(self) -> bool {
                self.0 != Self::INVALID.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}:{}", $label, self.0)
                } else {
                    write!(f, "{}:invalid", $label)
                }
            }
        }
    };
}

define_id!(
    /// A logical piece of renderable content with its own lifecycle.
    ContentId,
    "content"
);

define_id!(
    /// Consumer-side region that contents are offered into.
    Category,
    "category"
);

define_id!(
    /// The underlying renderable resource (scene or surface) a content maps to.
    ///
    /// Several contents may share one descriptor.
    TechnicalContentDescriptor,
    "resource"
);

define_id!(
    /// A process taking part in the protocol, local or remote.
    ParticipantId,
    "participant"
);
