//! Branded ID newtypes.
//!
//! Users, classes, attendance records and live connections each get a
//! distinct id type so a class id can never be passed where a user id is
//! expected. Fresh ids are `<prefix>_<uuid v7>`; ids read back from storage
//! or a token are wrapped verbatim with `from_raw`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new time-ordered id with this type's prefix.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Wrap an existing string value.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(
    /// A registered participant (teacher or student).
    UserId,
    "usr"
);
branded_id!(
    /// A class and its roster.
    ClassId,
    "cls"
);
branded_id!(
    /// A persisted attendance record.
    RecordId,
    "att"
);
branded_id!(
    /// One live WebSocket connection.
    ConnectionId,
    "conn"
);
