//! Identifier and rank types for the Kanvas wire format.
//!
//! Identifiers are server-assigned integers. Negative values never come from
//! the server; clients use them for optimistic entities that have not been
//! confirmed yet (see [`ColumnId::is_temporary`]).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw integer value.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw integer value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }

            /// Whether this identifier was allocated locally for an
            /// unconfirmed entity.
            #[must_use]
            pub const fn is_temporary(self) -> bool {
                self.0 < 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

integer_id!(
    /// Identifies a board.
    BoardId
);
integer_id!(
    /// Identifies a column within a board.
    ColumnId
);
integer_id!(
    /// Identifies a task.
    TaskId
);
integer_id!(
    /// Identifies a board membership (not the user behind it).
    MemberId
);
integer_id!(
    /// Identifies a user account.
    UserId
);

/// Opaque ordering value among siblings (`orderIndex` on the wire).
///
/// Ranks are assigned by the server and need not be integral or contiguous.
/// Comparison uses IEEE total ordering so that sorting never panics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(f64);

impl Rank {
    /// Wraps a raw rank value.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw rank value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Total ordering between two ranks.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Rank {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
