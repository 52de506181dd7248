//! Bulk insert, upsert and keyed update operations.

pub mod insert;
pub mod queue;
pub mod statement;
pub mod update;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

pub use insert::{BulkInsert, BulkUpsert};
pub use queue::ValueQueue;
pub use statement::InsertMode;
pub use update::BulkUpdate;

/// Rows per generated statement unless configured otherwise.
pub const DEFAULT_ROWS: usize = 1000;

/// Execution switches, combined with `|`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulkFlags(u32);

impl BulkFlags {
    pub const NONE: Self = Self(0);
    /// Skip rows that collide with an existing key.
    pub const IGNORE_MODE: Self = Self(1);
    /// Drop rows whose values are identical to an earlier queued row.
    pub const IGNORE_DUPLICATES: Self = Self(1 << 1);
    /// Do not ask the executor for the last insert id.
    pub const NO_RETURN_ID: Self = Self(1 << 2);
    /// Stream rows through `COPY ... FROM STDIN` (PostgreSQL).
    pub const COPY_AS_INSERT: Self = Self(1 << 3);

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BulkFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BulkFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for BulkFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::IGNORE_MODE, "IGNORE_MODE"),
            (Self::IGNORE_DUPLICATES, "IGNORE_DUPLICATES"),
            (Self::NO_RETURN_ID, "NO_RETURN_ID"),
            (Self::COPY_AS_INSERT, "COPY_AS_INSERT"),
        ];
        let set: Vec<_> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "BulkFlags(NONE)")
        } else {
            write!(f, "BulkFlags({})", set.join(" | "))
        }
    }
}
