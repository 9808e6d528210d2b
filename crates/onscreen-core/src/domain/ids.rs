//! Domain identifiers (strongly-typed IDs).
//!
//! Two kinds of identity live in the scheduler:
//! - [`ItemId`]: the stable key of one item in the collection. It is the
//!   registry key and the join key between visible-set reports and records.
//! - [`UnitId`]: the identity of one work unit (one execution attempt of one
//!   stage for one item). ULID based, so ids sort by creation time.
//!
//! A late completion is matched against the registry by `UnitId`, never by
//! `ItemId` alone: a unit that was cancelled and replaced by a newer unit for
//! the same item must not be able to complete the newer one.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one item (its position in the ordered manifest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Identifier of one work unit.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(Ulid);

impl UnitId {
    /// Allocate a fresh id.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for UnitId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_displays_with_prefix() {
        assert_eq!(ItemId::new(7).to_string(), "item-7");
        assert_eq!(ItemId::from(3).as_u64(), 3);
    }

    #[test]
    fn item_id_serializes_as_plain_number() {
        let s = serde_json::to_string(&ItemId::new(42)).unwrap();
        assert_eq!(s, "42");
    }

    #[test]
    fn unit_ids_are_unique_and_sortable() {
        let a = UnitId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = UnitId::generate();

        assert_ne!(a, b);
        assert!(a < b);
        assert!(a.to_string().starts_with("unit-"));
    }

    #[test]
    fn unit_id_is_ulid_sized() {
        assert_eq!(std::mem::size_of::<UnitId>(), std::mem::size_of::<Ulid>());
    }
}
