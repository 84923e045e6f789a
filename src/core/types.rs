//! Identifiers, priority tiers, and the per-tier balance vector.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Number of paid priority tiers.
pub const NUM_PRIORITIES: usize = 4;

/// Priority tier. `0` is the most expensive paid tier; larger is cheaper.
pub type Priority = usize;

/// Sentinel tier for unpaid, best-effort work. Never billed.
pub const FREE_BUCKET: Priority = NUM_PRIORITIES;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a caller-assigned identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (and therefore invalid).
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Tenant identifier.
    AccountId
);
string_id!(
    /// Execution agent identifier.
    WorkerId
);
string_id!(
    /// Unit-of-work identifier.
    RequestId
);

/// Banked execution-seconds, one slot per paid priority tier.
///
/// Slots may be negative: a tier is overdrawn when running tasks cost more
/// than the account earns at that tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance([f64; NUM_PRIORITIES]);

impl Balance {
    /// All-zero balance.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0.0; NUM_PRIORITIES])
    }

    /// Build a balance from a prefix of tier values; missing tiers are zero.
    ///
    /// # Panics
    ///
    /// Panics if `values` has more than [`NUM_PRIORITIES`] entries. That is a
    /// caller bug, not a runtime condition.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Self {
        assert!(
            values.len() <= NUM_PRIORITIES,
            "balance has {} entries, at most {NUM_PRIORITIES} allowed",
            values.len()
        );
        let mut slots = [0.0; NUM_PRIORITIES];
        slots[..values.len()].copy_from_slice(values);
        Self(slots)
    }

    /// Value at `priority`, or zero for [`FREE_BUCKET`] and beyond.
    #[must_use]
    pub fn get(&self, priority: Priority) -> f64 {
        self.0.get(priority).copied().unwrap_or(0.0)
    }

    /// Sum over all tiers.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Add `other` slot-wise.
    pub fn add_assign(&mut self, other: &Self) {
        for (slot, value) in self.0.iter_mut().zip(other.0.iter()) {
            *slot += value;
        }
    }

    /// Tier values in priority order.
    #[must_use]
    pub const fn as_array(&self) -> &[f64; NUM_PRIORITIES] {
        &self.0
    }
}

impl Index<Priority> for Balance {
    type Output = f64;

    fn index(&self, priority: Priority) -> &f64 {
        &self.0[priority]
    }
}

impl IndexMut<Priority> for Balance {
    fn index_mut(&mut self, priority: Priority) -> &mut f64 {
        &mut self.0[priority]
    }
}

impl From<[f64; NUM_PRIORITIES]> for Balance {
    fn from(slots: [f64; NUM_PRIORITIES]) -> Self {
        Self(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_pads_with_zero() {
        let b = Balance::from_slice(&[1.0, 2.0]);
        assert_eq!(b.as_array(), &[1.0, 2.0, 0.0, 0.0]);
        assert!((b.total() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "at most")]
    fn test_from_slice_rejects_oversized() {
        let _ = Balance::from_slice(&[0.0; NUM_PRIORITIES + 1]);
    }

    #[test]
    fn test_get_free_bucket_is_zero() {
        let b = Balance::from_slice(&[1.0, 1.0, 1.0, 1.0]);
        assert!(b.get(FREE_BUCKET).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ids_are_distinct_types() {
        let a = AccountId::from("x");
        let r = RequestId::from("x");
        assert_eq!(a.as_str(), r.as_str());
        assert!(!a.is_empty());
        assert!(WorkerId::new("").is_empty());
    }
}
