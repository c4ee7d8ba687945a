//! Capacity-bounded filter entry store
//!
//! Entries are held in a flat vector with no ordering guarantee: removal
//! moves the last entry into the vacated slot. Callers must not assume
//! stable indices across calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::mask::AddressMask;

/// A single filter entry: a mask, optionally time-limited.
///
/// `expires_at: None` means permanent; there is no other sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub mask: AddressMask,
    pub expires_at: Option<DateTime<Utc>>,
}

impl FilterEntry {
    pub fn permanent(mask: AddressMask) -> Self {
        Self {
            mask,
            expires_at: None,
        }
    }

    pub fn expiring(mask: AddressMask, at: DateTime<Utc>) -> Self {
        Self {
            mask,
            expires_at: Some(at),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Order-unstable collection of filter entries with a fixed capacity.
#[derive(Debug, Clone)]
pub struct FilterStore {
    entries: Vec<FilterEntry>,
    capacity: usize,
}

impl FilterStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append an entry. Duplicates are not rejected; each is matched
    /// independently.
    pub fn insert(&mut self, entry: FilterEntry) -> Result<()> {
        if self.is_full() {
            return Err(FilterError::Full(self.capacity));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove the entry at `index` in O(1) by moving the last entry into
    /// its slot. Panics on an out-of-range index, which is a caller bug.
    pub fn remove_at(&mut self, index: usize) -> FilterEntry {
        self.entries.swap_remove(index)
    }

    /// Remove every entry whose expiry has passed. When an entry is
    /// removed, the entry swapped into its slot is examined before the
    /// index advances. Idempotent; returns the number removed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].is_expired(now) {
                self.entries.swap_remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
