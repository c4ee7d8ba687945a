//! Filter engine: policy and orchestration over the entry store
//!
//! Every operation is a sweep-then-act transaction: expired entries are
//! dropped before the operation looks at the store, so no caller ever
//! observes a stale entry as still active. There is no background timer.
//!
//! Operations take the clock instant explicitly, which keeps expiry
//! behavior testable without sleeping; callers pass `Utc::now()`.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FilterError, Result};
use crate::mask::AddressMask;
use crate::store::{FilterEntry, FilterStore};

/// What the stored entries mean.
///
/// In deny mode entries are addresses to reject (a blocklist); in allow
/// mode they are the only addresses permitted. On disk this is the
/// `filterban` flag: 1 = deny, 0 = allow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Deny,
    Allow,
}

impl FilterMode {
    pub fn as_flag(self) -> u8 {
        match self {
            FilterMode::Deny => 1,
            FilterMode::Allow => 0,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            1 => Some(FilterMode::Deny),
            0 => Some(FilterMode::Allow),
            _ => None,
        }
    }
}

/// One row of `list` output: the mask plus its remaining lifetime in
/// whole minutes, `None` for permanent entries.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ListedFilter {
    pub mask: AddressMask,
    pub remaining_minutes: Option<i64>,
}

impl ListedFilter {
    pub fn duration_label(&self) -> String {
        match self.remaining_minutes {
            None => "permanent".to_string(),
            Some(1) => "1 min".to_string(),
            Some(n) => format!("{} mins", n),
        }
    }
}

/// The filter engine: mode flag plus entry store.
///
/// Stateless beyond these two; there is no multi-step protocol.
#[derive(Debug)]
pub struct FilterEngine {
    mode: FilterMode,
    store: FilterStore,
}

impl FilterEngine {
    pub fn new(mode: FilterMode, capacity: usize) -> Self {
        Self {
            mode,
            store: FilterStore::with_capacity(capacity),
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FilterEntry> {
        self.store.iter()
    }

    /// Drop expired entries. Runs implicitly at the start of every other
    /// operation; exposed for callers (persistence) that read the store
    /// directly.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        self.store.sweep_expired(now)
    }

    /// Permit/deny decision for an inbound connection attempt.
    ///
    /// Returns true when the connection may proceed: in deny mode, no
    /// entry contains `addr`; in allow mode, some entry does.
    pub fn check(&mut self, addr: IpAddr, now: DateTime<Utc>) -> bool {
        self.sweep(now);
        let matched = self.store.iter().any(|e| e.mask.contains(addr));
        match self.mode {
            FilterMode::Deny => !matched,
            FilterMode::Allow => matched,
        }
    }

    /// Add a filter entry. A duration of zero minutes means permanent,
    /// never "immediately expired".
    pub fn add(&mut self, text: &str, duration_minutes: u32, now: DateTime<Utc>) -> Result<()> {
        self.sweep(now);

        if self.store.is_full() {
            return Err(FilterError::Full(self.store.capacity()));
        }

        let mask = AddressMask::parse(text)?;
        let entry = if duration_minutes == 0 {
            FilterEntry::permanent(mask)
        } else {
            FilterEntry::expiring(mask, now + Duration::minutes(i64::from(duration_minutes)))
        };

        self.store.insert(entry)?;
        debug!(mask = %mask, duration_minutes, "added filter");
        Ok(())
    }

    /// Remove the first entry whose mask matches `text` exactly, both
    /// address bytes and prefix length. Containment does not count:
    /// removing `192.0.2.5` does not touch a `192.0.2.0/24` entry.
    pub fn remove(&mut self, text: &str, now: DateTime<Utc>) -> Result<AddressMask> {
        self.sweep(now);

        let mask = AddressMask::parse(text)?;
        let position = self.store.iter().position(|e| e.mask == mask);
        match position {
            Some(index) => {
                self.store.remove_at(index);
                debug!(mask = %mask, "removed filter");
                Ok(mask)
            }
            None => Err(FilterError::NotFound(text.to_string())),
        }
    }

    /// Snapshot of the live entries with remaining lifetimes. Minutes
    /// round toward zero.
    pub fn list(&mut self, now: DateTime<Utc>) -> Vec<ListedFilter> {
        self.sweep(now);
        self.store
            .iter()
            .map(|e| ListedFilter {
                mask: e.mask,
                remaining_minutes: e.expires_at.map(|at| (at - now).num_minutes()),
            })
            .collect()
    }

    /// Full wipe of the store; the mode flag is untouched.
    pub fn reset(&mut self) {
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_deny_mode_check() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        engine.add("198.51.100.0/24", 0, now).unwrap();

        assert!(!engine.check(ip("198.51.100.5"), now));
        assert!(engine.check(ip("203.0.113.5"), now));
    }

    #[test]
    fn test_allow_mode_inverts() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Allow, 16);
        engine.add("198.51.100.0/24", 0, now).unwrap();

        assert!(engine.check(ip("198.51.100.5"), now));
        assert!(!engine.check(ip("203.0.113.5"), now));
    }

    #[test]
    fn test_empty_deny_store_permits_everything() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        assert!(engine.check(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), now));
    }

    #[test]
    fn test_timed_entry_expires_but_permanent_stays() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        engine.add("203.0.113.1", 0, now).unwrap();
        engine.add("203.0.113.2", 1, now).unwrap();
        assert_eq!(engine.list(now).len(), 2);

        let later = now + Duration::seconds(61);
        let listed = engine.list(later);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mask, AddressMask::parse("203.0.113.1").unwrap());
        assert!(listed[0].remaining_minutes.is_none());

        // the expired entry no longer affects the check path either
        assert!(engine.check(ip("203.0.113.2"), later));
        assert!(!engine.check(ip("203.0.113.1"), later));
    }

    #[test]
    fn test_zero_duration_is_permanent() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        engine.add("203.0.113.1", 0, now).unwrap();

        let far = now + Duration::days(365);
        assert_eq!(engine.list(far).len(), 1);
    }

    #[test]
    fn test_list_reports_remaining_minutes() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        engine.add("203.0.113.2", 10, now).unwrap();

        // 2.5 minutes later: 7.5 minutes left, reported as 7
        let listed = engine.list(now + Duration::seconds(150));
        assert_eq!(listed[0].remaining_minutes, Some(7));
        assert_eq!(listed[0].duration_label(), "7 mins");
    }

    #[test]
    fn test_remove_requires_exact_match() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        engine.add("192.0.2.0/24", 0, now).unwrap();

        // contained in the /24 but not an exact match
        let err = engine.remove("192.0.2.5", now);
        assert!(matches!(err, Err(FilterError::NotFound(_))));
        assert_eq!(engine.len(), 1);

        engine.remove("192.0.2.0/24", now).unwrap();
        assert!(engine.is_empty());
    }

    #[test]
    fn test_remove_missing_leaves_store_unchanged() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        engine.add("192.0.2.1", 0, now).unwrap();

        assert!(matches!(
            engine.remove("198.51.100.1", now),
            Err(FilterError::NotFound(_))
        ));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_add_beyond_capacity_leaves_store_unchanged() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 2);
        engine.add("192.0.2.1", 0, now).unwrap();
        engine.add("192.0.2.2", 0, now).unwrap();

        assert!(matches!(
            engine.add("192.0.2.3", 0, now),
            Err(FilterError::Full(2))
        ));
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn test_add_bad_address_reported() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        assert!(matches!(
            engine.add("bogus/99", 0, now),
            Err(FilterError::BadAddress(_))
        ));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_expired_slot_freed_before_capacity_check() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 1);
        engine.add("192.0.2.1", 1, now).unwrap();

        // the timed entry has lapsed, so the slot is free again
        let later = now + Duration::minutes(2);
        engine.add("192.0.2.2", 0, later).unwrap();
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_duplicates_each_match_independently() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Deny, 16);
        engine.add("192.0.2.1", 0, now).unwrap();
        engine.add("192.0.2.1", 0, now).unwrap();
        assert_eq!(engine.len(), 2);

        engine.remove("192.0.2.1", now).unwrap();
        assert_eq!(engine.len(), 1);
        assert!(!engine.check(ip("192.0.2.1"), now));
    }

    #[test]
    fn test_reset_clears_store_keeps_mode() {
        let now = Utc::now();
        let mut engine = FilterEngine::new(FilterMode::Allow, 16);
        engine.add("192.0.2.1", 0, now).unwrap();

        engine.reset();
        assert!(engine.is_empty());
        assert_eq!(engine.mode(), FilterMode::Allow);
    }
}
