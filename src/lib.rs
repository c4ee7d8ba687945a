//! Connection-time IP filtering with CIDR masks and timed bans
//!
//! Admits or rejects network peers by address at connect time. Entries
//! are CIDR-style masks, optionally time-limited; expiry is evaluated
//! lazily before every operation, not by a background timer. Permanent
//! entries survive restarts through a replayable line-oriented file.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use connfilter::{FilterEngine, FilterMode};
//!
//! let mut engine = FilterEngine::new(FilterMode::Deny, 1024);
//! let now = Utc::now();
//!
//! // permanent ban on a /24, 30-minute ban on a single host
//! engine.add("198.51.100.0/24", 0, now).unwrap();
//! engine.add("203.0.113.7", 30, now).unwrap();
//!
//! assert!(!engine.check("198.51.100.5".parse().unwrap(), now));
//! assert!(engine.check("192.0.2.1".parse().unwrap(), now));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod mask;
pub mod persist;
pub mod store;

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

pub use config::Config;
pub use engine::{FilterEngine, FilterMode, ListedFilter};
pub use error::{FilterError, Result};
pub use mask::AddressMask;
pub use store::{FilterEntry, FilterStore};

/// Cloneable handle for exposing one engine to both the connection-accept
/// path and an administrative surface.
///
/// A single lock guards the whole sweep-then-act sequence of every
/// operation; no two operations interleave.
#[derive(Clone)]
pub struct SharedFilter {
    inner: Arc<Mutex<FilterEngine>>,
}

impl SharedFilter {
    pub fn new(engine: FilterEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Connection-accept hook: `false` means the connection must be
    /// refused.
    pub fn check(&self, addr: IpAddr) -> bool {
        self.inner.lock().check(addr, Utc::now())
    }

    /// Run an administrative operation under the engine lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut FilterEngine) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_filter_check_and_admin() {
        let shared = SharedFilter::new(FilterEngine::new(FilterMode::Deny, 16));

        shared
            .with(|engine| engine.add("198.51.100.0/24", 0, Utc::now()))
            .unwrap();

        assert!(!shared.check("198.51.100.9".parse().unwrap()));
        assert!(shared.check("203.0.113.9".parse().unwrap()));

        let other = shared.clone();
        other.with(|engine| engine.reset());
        assert!(shared.check("198.51.100.9".parse().unwrap()));
    }
}
