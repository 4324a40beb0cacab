//! Rule Store (component G). Holds one immutable `RuleSnapshot` behind a
//! short-lived read lock so in-flight readers keep their `Arc` after a
//! `swap`; this mirrors the `Arc<RwLock<DnsConfig>>` hot-reload handle the
//! teacher's `ConfigReloader` uses, generalized to rule snapshots with a
//! version counter for the idempotence property in the spec.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::matcher::RuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Domestic,
    International,
    Ads,
}

#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    pub domestic: RuleSet,
    pub international: RuleSet,
    pub ads: RuleSet,
    pub version: u64,
}

impl RuleSnapshot {
    pub fn category(&self, category: Category) -> &RuleSet {
        match category {
            Category::Domestic => &self.domestic,
            Category::International => &self.international,
            Category::Ads => &self.ads,
        }
    }

    /// Content-hash equality ignoring `version`, used for the
    /// subscription-idempotence property: two syncs with no remote
    /// changes must produce hash-equal rule sets.
    pub fn content_eq(&self, other: &RuleSnapshot) -> bool {
        self.domestic == other.domestic
            && self.international == other.international
            && self.ads == other.ads
    }

    pub fn as_map(&self) -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        map.insert("domestic".to_string(), sorted(&self.domestic));
        map.insert("international".to_string(), sorted(&self.international));
        map.insert("ads".to_string(), sorted(&self.ads));
        map
    }
}

fn sorted(set: &RuleSet) -> Vec<String> {
    let mut v: Vec<String> = set.iter().cloned().collect();
    v.sort();
    v
}

pub struct RuleStore {
    current: RwLock<Arc<RuleSnapshot>>,
    next_version: AtomicU64,
}

impl RuleStore {
    pub fn new(initial: RuleSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            next_version: AtomicU64::new(1),
        }
    }

    /// Returns the current snapshot by reference count; the caller holds
    /// its own `Arc` regardless of subsequent swaps.
    pub fn read(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Atomically installs `domestic`/`international`/`ads`, assigning the
    /// next monotonic version.
    pub fn swap(&self, domestic: RuleSet, international: RuleSet, ads: RuleSet) -> Arc<RuleSnapshot> {
        let snapshot = Arc::new(RuleSnapshot {
            domestic,
            international,
            ads,
            version: self.next_version.fetch_add(1, Ordering::SeqCst),
        });
        let mut guard = self.current.write();
        *guard = Arc::clone(&snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::matcher::build_rule_set;

    #[test]
    fn swap_is_atomic_to_readers() {
        let store = RuleStore::new(RuleSnapshot {
            domestic: build_rule_set(["a.com"]),
            international: RuleSet::new(),
            ads: RuleSet::new(),
            version: 0,
        });
        let before = store.read();
        store.swap(build_rule_set(["b.com"]), RuleSet::new(), RuleSet::new());
        assert!(before.domestic.contains("a.com"));
        let after = store.read();
        assert!(after.domestic.contains("b.com"));
        assert!(after.version > before.version);
    }

    #[test]
    fn identical_content_across_swaps_is_content_eq() {
        let store = RuleStore::new(RuleSnapshot {
            domestic: build_rule_set(["a.com"]),
            international: RuleSet::new(),
            ads: RuleSet::new(),
            version: 0,
        });
        let first = store.swap(build_rule_set(["a.com"]), RuleSet::new(), RuleSet::new());
        let second = store.swap(build_rule_set(["a.com"]), RuleSet::new(), RuleSet::new());
        assert_ne!(first.version, second.version);
        assert!(first.content_eq(&second));
    }
}
