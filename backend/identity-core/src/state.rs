//! Helpers for the in-memory registries
//!
//! Every registry is a `DashMap` mutated through single atomic operations.
//! `Lease` implements "remove now, put back unless consumed", which is how
//! MFA sessions and refresh records stay single-use while surviving a failed
//! or cancelled attempt.
use chrono::Utc;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};

/// An entry removed from a map, reinserted on drop unless discarded
pub(crate) struct Lease<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    map: &'a DashMap<K, V>,
    key: K,
    value: V,
    restore: bool,
}

impl<'a, K, V> Lease<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Atomically remove `key`; `None` if absent (or already taken by someone else)
    pub(crate) fn take(map: &'a DashMap<K, V>, key: &K) -> Option<Self> {
        map.remove(key).map(|(key, value)| Self {
            map,
            key,
            value,
            restore: true,
        })
    }

    pub(crate) fn value(&self) -> &V {
        &self.value
    }

    /// Consume the entry for good
    pub(crate) fn discard(mut self) -> V {
        self.restore = false;
        self.value.clone()
    }
}

impl<K, V> Drop for Lease<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if self.restore {
            self.map.insert(self.key.clone(), self.value.clone());
        }
    }
}

/// Rate limit for opportunistic sweeps
///
/// Sweeping walks every shard, so mutating calls sweep at most once per interval.
#[derive(Debug)]
pub(crate) struct SweepGate {
    interval_secs: i64,
    last_sweep: AtomicI64,
}

impl SweepGate {
    pub(crate) fn new(interval_secs: i64) -> Self {
        Self {
            interval_secs,
            last_sweep: AtomicI64::new(0),
        }
    }

    /// True for exactly one caller per interval
    pub(crate) fn should_sweep(&self) -> bool {
        let now = Utc::now().timestamp();
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now - last < self.interval_secs {
            return false;
        }
        self.last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for SweepGate {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_restores_on_drop() {
        let map: DashMap<String, u32> = DashMap::new();
        map.insert("k".to_string(), 7);

        {
            let lease = Lease::take(&map, &"k".to_string()).expect("entry present");
            assert_eq!(*lease.value(), 7);
            assert!(map.get("k").is_none(), "entry must be gone while leased");
        }

        assert_eq!(map.get("k").map(|v| *v), Some(7));
    }

    #[test]
    fn test_lease_discard_removes_for_good() {
        let map: DashMap<String, u32> = DashMap::new();
        map.insert("k".to_string(), 7);

        let lease = Lease::take(&map, &"k".to_string()).expect("entry present");
        assert_eq!(lease.discard(), 7);
        assert!(map.is_empty());
    }

    #[test]
    fn test_second_take_fails_while_leased() {
        let map: DashMap<String, u32> = DashMap::new();
        map.insert("k".to_string(), 1);

        let first = Lease::take(&map, &"k".to_string());
        let second = Lease::take(&map, &"k".to_string());
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_sweep_gate_admits_once_per_interval() {
        let gate = SweepGate::new(3600);
        assert!(gate.should_sweep());
        assert!(!gate.should_sweep());

        let always = SweepGate::new(0);
        assert!(always.should_sweep());
        assert!(always.should_sweep());
    }
}
