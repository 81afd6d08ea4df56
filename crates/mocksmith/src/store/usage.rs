//! Remaining-use accounting for a stored expectation.

use crate::expectation::Times;
use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free counter packing the remaining count and two state bits into a
/// single AtomicU64.
///
/// Decrement and exhaustion happen in one `fetch_update`, so concurrent
/// matches against `Times::exactly(1)` produce exactly one winner.
#[derive(Debug)]
pub struct UsageCounter(AtomicU64);

const RETIRED: u64 = 1 << 63;
const UNLIMITED: u64 = 1 << 62;
const COUNT_MASK: u64 = u32::MAX as u64;

/// Result of consuming one use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
    Unlimited,
    /// Uses left after this one; zero means this match exhausted the entry.
    Remaining(u32),
}

fn count(v: u64) -> u32 {
    (v & COUNT_MASK) as u32
}

fn active(v: u64) -> bool {
    v & RETIRED == 0 && (v & UNLIMITED != 0 || count(v) > 0)
}

impl UsageCounter {
    #[must_use]
    pub fn new(times: Times) -> Self {
        let initial = match times.remaining() {
            None => UNLIMITED,
            Some(n) => u64::from(n),
        };
        Self(AtomicU64::new(initial))
    }

    /// Take one use, or `None` if the entry is exhausted or retired.
    pub fn try_consume(&self) -> Option<Consumed> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                if !active(v) {
                    None
                } else if v & UNLIMITED != 0 {
                    Some(v)
                } else {
                    Some(v - 1)
                }
            })
            .ok()
            .map(|previous| {
                if previous & UNLIMITED != 0 {
                    Consumed::Unlimited
                } else {
                    Consumed::Remaining(count(previous) - 1)
                }
            })
    }

    /// Remaining uses, `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        let v = self.0.load(Ordering::Acquire);
        (v & UNLIMITED == 0).then(|| count(v))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        active(self.0.load(Ordering::Acquire))
    }

    /// Mark retired; returns false if it already was.
    pub fn retire(&self) -> bool {
        self.0.fetch_or(RETIRED, Ordering::AcqRel) & RETIRED == 0
    }

    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.0.load(Ordering::Acquire) & RETIRED != 0
    }

    /// Current count as a `Times` value.
    #[must_use]
    pub fn times(&self) -> Times {
        match self.remaining() {
            None => Times::unlimited(),
            Some(n) => Times::exactly(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_limited_counts_down() {
        let counter = UsageCounter::new(Times::exactly(2));
        assert_eq!(counter.try_consume(), Some(Consumed::Remaining(1)));
        assert_eq!(counter.try_consume(), Some(Consumed::Remaining(0)));
        assert_eq!(counter.try_consume(), None);
        assert!(!counter.is_active());
        assert_eq!(counter.remaining(), Some(0));
    }

    #[test]
    fn test_unlimited_never_exhausts() {
        let counter = UsageCounter::new(Times::unlimited());
        for _ in 0..1000 {
            assert_eq!(counter.try_consume(), Some(Consumed::Unlimited));
        }
        assert_eq!(counter.remaining(), None);
        assert!(counter.times().is_unlimited());
    }

    #[test]
    fn test_zero_times_starts_inactive() {
        let counter = UsageCounter::new(Times::exactly(0));
        assert!(!counter.is_active());
        assert_eq!(counter.try_consume(), None);
    }

    #[test]
    fn test_retire_blocks_consumption() {
        let counter = UsageCounter::new(Times::unlimited());
        assert!(counter.retire());
        assert!(!counter.retire());
        assert!(counter.is_retired());
        assert_eq!(counter.try_consume(), None);
    }

    #[test]
    fn test_single_use_has_one_winner() {
        for _ in 0..50 {
            let counter = Arc::new(UsageCounter::new(Times::once()));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let counter = Arc::clone(&counter);
                    thread::spawn(move || counter.try_consume().is_some())
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }
}
