//! Sliding-window brute-force lockout tracking.
//!
//! Failed authentication attempts are tracked per caller identifier in a
//! concurrent map owned by the guard instance. An identifier that
//! accumulates `max_attempts` failures inside the trailing window is
//! locked until the oldest surviving failure leaves the window. The
//! window slides rather than resetting in fixed buckets, so attempts
//! timed around a bucket edge cannot double the effective budget.
//!
//! Pruning happens lazily inside [`check`](BruteForceGuard::check) and
//! [`record_failure`](BruteForceGuard::record_failure); a periodic
//! [`sweep`](BruteForceGuard::sweep) drops identifiers that never retried
//! so the map stays bounded. No method here fails: an unknown identifier
//! is simply clean.
//!
//! # Identifier weakness
//!
//! Callers key attempts by an opaque identifier, conventionally a
//! "source-address + username" composite. The composite conflates per-IP
//! and per-account lockout: a single hostile address can lock a
//! legitimate account on purpose by failing logins against it. Splitting
//! the two budgets is the embedding process's decision; this module
//! tracks whatever identifier it is handed.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Default sliding window, in seconds (15 minutes).
pub const DEFAULT_WINDOW_SECS: i64 = 15 * 60;

/// Default failures tolerated inside the window.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Outcome of a lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutStatus {
    /// The identifier may attempt authentication.
    Allowed {
        /// Failures remaining before lockout.
        attempts_left: usize,
    },
    /// The identifier is locked out.
    Locked {
        /// Seconds until the oldest surviving failure leaves the window,
        /// rounded up.
        seconds_left: i64,
        /// Failures currently inside the window.
        attempt_count: usize,
    },
}

/// Per-identifier failed-attempt tracking with temporary lockout.
///
/// State is owned by the instance, so independent guards are fully
/// isolated and tests can build as many as they like. Every method takes
/// the clock as an explicit `now`.
///
/// Each operation locks only the map entry it touches: a `check` and a
/// `record_failure` racing on one identifier serialize against each
/// other, while other identifiers proceed on other shards.
#[derive(Debug)]
pub struct BruteForceGuard {
    window: Duration,
    max_attempts: usize,
    attempts: DashMap<String, Vec<DateTime<Utc>>>,
}

impl Default for BruteForceGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl BruteForceGuard {
    /// Create a guard with the default policy: 5 failures per 15 minutes.
    pub fn new() -> Self {
        Self::with_policy(Duration::seconds(DEFAULT_WINDOW_SECS), DEFAULT_MAX_ATTEMPTS)
    }

    /// Create a guard with a custom window and attempt budget.
    ///
    /// `max_attempts` is clamped to at least 1.
    pub fn with_policy(window: Duration, max_attempts: usize) -> Self {
        Self {
            window,
            max_attempts: max_attempts.max(1),
            attempts: DashMap::new(),
        }
    }

    /// Evaluate `identifier` at `now`.
    ///
    /// Attempts older than the window are pruned before counting. With
    /// `max_attempts` or more failures left inside the window the
    /// identifier is [`LockoutStatus::Locked`] for as long as the oldest
    /// surviving failure remains inside it.
    pub fn check(&self, identifier: &str, now: DateTime<Utc>) -> LockoutStatus {
        let Some(mut entry) = self.attempts.get_mut(identifier) else {
            return LockoutStatus::Allowed {
                attempts_left: self.max_attempts,
            };
        };

        let cutoff = now - self.window;
        entry.retain(|t| *t > cutoff);

        let count = entry.len();
        if count >= self.max_attempts {
            // Non-empty here: max_attempts >= 1 and count >= max_attempts.
            let oldest = entry.iter().min().copied().unwrap_or(now);
            let release = oldest + self.window;
            // Ceiling division; `i64::div_ceil` is not yet stable.
            let seconds_left = ((release - now).num_milliseconds() + 999).div_euclid(1_000);

            tracing::warn!(identifier, count, seconds_left, "identifier is locked out");
            return LockoutStatus::Locked {
                seconds_left,
                attempt_count: count,
            };
        }

        LockoutStatus::Allowed {
            attempts_left: self.max_attempts - count,
        }
    }

    /// Record a failed attempt for `identifier` at `now`.
    ///
    /// Appends unconditionally; recording while locked does not move the
    /// window start, so it cannot extend an existing lock beyond the
    /// newest attempt's own expiry.
    pub fn record_failure(&self, identifier: &str, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        let mut entry = self.attempts.entry(identifier.to_string()).or_default();
        entry.retain(|t| *t > cutoff);
        entry.push(now);

        tracing::debug!(identifier, count = entry.len(), "recorded failed attempt");
    }

    /// Forget every tracked attempt for `identifier`.
    ///
    /// Called on successful authentication.
    pub fn clear(&self, identifier: &str) {
        self.attempts.remove(identifier);
    }

    /// Drop identifiers with no attempt inside the window at `now`.
    ///
    /// Returns how many identifiers were removed. Safe to run concurrently
    /// with the other operations; the map is locked one shard at a time.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.attempts.len();
        self.attempts
            .retain(|_, stamps| stamps.iter().any(|t| *t > cutoff));
        before.saturating_sub(self.attempts.len())
    }

    /// Number of identifiers currently tracked, stale entries included.
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn clean_identifier_is_allowed() {
        let guard = BruteForceGuard::new();
        assert_eq!(
            guard.check("1.2.3.4-bob", t0()),
            LockoutStatus::Allowed { attempts_left: 5 }
        );
    }

    #[test]
    fn locked_after_max_failures() {
        let guard = BruteForceGuard::new();
        for _ in 0..5 {
            guard.record_failure("1.2.3.4-bob", t0());
        }

        match guard.check("1.2.3.4-bob", t0()) {
            LockoutStatus::Locked {
                seconds_left,
                attempt_count,
            } => {
                assert!(seconds_left > 0);
                assert!(seconds_left <= DEFAULT_WINDOW_SECS);
                assert_eq!(attempt_count, 5);
            }
            other => panic!("expected lockout, got {other:?}"),
        }
    }

    #[test]
    fn sixth_failure_does_not_reset_window_start() {
        let guard = BruteForceGuard::new();
        for _ in 0..5 {
            guard.record_failure("1.2.3.4-bob", t0());
        }
        guard.record_failure("1.2.3.4-bob", t0() + Duration::seconds(60));

        // Release time still follows the oldest attempt at t0.
        match guard.check("1.2.3.4-bob", t0() + Duration::seconds(60)) {
            LockoutStatus::Locked { seconds_left, .. } => {
                assert_eq!(seconds_left, DEFAULT_WINDOW_SECS - 60);
            }
            other => panic!("expected lockout, got {other:?}"),
        }
    }

    #[test]
    fn attempts_expire_after_window() {
        let guard = BruteForceGuard::new();
        for _ in 0..5 {
            guard.record_failure("1.2.3.4-bob", t0());
        }

        let later = t0() + Duration::seconds(DEFAULT_WINDOW_SECS);
        assert_eq!(
            guard.check("1.2.3.4-bob", later),
            LockoutStatus::Allowed { attempts_left: 5 }
        );
    }

    #[test]
    fn partial_budget_reported() {
        let guard = BruteForceGuard::new();
        for _ in 0..3 {
            guard.record_failure("1.2.3.4-bob", t0());
        }
        assert_eq!(
            guard.check("1.2.3.4-bob", t0()),
            LockoutStatus::Allowed { attempts_left: 2 }
        );
    }

    #[test]
    fn oldest_survivor_decides_release_time() {
        let guard = BruteForceGuard::new();
        guard.record_failure("id", t0());
        guard.record_failure("id", t0());
        for _ in 0..3 {
            guard.record_failure("id", t0() + Duration::seconds(300));
        }

        match guard.check("id", t0() + Duration::seconds(600)) {
            LockoutStatus::Locked { seconds_left, .. } => {
                assert_eq!(seconds_left, DEFAULT_WINDOW_SECS - 600);
            }
            other => panic!("expected lockout, got {other:?}"),
        }
    }

    #[test]
    fn clear_resets_identifier() {
        let guard = BruteForceGuard::new();
        for _ in 0..5 {
            guard.record_failure("1.2.3.4-bob", t0());
        }
        guard.clear("1.2.3.4-bob");

        assert_eq!(
            guard.check("1.2.3.4-bob", t0()),
            LockoutStatus::Allowed { attempts_left: 5 }
        );
    }

    #[test]
    fn identifiers_are_independent() {
        let guard = BruteForceGuard::new();
        for _ in 0..5 {
            guard.record_failure("1.2.3.4-bob", t0());
        }

        assert!(matches!(
            guard.check("1.2.3.4-bob", t0()),
            LockoutStatus::Locked { .. }
        ));
        assert_eq!(
            guard.check("5.6.7.8-alice", t0()),
            LockoutStatus::Allowed { attempts_left: 5 }
        );
    }

    #[test]
    fn sweep_drops_only_stale_identifiers() {
        let guard = BruteForceGuard::new();
        guard.record_failure("stale-a", t0());
        guard.record_failure("stale-b", t0());
        guard.record_failure("fresh", t0() + Duration::seconds(600));

        let swept = guard.sweep(t0() + Duration::seconds(DEFAULT_WINDOW_SECS + 1));
        assert_eq!(swept, 2);
        assert_eq!(guard.tracked(), 1);
    }

    #[test]
    fn custom_policy_applies() {
        let guard = BruteForceGuard::with_policy(Duration::seconds(60), 2);
        guard.record_failure("id", t0());
        guard.record_failure("id", t0());

        assert!(matches!(
            guard.check("id", t0()),
            LockoutStatus::Locked { .. }
        ));
        assert_eq!(
            guard.check("id", t0() + Duration::seconds(60)),
            LockoutStatus::Allowed { attempts_left: 2 }
        );
    }

    #[test]
    fn concurrent_failures_are_all_counted() {
        let guard = Arc::new(BruteForceGuard::new());
        let now = t0();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.record_failure("1.2.3.4-bob", now))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // A lost update would leave more than one attempt of budget.
        assert_eq!(
            guard.check("1.2.3.4-bob", now),
            LockoutStatus::Allowed { attempts_left: 1 }
        );
    }
}
