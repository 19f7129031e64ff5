//! crates/crm_dashboard_core/src/rate_limit.rs
//!
//! Login attempt rate limiting. [`evaluate`] is the pure decision over one
//! entry; [`RateLimiter`] persists entries through a [`KeyValueStore`].

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{RateDecision, RateLimitEntry};
use crate::ports::{KeyValueStore, PortError, PortResult};

const KEY_PREFIX: &str = "rate_limit:";

/// Tunable limits for login attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window: Duration,
    pub block_duration: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::minutes(5),
            block_duration: Duration::minutes(15),
        }
    }
}

/// What to do with the stored entry after an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryChange {
    Keep,
    Store(RateLimitEntry),
}

/// Decides whether an attempt at `now` is allowed and how the entry changes.
pub fn evaluate(
    entry: Option<&RateLimitEntry>,
    now: DateTime<Utc>,
    policy: &RateLimitPolicy,
) -> (RateDecision, EntryChange) {
    let fresh = || {
        (
            RateDecision::Allowed {
                remaining_attempts: policy.max_attempts.saturating_sub(1),
            },
            EntryChange::Store(RateLimitEntry {
                attempts: 1,
                last_attempt_at: now,
                blocked_until: None,
            }),
        )
    };

    let Some(entry) = entry else {
        return fresh();
    };

    if let Some(blocked_until) = entry.blocked_until.filter(|until| *until > now) {
        return (RateDecision::Blocked { blocked_until }, EntryChange::Keep);
    }

    if now - entry.last_attempt_at > policy.window {
        return fresh();
    }

    let attempts = entry.attempts.saturating_add(1);
    if attempts >= policy.max_attempts {
        let blocked_until = now
            .checked_add_signed(policy.block_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (
            RateDecision::Blocked { blocked_until },
            EntryChange::Store(RateLimitEntry {
                attempts,
                last_attempt_at: now,
                blocked_until: Some(blocked_until),
            }),
        )
    } else {
        (
            RateDecision::Allowed {
                remaining_attempts: policy.max_attempts - attempts,
            },
            EntryChange::Store(RateLimitEntry {
                attempts,
                last_attempt_at: now,
                blocked_until: None,
            }),
        )
    }
}

//=========================================================================================
// RateLimiter
//=========================================================================================

/// Records attempts per identifier in a key-value store.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    policy: RateLimitPolicy,
    // Serializes the read-modify-write cycle against the store.
    guard: Mutex<()>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            policy,
            guard: Mutex::new(()),
        }
    }

    /// Checks whether `identifier` may attempt a login at `now` and records the attempt.
    pub async fn check_and_record(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> PortResult<RateDecision> {
        let key = storage_key(identifier);
        let _guard = self.guard.lock().await;

        let entry = match self.store.get(&key).await? {
            Some(raw) => match serde_json::from_str::<RateLimitEntry>(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(%identifier, "Discarding unreadable rate-limit entry: {}", e);
                    None
                }
            },
            None => None,
        };

        let (decision, change) = evaluate(entry.as_ref(), now, &self.policy);
        if let EntryChange::Store(updated) = change {
            let ttl = self.entry_ttl(&updated, now);
            let raw = serde_json::to_string(&updated)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            self.store.set(&key, raw, ttl).await?;
        }

        debug!(%identifier, ?decision, "Recorded login attempt");
        Ok(decision)
    }

    /// Forgets every recorded attempt for `identifier`.
    pub async fn clear_limit(&self, identifier: &str) -> PortResult<()> {
        let _guard = self.guard.lock().await;
        self.store.delete(&storage_key(identifier)).await
    }

    // Long enough that the entry outlives both its window and any active block.
    fn entry_ttl(&self, entry: &RateLimitEntry, now: DateTime<Utc>) -> Duration {
        let window_ttl = self
            .policy
            .window
            .checked_add(&self.policy.window)
            .unwrap_or(Duration::MAX);
        match entry.blocked_until {
            Some(until) if until > now => (until - now)
                .checked_add(&window_ttl)
                .unwrap_or(Duration::MAX),
            _ => window_ttl,
        }
    }
}

fn storage_key(identifier: &str) -> String {
    format!("{KEY_PREFIX}{identifier}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryKeyValueStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
    }

    fn limiter() -> (RateLimiter, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::default());
        (
            RateLimiter::new(store.clone(), RateLimitPolicy::default()),
            store,
        )
    }

    #[test]
    fn first_attempt_creates_entry() {
        let policy = RateLimitPolicy::default();
        let (decision, change) = evaluate(None, t0(), &policy);
        assert_eq!(
            decision,
            RateDecision::Allowed {
                remaining_attempts: 4
            }
        );
        assert_eq!(
            change,
            EntryChange::Store(RateLimitEntry {
                attempts: 1,
                last_attempt_at: t0(),
                blocked_until: None,
            })
        );
    }

    #[test]
    fn active_block_is_not_mutated() {
        let policy = RateLimitPolicy::default();
        let entry = RateLimitEntry {
            attempts: 5,
            last_attempt_at: t0(),
            blocked_until: Some(t0() + Duration::minutes(15)),
        };
        let (decision, change) = evaluate(Some(&entry), t0() + Duration::minutes(3), &policy);
        assert_eq!(
            decision,
            RateDecision::Blocked {
                blocked_until: t0() + Duration::minutes(15)
            }
        );
        assert_eq!(change, EntryChange::Keep);
    }

    #[test]
    fn attempts_reset_once_window_elapses() {
        let policy = RateLimitPolicy::default();
        let entry = RateLimitEntry {
            attempts: 3,
            last_attempt_at: t0(),
            blocked_until: None,
        };
        let later = t0() + Duration::minutes(5) + Duration::seconds(1);
        let (decision, change) = evaluate(Some(&entry), later, &policy);
        assert_eq!(
            decision,
            RateDecision::Allowed {
                remaining_attempts: 4
            }
        );
        assert!(matches!(change, EntryChange::Store(e) if e.attempts == 1));
    }

    #[test]
    fn attempt_exactly_at_window_edge_still_counts() {
        let policy = RateLimitPolicy::default();
        let entry = RateLimitEntry {
            attempts: 2,
            last_attempt_at: t0(),
            blocked_until: None,
        };
        let (decision, _) = evaluate(Some(&entry), t0() + Duration::minutes(5), &policy);
        assert_eq!(
            decision,
            RateDecision::Allowed {
                remaining_attempts: 2
            }
        );
    }

    #[test]
    fn block_past_the_calendar_end_saturates() {
        let policy = RateLimitPolicy {
            block_duration: Duration::seconds(10_000_000_000_000),
            ..RateLimitPolicy::default()
        };
        let entry = RateLimitEntry {
            attempts: 4,
            last_attempt_at: t0(),
            blocked_until: None,
        };
        let (decision, _) = evaluate(Some(&entry), t0() + Duration::seconds(10), &policy);
        assert_eq!(
            decision,
            RateDecision::Blocked {
                blocked_until: DateTime::<Utc>::MAX_UTC
            }
        );
    }

    #[tokio::test]
    async fn fifth_attempt_within_window_is_blocked() {
        let (limiter, _) = limiter();
        let mut decisions = Vec::new();
        for i in 0..5 {
            let now = t0() + Duration::seconds(30 * i);
            decisions.push(limiter.check_and_record("ana@example.com", now).await.unwrap());
        }

        let remaining: Vec<u32> = decisions[..4]
            .iter()
            .map(|d| match d {
                RateDecision::Allowed { remaining_attempts } => *remaining_attempts,
                RateDecision::Blocked { .. } => panic!("blocked too early"),
            })
            .collect();
        assert_eq!(remaining, vec![4, 3, 2, 1]);

        let fifth_at = t0() + Duration::seconds(120);
        assert_eq!(
            decisions[4],
            RateDecision::Blocked {
                blocked_until: fifth_at + Duration::minutes(15)
            }
        );
    }

    #[tokio::test]
    async fn block_holds_until_it_expires_then_resets() {
        let (limiter, _) = limiter();
        for i in 0..5 {
            limiter
                .check_and_record("ana@example.com", t0() + Duration::seconds(i))
                .await
                .unwrap();
        }
        let blocked_until = t0() + Duration::seconds(4) + Duration::minutes(15);

        let during = limiter
            .check_and_record("ana@example.com", t0() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(during, RateDecision::Blocked { blocked_until });

        let after = limiter
            .check_and_record("ana@example.com", blocked_until + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(
            after,
            RateDecision::Allowed {
                remaining_attempts: 4
            }
        );
    }

    #[tokio::test]
    async fn identifiers_are_tracked_independently() {
        let (limiter, _) = limiter();
        for i in 0..5 {
            limiter
                .check_and_record("ana@example.com", t0() + Duration::seconds(i))
                .await
                .unwrap();
        }
        let other = limiter
            .check_and_record("bo@example.com", t0() + Duration::seconds(6))
            .await
            .unwrap();
        assert!(other.is_allowed());
    }

    #[tokio::test]
    async fn clear_limit_removes_entry() {
        let (limiter, store) = limiter();
        limiter.check_and_record("ana@example.com", t0()).await.unwrap();
        assert!(store.contains("rate_limit:ana@example.com"));

        limiter.clear_limit("ana@example.com").await.unwrap();
        assert!(!store.contains("rate_limit:ana@example.com"));

        let next = limiter
            .check_and_record("ana@example.com", t0() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(
            next,
            RateDecision::Allowed {
                remaining_attempts: 4
            }
        );
    }

    #[tokio::test]
    async fn unreadable_entry_is_treated_as_absent() {
        let (limiter, store) = limiter();
        store
            .set("rate_limit:ana@example.com", "not json".to_string(), Duration::minutes(5))
            .await
            .unwrap();
        let decision = limiter.check_and_record("ana@example.com", t0()).await.unwrap();
        assert!(decision.is_allowed());
    }
}
