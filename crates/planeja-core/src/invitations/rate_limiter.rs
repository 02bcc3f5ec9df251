//! Rate Limiter - Controls invitation send rate per user

use chrono::{DateTime, Duration, Utc};
use planeja_common::config::RateLimitConfig;
use planeja_common::{Clock, Error, Result};
use planeja_storage::models::RateLimitState;
use planeja_storage::state::{load_json, save_json, StateStore, RATE_LIMITS_KEY};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Outcome of a send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Send permitted; `remaining` sends are left in the current window
    Allowed { remaining: u32 },
    /// Send rejected until the block elapses
    Blocked { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Remaining quota for a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemainingQuota {
    pub remaining: u32,
    pub limit: u32,
    pub blocked_for_secs: Option<u64>,
}

/// Sliding-window limiter with a cooldown block, keyed by scope (the sending user)
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    lock: Mutex<()>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock,
            config,
            lock: Mutex::new(()),
        }
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.config.window_secs)
    }

    fn block(&self) -> Duration {
        Duration::seconds(self.config.block_secs)
    }

    async fn load(&self) -> Result<HashMap<String, RateLimitState>> {
        Ok(load_json(self.store.as_ref(), RATE_LIMITS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, counters: &HashMap<String, RateLimitState>) -> Result<()> {
        save_json(self.store.as_ref(), RATE_LIMITS_KEY, counters).await
    }

    /// Check the limit for `scope` and record the attempt when allowed
    pub async fn check_and_consume(&self, scope: &str) -> Result<RateLimitDecision> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        let mut counters = self.load().await?;

        let state = counters
            .entry(scope.to_string())
            .or_insert_with(|| RateLimitState::fresh(now));

        if let Some(until) = state.blocked_until {
            if now < until {
                let retry_after_secs = seconds_until(now, until);
                debug!(scope = %scope, retry_after_secs, "Send rejected while blocked");
                return Ok(RateLimitDecision::Blocked { retry_after_secs });
            }
            // Block served, start over
            *state = RateLimitState::fresh(now);
        }

        if now - state.window_start > self.window() {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= self.config.max_attempts {
            state.blocked_until = Some(now + self.block());
            warn!(
                scope = %scope,
                count = state.count,
                block_secs = self.config.block_secs,
                "Invitation rate limit reached"
            );
            self.save(&counters).await?;
            return Ok(RateLimitDecision::Blocked {
                retry_after_secs: self.config.block_secs.max(0) as u64,
            });
        }

        state.count += 1;
        let remaining = self.config.max_attempts - state.count;
        self.save(&counters).await?;

        Ok(RateLimitDecision::Allowed { remaining })
    }

    /// Consume one attempt, failing with `Error::RateLimited` when blocked
    pub async fn consume(&self, scope: &str) -> Result<()> {
        match self.check_and_consume(scope).await? {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Blocked { retry_after_secs } => {
                Err(Error::RateLimited { retry_after_secs })
            }
        }
    }

    /// Report the remaining quota without consuming
    pub async fn remaining(&self, scope: &str) -> Result<RemainingQuota> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        let counters = self.load().await?;
        let limit = self.config.max_attempts;

        let Some(state) = counters.get(scope) else {
            return Ok(RemainingQuota {
                remaining: limit,
                limit,
                blocked_for_secs: None,
            });
        };

        if let Some(until) = state.blocked_until {
            if now < until {
                return Ok(RemainingQuota {
                    remaining: 0,
                    limit,
                    blocked_for_secs: Some(seconds_until(now, until)),
                });
            }
            return Ok(RemainingQuota {
                remaining: limit,
                limit,
                blocked_for_secs: None,
            });
        }

        let used = if now - state.window_start > self.window() {
            0
        } else {
            state.count
        };

        Ok(RemainingQuota {
            remaining: limit.saturating_sub(used),
            limit,
            blocked_for_secs: None,
        })
    }

    /// Forget the counter for `scope`
    pub async fn reset(&self, scope: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut counters = self.load().await?;
        if counters.remove(scope).is_some() {
            self.save(&counters).await?;
        }
        Ok(())
    }

    /// Drop counters whose window and block have both elapsed
    pub async fn cleanup_stale(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        let mut counters = self.load().await?;
        let before = counters.len();

        counters.retain(|_, state| {
            let blocked = state.blocked_until.map(|until| now < until).unwrap_or(false);
            blocked || now - state.window_start <= self.window()
        });

        let removed = before - counters.len();
        if removed > 0 {
            self.save(&counters).await?;
        }
        Ok(removed)
    }
}

/// Whole seconds from `now` until `until`, rounded up
fn seconds_until(now: DateTime<Utc>, until: DateTime<Utc>) -> u64 {
    let millis = (until - now).num_milliseconds().max(0);
    ((millis + 999) / 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use planeja_common::ManualClock;
    use planeja_storage::state::MemoryStateStore;
    use pretty_assertions::assert_eq;

    fn limiter() -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap());
        let limiter = RateLimiter::new(
            Arc::new(MemoryStateStore::new()),
            Arc::new(clock.clone()),
            RateLimitConfig::default(),
        );
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_sixth_send_in_window_is_blocked() {
        let (limiter, clock) = limiter();

        for expected_remaining in (0..5).rev() {
            let decision = limiter.check_and_consume("ana").await.unwrap();
            assert_eq!(
                decision,
                RateLimitDecision::Allowed {
                    remaining: expected_remaining
                }
            );
            clock.advance(Duration::seconds(2));
        }

        let decision = limiter.check_and_consume("ana").await.unwrap();
        assert_eq!(
            decision,
            RateLimitDecision::Blocked {
                retry_after_secs: 30
            }
        );

        clock.advance(Duration::seconds(4));
        let err = limiter.consume("ana").await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { retry_after_secs: 26 }));
        assert!(err.to_string().contains("wait 26 seconds"));
    }

    #[tokio::test]
    async fn test_sends_succeed_after_block_elapses() {
        let (limiter, clock) = limiter();

        for _ in 0..5 {
            assert!(limiter.check_and_consume("ana").await.unwrap().is_allowed());
        }
        assert!(!limiter.check_and_consume("ana").await.unwrap().is_allowed());

        clock.advance(Duration::seconds(29));
        assert!(!limiter.check_and_consume("ana").await.unwrap().is_allowed());

        clock.advance(Duration::seconds(2));
        assert_eq!(
            limiter.check_and_consume("ana").await.unwrap(),
            RateLimitDecision::Allowed { remaining: 4 }
        );
    }

    #[tokio::test]
    async fn test_window_resets_after_sixty_seconds() {
        let (limiter, clock) = limiter();

        for _ in 0..4 {
            limiter.consume("ana").await.unwrap();
        }
        clock.advance(Duration::seconds(61));

        for _ in 0..5 {
            limiter.consume("ana").await.unwrap();
        }
        assert!(limiter.consume("ana").await.is_err());
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let (limiter, _clock) = limiter();

        for _ in 0..5 {
            limiter.consume("ana").await.unwrap();
        }
        assert!(limiter.consume("ana").await.is_err());
        assert!(limiter.consume("bia").await.is_ok());
    }

    #[tokio::test]
    async fn test_remaining_and_reset() {
        let (limiter, clock) = limiter();

        assert_eq!(limiter.remaining("ana").await.unwrap().remaining, 5);
        limiter.consume("ana").await.unwrap();
        limiter.consume("ana").await.unwrap();
        assert_eq!(limiter.remaining("ana").await.unwrap().remaining, 3);

        for _ in 0..4 {
            let _ = limiter.check_and_consume("ana").await.unwrap();
        }
        let quota = limiter.remaining("ana").await.unwrap();
        assert_eq!(quota.remaining, 0);
        assert_eq!(quota.blocked_for_secs, Some(30));

        limiter.reset("ana").await.unwrap();
        assert_eq!(limiter.remaining("ana").await.unwrap().remaining, 5);

        limiter.consume("bia").await.unwrap();
        clock.advance(Duration::seconds(120));
        assert_eq!(limiter.cleanup_stale().await.unwrap(), 1);
    }

    #[test]
    fn test_seconds_until_rounds_up() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(seconds_until(now, now + Duration::milliseconds(1)), 1);
        assert_eq!(seconds_until(now, now + Duration::seconds(30)), 30);
        assert_eq!(seconds_until(now, now - Duration::seconds(3)), 0);
    }
}
