//! Expiry Sweeper - Periodically expires overdue invitations

use super::manager::InvitationManager;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Background worker marking overdue invitations as expired
pub struct ExpirySweeper {
    manager: Arc<InvitationManager>,
    /// Interval between sweeps (seconds)
    interval_secs: u64,
}

impl ExpirySweeper {
    /// Create a new sweeper
    pub fn new(manager: Arc<InvitationManager>) -> Self {
        Self {
            manager,
            interval_secs: 60,
        }
    }

    /// Set sweep interval
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = secs.max(1);
        self
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first tick fires immediately, so pending expiries are applied on
    /// startup before the regular cadence begins.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(TokioDuration::from_secs(self.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Expiry sweeper started (interval: {}s)", self.interval_secs);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// One sweep cycle; returns the number of invitations expired
    pub async fn sweep_once(&self) -> usize {
        let expired = match self.manager.sweep_expired().await {
            Ok(count) => {
                debug!(expired = count, "Expiry sweep finished");
                count
            }
            Err(e) => {
                error!("Error sweeping expired invitations: {}", e);
                0
            }
        };

        // Periodic cleanup
        if let Err(e) = self.manager.rate_limiter().cleanup_stale().await {
            warn!("Error cleaning up rate limit counters: {}", e);
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invitations::RateLimiter;
    use chrono::{Duration, TimeZone, Utc};
    use planeja_common::config::{InvitationConfig, RateLimitConfig};
    use planeja_common::types::Actor;
    use planeja_common::ManualClock;
    use planeja_storage::models::{
        CreateInvitation, Invitation, InvitationRole, InvitationStatus, InvitationTarget,
        TargetKind,
    };
    use planeja_storage::state::{load_json, MemoryStateStore, StateStore, INVITATIONS_KEY};
    use uuid::Uuid;

    async fn manager_with_overdue(
        clock: &ManualClock,
    ) -> (Arc<InvitationManager>, Arc<dyn StateStore>, Actor) {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let limiter = Arc::new(RateLimiter::new(
            store.clone(),
            Arc::new(clock.clone()),
            RateLimitConfig::default(),
        ));
        let manager = Arc::new(InvitationManager::new(
            store.clone(),
            Arc::new(clock.clone()),
            limiter,
            InvitationConfig::default(),
        ));

        let ana = Actor::new(Uuid::new_v4(), "Ana", "ana@x.com");
        let target = InvitationTarget {
            kind: TargetKind::Team,
            id: Uuid::new_v4(),
            name: "Design".to_string(),
        };
        manager
            .send_invitation(
                CreateInvitation {
                    recipient_email: "bia@x.com".to_string(),
                    role: InvitationRole::Observer,
                    team_names: vec!["Design".to_string()],
                    message: None,
                    expiration_days: Some(1),
                    generate_link: false,
                },
                target,
                &ana,
            )
            .await
            .unwrap();

        clock.advance(Duration::days(2));
        (manager, store, ana)
    }

    #[tokio::test]
    async fn test_sweep_once_expires_overdue() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
        let (manager, _store, ana) = manager_with_overdue(&clock).await;

        let sweeper = ExpirySweeper::new(manager.clone());
        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(sweeper.sweep_once().await, 0);

        let sent = manager.list_sent(ana.id, None).await.unwrap();
        assert_eq!(sent[0].status, InvitationStatus::Expired);
    }

    #[tokio::test]
    async fn test_run_sweeps_on_start_and_stops_on_shutdown() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
        let (manager, store, _ana) = manager_with_overdue(&clock).await;

        let (tx, rx) = watch::channel(false);
        let sweeper = ExpirySweeper::new(manager.clone()).with_interval(3600);
        let handle = tokio::spawn(async move { sweeper.run(rx).await });

        // Wait for the immediate first sweep to persist
        let mut expired = false;
        for _ in 0..100 {
            let stored: Vec<Invitation> = load_json(store.as_ref(), INVITATIONS_KEY)
                .await
                .unwrap()
                .unwrap_or_default();
            if stored.iter().all(|i| i.status == InvitationStatus::Expired) {
                expired = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(expired);

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
