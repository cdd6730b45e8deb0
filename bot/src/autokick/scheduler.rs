use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::sweep::{sweep_all, SweepSummary};
use crate::platform::Platform;
use crate::ratelimit::RateLimiter;
use crate::tenant::TenantRegistry;

/// Time between two sweeps.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(3600);

/// Runs the autokick sweep over every attached guild, one tick at a time.
pub struct AutokickScheduler {
    registry: Arc<TenantRegistry>,
    platform: Platform,
    limiter: Option<Arc<RateLimiter>>,
    running: AtomicBool,
}

/// Clears the running flag when a tick ends, even by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AutokickScheduler {
    pub fn new(registry: Arc<TenantRegistry>, platform: Platform) -> Self {
        Self {
            registry,
            platform,
            limiter: None,
            running: AtomicBool::new(false),
        }
    }

    /// Also prune idle cooldown locks from `limiter` on every tick.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    /// Run one sweep. Returns `None` when the previous sweep is still running.
    pub async fn tick(&self) -> Option<SweepSummary> {
        let Some(_guard) = self.try_begin() else {
            debug!("Autokick sweep still running, skipping tick");
            return None;
        };

        let start = Instant::now();
        let summary = sweep_all(&self.registry, &self.platform, Utc::now()).await;
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            guilds = summary.tenants_swept,
            kicked = summary.kicked,
            dry_run = summary.dry_run,
            failed = summary.failed,
            "Autokick sweep completed"
        );

        if let Some(limiter) = &self.limiter {
            limiter.cleanup();
            debug!(tracked = limiter.tracked_keys(), "Pruned idle cooldown locks");
        }
        Some(summary)
    }

    /// Start the hourly sweep task.
    ///
    /// The first tick is consumed immediately, so the first sweep happens one
    /// period after startup. Ticks missed while a sweep overruns are skipped.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}
