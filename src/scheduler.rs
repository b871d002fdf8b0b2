//! Top-of-the-hour scheduler with a single job slot.
//!
//! A firing that finds the previous job still running is skipped, not queued.
//! A firing that wakes up later than the grace window allows is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Work triggered by the scheduler.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    /// Run the job to completion. Failures are handled and logged inside.
    async fn run(&self);
}

/// Single execution slot shared by all firings.
#[derive(Debug, Clone, Default)]
pub struct JobSlot {
    busy: Arc<AtomicBool>,
}

/// Holds the [`JobSlot`] until dropped.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl JobSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a job is already running.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// How a firing was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    /// The job was started.
    Started,
    /// A previous job still holds the slot.
    SkippedBusy,
    /// The firing woke up later than the grace window allows.
    SkippedMisfire,
}

/// Next top of the hour strictly after `now`, in `now`'s timezone.
///
/// Local hours that do not exist (DST gaps) are skipped; ambiguous ones
/// resolve to the earlier instant.
#[must_use]
pub fn next_top_of_hour(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let local = now.naive_local();
    let mut candidate: NaiveDateTime = local
        .date()
        .and_hms_opt(local.hour(), 0, 0)
        .unwrap_or(local);

    // Bounded: even the widest DST gap is a few hours.
    for _ in 0..48 {
        candidate += ChronoDuration::hours(1);
        if let Some(at) = tz.from_local_datetime(&candidate).earliest() {
            if at > *now {
                return at;
            }
        }
    }

    // Every zone has a valid hour within two days; fall back to UTC arithmetic.
    let utc = now.with_timezone(&Utc);
    let truncated = utc
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(utc);
    (truncated + ChronoDuration::hours(1)).with_timezone(&tz)
}

/// Next firing after `now` that is also strictly after `last_scheduled`.
///
/// The sleep runs on the monotonic clock, so the wall clock may read slightly
/// before the hour that just fired; the schedule must still move forward.
#[must_use]
pub fn next_firing(now: &DateTime<Tz>, last_scheduled: Option<&DateTime<Tz>>) -> DateTime<Tz> {
    match last_scheduled {
        Some(last) if last > now => next_top_of_hour(last),
        _ => next_top_of_hour(now),
    }
}

/// Fires a [`ScheduledJob`] at the top of every hour.
pub struct HourlyScheduler<J: ScheduledJob> {
    timezone: Tz,
    grace: Duration,
    job: Arc<J>,
    slot: JobSlot,
}

impl<J: ScheduledJob> HourlyScheduler<J> {
    #[must_use]
    pub fn new(timezone: Tz, grace: Duration, job: Arc<J>) -> Self {
        Self {
            timezone,
            grace,
            job,
            slot: JobSlot::new(),
        }
    }

    #[must_use]
    pub fn slot(&self) -> &JobSlot {
        &self.slot
    }

    /// Handle one firing that was due at `scheduled` and is processed at `fired_at`.
    ///
    /// When started, the job runs on its own task holding the slot.
    pub fn fire(&self, scheduled: DateTime<Tz>, fired_at: DateTime<Tz>) -> FireDecision {
        let lateness = (fired_at - scheduled).to_std().unwrap_or_default();
        if lateness > self.grace {
            debug!(
                job = self.job.name(),
                scheduled = %scheduled,
                late_secs = lateness.as_secs(),
                "Missed firing beyond grace window, skipping"
            );
            return FireDecision::SkippedMisfire;
        }

        let Some(guard) = self.slot.try_acquire() else {
            warn!(
                job = self.job.name(),
                scheduled = %scheduled,
                "Previous run still in progress, skipping this firing"
            );
            return FireDecision::SkippedBusy;
        };

        let job = Arc::clone(&self.job);
        tokio::spawn(async move {
            let _guard = guard;
            job.run().await;
            info!(job = job.name(), "Job completed");
        });
        FireDecision::Started
    }

    /// Fire once right away, outside the hourly grid.
    pub fn fire_now(&self) -> FireDecision {
        let now = Utc::now().with_timezone(&self.timezone);
        self.fire(now, now)
    }

    /// Run until `shutdown` is cancelled. Does not wait for an in-flight job.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            job = self.job.name(),
            timezone = %self.timezone,
            grace_secs = self.grace.as_secs(),
            "Scheduler started (hourly)"
        );

        let mut last_scheduled: Option<DateTime<Tz>> = None;

        loop {
            let now = Utc::now().with_timezone(&self.timezone);
            let next = next_firing(&now, last_scheduled.as_ref());
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, wait_secs = wait.as_secs(), "Waiting for next firing");

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    let fired_at = Utc::now().with_timezone(&self.timezone);
                    self.fire(next, fired_at);
                    last_scheduled = Some(next);
                }
                () = shutdown.cancelled() => {
                    info!(job = self.job.name(), "Scheduler shutting down");
                    break;
                }
            }
        }
    }
}

impl<J: ScheduledJob> std::fmt::Debug for HourlyScheduler<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HourlyScheduler")
            .field("job", &self.job.name())
            .field("timezone", &self.timezone)
            .field("grace", &self.grace)
            .field("slot", &self.slot)
            .finish()
    }
}
