use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ScheduleConfig;
use crate::notify::ScheduledMatchSweeps;
use crate::store::{ListingStore, RequirementStore};

use super::lifecycle::ValidationLifecycle;

/// Owns the recurring sweep jobs: weekly validation reminders, daily expiry,
/// daily latest-matches notifications, and the daily digest email.
///
/// Constructed once at process start and injected wherever scheduling is
/// composed; `start` is an explicit no-op when already running, and each job
/// carries its own overlap guard so a slow run is skipped, not stacked.
pub struct SweepScheduler<L, R>
where
    L: ListingStore + 'static,
    R: RequirementStore + 'static,
{
    listings: Arc<ValidationLifecycle<L>>,
    requirements: Arc<ValidationLifecycle<R>>,
    matches: Arc<ScheduledMatchSweeps<L, R>>,
    schedule: ScheduleConfig,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<L, R> SweepScheduler<L, R>
where
    L: ListingStore + 'static,
    R: RequirementStore + 'static,
{
    pub fn new(
        listings: Arc<ValidationLifecycle<L>>,
        requirements: Arc<ValidationLifecycle<R>>,
        matches: Arc<ScheduledMatchSweeps<L, R>>,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            listings,
            requirements,
            matches,
            schedule,
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Spawns the recurring jobs. Calling `start` on a running scheduler is
    /// a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::debug!("sweep scheduler already started");
            return;
        }

        let reminder = {
            let listings = self.listings.clone();
            let requirements = self.requirements.clone();
            spawn_job(
                "validation_reminders",
                Duration::ZERO,
                self.schedule.reminder_every,
                move || {
                    let now = Utc::now();
                    match listings.run_reminder_sweep(now) {
                        Ok(report) => tracing::info!(
                            reminded = report.completed,
                            failed = report.failures.len(),
                            "listing reminder sweep finished"
                        ),
                        Err(err) => tracing::error!(error = %err, "listing reminder sweep aborted"),
                    }
                    match requirements.run_reminder_sweep(now) {
                        Ok(report) => tracing::info!(
                            reminded = report.completed,
                            failed = report.failures.len(),
                            "requirement reminder sweep finished"
                        ),
                        Err(err) => {
                            tracing::error!(error = %err, "requirement reminder sweep aborted")
                        }
                    }
                },
            )
        };

        let expiry = {
            let listings = self.listings.clone();
            let requirements = self.requirements.clone();
            spawn_job(
                "validation_expiry",
                self.schedule.expiry_initial_delay,
                self.schedule.expiry_every,
                move || {
                    let now = Utc::now();
                    match listings.run_expiry_sweep(now) {
                        Ok(report) => tracing::info!(
                            deactivated = report.completed,
                            failed = report.failures.len(),
                            "listing expiry sweep finished"
                        ),
                        Err(err) => tracing::error!(error = %err, "listing expiry sweep aborted"),
                    }
                    match requirements.run_expiry_sweep(now) {
                        Ok(report) => tracing::info!(
                            deactivated = report.completed,
                            failed = report.failures.len(),
                            "requirement expiry sweep finished"
                        ),
                        Err(err) => {
                            tracing::error!(error = %err, "requirement expiry sweep aborted")
                        }
                    }
                },
            )
        };

        let latest = {
            let matches = self.matches.clone();
            spawn_job(
                "latest_matches",
                self.schedule.matches_every,
                self.schedule.matches_every,
                move || match matches.run_latest_matches_sweep() {
                    Ok(report) => tracing::info!(
                        notified = report.completed,
                        failed = report.failures.len(),
                        "latest matches sweep finished"
                    ),
                    Err(err) => tracing::error!(error = %err, "latest matches sweep aborted"),
                },
            )
        };

        let digest = {
            let matches = self.matches.clone();
            spawn_job(
                "daily_digest",
                self.schedule.digest_every,
                self.schedule.digest_every,
                move || match matches.run_digest_sweep(Utc::now()) {
                    Ok(report) => tracing::info!(
                        emailed = report.completed,
                        failed = report.failures.len(),
                        "daily digest sweep finished"
                    ),
                    Err(err) => tracing::error!(error = %err, "daily digest sweep aborted"),
                },
            )
        };

        let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
        tasks.extend([reminder, expiry, latest, digest]);
        tracing::info!("sweep scheduler started");
    }

    /// Aborts all running jobs. A stopped scheduler can be started again.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
        self.started.store(false, Ordering::Release);
        tracing::info!("sweep scheduler stopped");
    }
}

impl<L, R> Drop for SweepScheduler<L, R>
where
    L: ListingStore + 'static,
    R: RequirementStore + 'static,
{
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Ticks `body` on the blocking pool every `every`, after an initial delay.
/// A tick arriving while the previous run is still executing is skipped.
fn spawn_job(
    name: &'static str,
    initial_delay: Duration,
    every: Duration,
    body: impl Fn() + Send + Sync + 'static,
) -> JoinHandle<()> {
    let body = Arc::new(body);
    let running = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        if !initial_delay.is_zero() {
            tokio::time::sleep(initial_delay).await;
        }
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if running.swap(true, Ordering::AcqRel) {
                tracing::warn!(job = name, "previous run still in progress, skipping tick");
                continue;
            }
            let body = body.clone();
            let running = running.clone();
            tokio::task::spawn_blocking(move || {
                // Releases the guard even if the body panics.
                struct Reset(Arc<AtomicBool>);
                impl Drop for Reset {
                    fn drop(&mut self) {
                        self.0.store(false, Ordering::Release);
                    }
                }
                let _reset = Reset(running);
                body();
            });
        }
    })
}
