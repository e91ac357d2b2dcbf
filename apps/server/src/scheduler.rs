//! Periodic jobs: the alert sweep and the daily digest.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use pricebot_alerts::DigestJob;
use pricebot_engine::AlertEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Run a sweep every `period`, starting immediately.
///
/// Each sweep is awaited before the next tick is taken, and ticks missed
/// while a slow sweep runs are dropped rather than replayed.
pub fn spawn_alert_sweep(engine: Arc<AlertEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "Starting alert sweep");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = engine.sweep().await;
            if report.skipped {
                warn!("Alert sweep still running, tick skipped");
                continue;
            }
            debug!(
                ticked = report.ticked.len(),
                unavailable = report.unavailable.len(),
                fired = report.fired.len(),
                "Alert sweep finished"
            );
        }
    })
}

/// Run the digest every day at `at` local time.
pub fn spawn_daily_digest(job: Arc<DigestJob>, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let next = next_run_after(now.naive_local(), at);
            let wait = delay_until(&now, next);
            info!(next = %next, "Daily report scheduled");

            tokio::time::sleep(wait).await;
            let report = job.run(next.date()).await;
            debug!(
                recipients = report.recipients,
                delivered = report.delivered,
                skipped = report.skipped,
                "Daily report job finished"
            );
        }
    })
}

/// First occurrence of `at` strictly after `now`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Wall-clock delay from `now` until the local time `next`, resolved in
/// `now`'s time zone. A local time skipped by a DST jump runs an hour later;
/// a repeated one runs at its first occurrence.
pub fn delay_until<Tz: TimeZone>(now: &DateTime<Tz>, next: NaiveDateTime) -> Duration {
    let tz = now.timezone();
    let target = tz.from_local_datetime(&next).earliest().or_else(|| {
        tz.from_local_datetime(&(next + chrono::Duration::hours(1)))
            .earliest()
    });
    target
        .and_then(|target| target.signed_duration_since(now.clone()).to_std().ok())
        .unwrap_or_default()
}
