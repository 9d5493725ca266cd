//! Periodic follow-up jobs.
//!
//! Two independent interval timers, both driving the engine:
//! - a fine-grained dispatch job that sends follow-ups whose scheduled
//!   time has passed (hourly by default);
//! - a coarse-grained scheduling job that creates follow-ups for newly
//!   connected profiles (every six hours by default).
//!
//! Uses tokio::interval for zero-overhead ticking; each tick runs to
//! completion before the next is considered, so the jobs never overlap
//! themselves.

use std::time::Duration;

use prospector_engine::Engine;

/// Interval configuration for the two jobs.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerIntervals {
    pub dispatch: Duration,
    pub schedule: Duration,
}

impl Default for SchedulerIntervals {
    fn default() -> Self {
        Self {
            dispatch: Duration::from_secs(3600),
            schedule: Duration::from_secs(21600),
        }
    }
}

/// Long-lived scheduler. `run` never returns; spawn it.
pub struct Scheduler {
    engine: Engine,
    intervals: SchedulerIntervals,
}

impl Scheduler {
    pub fn new(engine: Engine, intervals: SchedulerIntervals) -> Self {
        Self { engine, intervals }
    }

    /// Spawn both interval loops and run until the process exits.
    pub async fn run(self) {
        tracing::info!(
            "⏰ Scheduler started (dispatch every {:?}, schedule every {:?})",
            self.intervals.dispatch,
            self.intervals.schedule
        );

        let dispatch_engine = self.engine.clone();
        let dispatch_every = self.intervals.dispatch;
        let dispatch = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(dispatch_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately; skip it so startup is quiet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_dispatch_once(&dispatch_engine).await;
            }
        });

        let schedule_engine = self.engine.clone();
        let schedule_every = self.intervals.schedule;
        let schedule = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(schedule_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_schedule_once(&schedule_engine).await;
            }
        });

        // both loops run forever; if one panics, bring the process down
        let _ = tokio::try_join!(dispatch, schedule);
    }
}

/// One pass of the due-follow-up dispatch job. Errors are logged, never
/// propagated: the next tick gets another chance.
pub async fn run_dispatch_once(engine: &Engine) {
    match engine.dispatch_due_followups().await {
        Ok(report) if report.due > 0 => {
            tracing::info!(
                "📬 Follow-up pass: {} due, {} sent, {} cancelled, {} failed",
                report.due,
                report.sent,
                report.cancelled,
                report.failed
            );
        }
        Ok(_) => {}
        Err(e) => tracing::error!("Follow-up dispatch pass failed: {e}"),
    }
}

/// One pass of the follow-up scheduling job.
pub async fn run_schedule_once(engine: &Engine) {
    match engine.schedule_followups() {
        Ok(0) => {}
        Ok(created) => tracing::info!("📅 Scheduled {created} new follow-up(s)"),
        Err(e) => tracing::error!("Follow-up scheduling pass failed: {e}"),
    }
}
