use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Timelike};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::clock::Clock;
use super::domain::{SettlementReport, YearMonth};
use super::service::{EngineError, PointsEngine};
use super::store::PointsStore;

/// The scheduler checks the trigger once per minute; the trigger itself is a
/// (day, hour, minute) match, so a coarser interval could skip the window.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// What a single scheduler check decided.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Automatic settlement is switched off.
    Disabled,
    /// The configured day/hour/minute has not been reached.
    NotDue,
    /// The scheduler already fired during the current calendar month.
    AlreadyTriggered(YearMonth),
    /// The previous month was settled by this check.
    Settled(SettlementReport),
}

/// Periodic process settling the previous month once the configured trigger
/// time is reached. Owns no timer state beyond the spawned task; the clock is
/// injected so trigger timing is testable through [`Self::tick`] alone.
pub struct SettlementScheduler<S, C> {
    engine: Arc<PointsEngine<S, C>>,
}

impl<S, C> SettlementScheduler<S, C>
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    pub fn new(engine: Arc<PointsEngine<S, C>>) -> Self {
        Self { engine }
    }

    /// Runs one check of the trigger condition.
    ///
    /// The last-settled-month marker only advances after a successful
    /// settlement, so a failed attempt is retried on the next tick while the
    /// trigger minute lasts. An `AlreadySettled` failure means another
    /// process won the race; the pool's own settled flag is the guard that
    /// prevents a double payout.
    pub fn tick(&self) -> Result<TickOutcome, EngineError> {
        let config = self.engine.settlement_config()?;
        if !config.enabled {
            return Ok(TickOutcome::Disabled);
        }

        let now = self.engine.clock().now();
        if now.day() != u32::from(config.day_of_month)
            || now.hour() != u32::from(config.hour)
            || now.minute() != u32::from(config.minute)
        {
            return Ok(TickOutcome::NotDue);
        }

        let current_month = YearMonth::from_datetime(now);
        if config.last_settled_month == Some(current_month) {
            return Ok(TickOutcome::AlreadyTriggered(current_month));
        }

        let target_month = current_month.previous();
        let report = self.engine.settle(target_month)?;
        self.engine.mark_auto_settled(current_month)?;
        Ok(TickOutcome::Settled(report))
    }

    /// Spawns the per-minute check loop. Failures are logged and never stop
    /// the loop.
    pub fn start(self) -> SchedulerHandle {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(CHECK_INTERVAL);
            loop {
                interval.tick().await;
                match self.tick() {
                    Ok(TickOutcome::Settled(report)) => info!(
                        month = %report.year_month,
                        distributed = %report.distributed,
                        next_carry_over = %report.next_carry_over,
                        "automatic settlement completed"
                    ),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "automatic settlement check failed"),
                }
            }
        });
        SchedulerHandle { task }
    }
}

/// Handle for the running check loop.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}
