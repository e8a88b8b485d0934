use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use super::clock::Clock;
use super::domain::{
    AccrualEntry, ApprovedSubmission, LeaderboardEntry, LifetimeRankEntry, MonthLeaderboard,
    PoolStatus, PrizePool, SettlementConfig, SettlementConfigError, SettlementReport,
    SubmissionId, YearMonth,
};
use super::rules;
use super::settlement;
use super::store::{AccrualOutcome, PointsStore, ReversalOutcome, StoreError};

/// Facade composing the rule evaluator, the store, and the clock. All
/// accrual, reversal, pool, and settlement operations go through here.
pub struct PointsEngine<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
}

/// Error raised by the engine facade.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("prize pool {0} is already settled")]
    AlreadySettled(YearMonth),
    #[error("prize pool {0} has not been settled")]
    NotSettled(YearMonth),
    #[error("submission {0} already has a live accrual")]
    DuplicateAccrual(SubmissionId),
    #[error("invalid settlement configuration: {0}")]
    ConfigInvalid(#[from] SettlementConfigError),
    #[error("base pool amount must not be negative, got {0}")]
    InvalidBasePool(Decimal),
    #[error(transparent)]
    Store(StoreError),
}

impl<S, C> PointsEngine<S, C>
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    pub(crate) fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Handles an "approved" event from the submission registry: evaluates
    /// the points rule and records the accrual.
    ///
    /// `has_other_approved` must say whether another approved submission for
    /// the same stage exists right now, excluding this one; the caller owns
    /// that lookup because the registry owns review state.
    pub fn record_approval(
        &self,
        event: ApprovedSubmission,
        has_other_approved: bool,
    ) -> Result<AccrualOutcome, EngineError> {
        let award = rules::evaluate(event.stage, event.team_count, has_other_approved);
        let submission_id = event.submission_id.clone();
        let entry = AccrualEntry {
            nickname: event.nickname,
            submission_id: event.submission_id,
            stage: event.stage,
            team_count: event.team_count,
            points: award.points,
            is_halved: award.is_halved,
            year_month: YearMonth::from_datetime(event.submitted_at),
            created_at: self.clock.now(),
        };

        let outcome = self
            .store
            .insert_accrual(entry)
            .map_err(|err| match err {
                StoreError::Conflict => EngineError::DuplicateAccrual(submission_id),
                other => EngineError::Store(other),
            })?;

        if outcome.credited {
            info!(
                nickname = %outcome.entry.nickname,
                month = %outcome.entry.year_month,
                points = %outcome.entry.points,
                halved = outcome.entry.is_halved,
                "points credited to the monthly pool"
            );
        } else {
            info!(
                nickname = %outcome.entry.nickname,
                month = %outcome.entry.year_month,
                points = %outcome.entry.points,
                "month already settled, points recorded on the ledger only"
            );
        }
        Ok(outcome)
    }

    /// Handles an "un-approved" or "deleted" event. Reversing a submission
    /// that never earned points is a benign no-op and returns `None`.
    pub fn record_reversal(
        &self,
        submission: &SubmissionId,
    ) -> Result<Option<ReversalOutcome>, EngineError> {
        let outcome = self
            .store
            .remove_accrual(submission)
            .map_err(EngineError::Store)?;

        match &outcome {
            Some(reversal) if reversal.debited => info!(
                nickname = %reversal.entry.nickname,
                month = %reversal.entry.year_month,
                points = %reversal.entry.points,
                "points removed from the monthly pool"
            ),
            Some(reversal) => info!(
                nickname = %reversal.entry.nickname,
                month = %reversal.entry.year_month,
                "month already settled, ledger entry removed without adjusting the pool"
            ),
            None => info!(submission = %submission, "no live accrual to reverse"),
        }
        Ok(outcome)
    }

    pub fn pool(&self, month: YearMonth) -> Result<PrizePool, EngineError> {
        self.store
            .get_or_create_pool(month)
            .map_err(EngineError::Store)
    }

    /// Settles a month exactly once. A second call fails with
    /// [`EngineError::AlreadySettled`] and leaves the pool untouched.
    pub fn settle(&self, month: YearMonth) -> Result<SettlementReport, EngineError> {
        let report = self
            .store
            .settle_pool(month, self.clock.now())
            .map_err(|err| match err {
                StoreError::Conflict => EngineError::AlreadySettled(month),
                other => EngineError::Store(other),
            })?;

        info!(
            month = %report.year_month,
            total_points = %report.total_points,
            distributed = %report.distributed,
            next_carry_over = %report.next_carry_over,
            "prize pool settled"
        );
        Ok(report)
    }

    /// Administrative escape hatch reopening a settled month for correction.
    pub fn cancel_settlement(&self, month: YearMonth) -> Result<PrizePool, EngineError> {
        let pool = self
            .store
            .cancel_settlement(month)
            .map_err(|err| match err {
                StoreError::Conflict | StoreError::NotFound => EngineError::NotSettled(month),
                other => EngineError::Store(other),
            })?;

        info!(month = %month, "settlement cancelled, month reopened");
        Ok(pool)
    }

    pub fn list_months(&self) -> Result<Vec<PoolStatus>, EngineError> {
        self.store.list_months().map_err(EngineError::Store)
    }

    /// Ranked per-user standings for one month. Rewards are projections
    /// under the current pool while the month is open, and the distributed
    /// amounts once it is settled.
    pub fn leaderboard(&self, month: YearMonth) -> Result<MonthLeaderboard, EngineError> {
        let pool = self
            .store
            .get_or_create_pool(month)
            .map_err(EngineError::Store)?;
        let aggregates = self
            .store
            .month_aggregates(month)
            .map_err(EngineError::Store)?;

        let counts: std::collections::HashMap<&str, u32> = aggregates
            .iter()
            .map(|aggregate| (aggregate.nickname.as_str(), aggregate.homework_count))
            .collect();
        let distribution = settlement::distribute(pool.total_pool, &aggregates);

        let entries = distribution
            .rewards
            .iter()
            .enumerate()
            .map(|(index, reward)| LeaderboardEntry {
                rank: index as u32 + 1,
                nickname: reward.nickname.clone(),
                points: reward.points,
                homework_count: counts.get(reward.nickname.as_str()).copied().unwrap_or(0),
                reward: reward.reward,
            })
            .collect();

        Ok(MonthLeaderboard {
            year_month: month,
            is_settled: pool.is_settled,
            total_pool: pool.total_pool,
            total_points: distribution.total_points,
            entries,
        })
    }

    /// Lifetime ranking over the permanent ledger, independent of settlement
    /// state.
    pub fn lifetime_ranking(&self) -> Result<Vec<LifetimeRankEntry>, EngineError> {
        let mut totals = self.store.lifetime_totals().map_err(EngineError::Store)?;
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(totals
            .into_iter()
            .enumerate()
            .map(|(index, (nickname, points, homework_count))| LifetimeRankEntry {
                rank: index as u32 + 1,
                nickname,
                points,
                homework_count,
            })
            .collect())
    }

    pub fn base_pool(&self) -> Result<Decimal, EngineError> {
        self.store.base_pool().map_err(EngineError::Store)
    }

    /// Updates the base pool used for open and future months. Settled pools
    /// keep the amounts they were settled with.
    pub fn set_base_pool(&self, amount: Decimal) -> Result<(), EngineError> {
        if amount.is_sign_negative() {
            return Err(EngineError::InvalidBasePool(amount));
        }
        self.store
            .set_base_pool(amount)
            .map_err(EngineError::Store)?;
        info!(amount = %amount, "base pool updated");
        Ok(())
    }

    pub fn settlement_config(&self) -> Result<SettlementConfig, EngineError> {
        self.store.settlement_config().map_err(EngineError::Store)
    }

    pub fn update_settlement_config(&self, config: SettlementConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.store
            .update_settlement_config(config)
            .map_err(EngineError::Store)
    }

    /// Records that the scheduler fired during `month`, preventing a second
    /// automatic trigger in the same calendar month.
    pub fn mark_auto_settled(&self, month: YearMonth) -> Result<(), EngineError> {
        self.store
            .mark_month_settled(month)
            .map_err(EngineError::Store)
    }
}
