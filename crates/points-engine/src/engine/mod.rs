//! Points accrual and monthly prize-pool settlement.
//!
//! Approved submissions from the external review registry are turned into
//! point awards, accumulated per user per calendar month, and converted into
//! a monetary distribution when the month is settled. Unspent pool money
//! carries over to the following month.

pub mod clock;
pub mod domain;
pub mod router;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod settlement;
pub mod store;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock};
pub use domain::{
    AccrualEntry, ApprovedSubmission, LeaderboardEntry, LifetimeRankEntry, MonthLeaderboard,
    MonthlyAggregate, PoolStatus, PrizePool, SettlementConfig, SettlementConfigError,
    SettlementReport, StageId, SubmissionId, UserReward, YearMonth,
};
pub use router::points_router;
pub use rules::{evaluate, PointsAward, MIN_SCORING_AREA};
pub use scheduler::{SchedulerHandle, SettlementScheduler, TickOutcome, CHECK_INTERVAL};
pub use service::{EngineError, PointsEngine};
pub use settlement::{distribute, Distribution};
pub use store::{
    AccrualOutcome, MemoryPointsStore, PointsStore, ReversalOutcome, StoreError,
    DEFAULT_BASE_POOL,
};
