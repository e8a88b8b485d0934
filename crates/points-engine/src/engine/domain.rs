use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier wrapper for submissions owned by the external review registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stage identifier in the `area-index` form used across the homework board.
///
/// The area component gates point eligibility: stages below
/// [`crate::engine::rules::MIN_SCORING_AREA`] never accrue points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StageId {
    pub area: u32,
    pub index: u32,
}

impl StageId {
    pub const fn new(area: u32, index: u32) -> Self {
        Self { area, index }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.area, self.index)
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (area, index) = value
            .split_once('-')
            .ok_or_else(|| format!("stage id '{value}' is not in area-index form"))?;
        let area = area
            .parse::<u32>()
            .map_err(|_| format!("stage id '{value}' has a non-numeric area"))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| format!("stage id '{value}' has a non-numeric index"))?;
        Ok(Self { area, index })
    }
}

impl TryFrom<String> for StageId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StageId> for String {
    fn from(value: StageId) -> Self {
        value.to_string()
    }
}

/// Calendar month key (`YYYY-MM`) used for aggregates and prize pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("month must be between 1 and 12, got {month}"));
        }
        Ok(Self { year, month })
    }

    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub const fn year(self) -> i32 {
        self.year
    }

    pub const fn month(self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (year, month) = value
            .split_once('-')
            .ok_or_else(|| format!("year-month '{value}' is not in YYYY-MM form"))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| format!("year-month '{value}' has a non-numeric year"))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("year-month '{value}' has a non-numeric month"))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Approval event consumed from the submission registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedSubmission {
    pub submission_id: SubmissionId,
    pub nickname: String,
    pub stage: StageId,
    pub team_count: u32,
    /// Creation time of the submission itself; its month decides which pool
    /// the points belong to, not the time of approval.
    pub submitted_at: NaiveDateTime,
}

/// Permanent ledger row recording one accrual. Immutable once written; the
/// only legal mutation is deletion when the submission is later reversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualEntry {
    pub nickname: String,
    pub submission_id: SubmissionId,
    pub stage: StageId,
    pub team_count: u32,
    pub points: Decimal,
    pub is_halved: bool,
    pub year_month: YearMonth,
    pub created_at: NaiveDateTime,
}

/// Per-user running total for a month, live only while that month's pool is
/// open. Rows whose points and count both reach zero are deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub nickname: String,
    pub year_month: YearMonth,
    pub points: Decimal,
    pub homework_count: u32,
}

impl MonthlyAggregate {
    pub fn empty(nickname: String, year_month: YearMonth) -> Self {
        Self {
            nickname,
            year_month,
            points: Decimal::ZERO,
            homework_count: 0,
        }
    }
}

/// One prize pool per calendar month, created lazily on first access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizePool {
    pub year_month: YearMonth,
    pub base_pool: Decimal,
    pub carry_over: Decimal,
    pub total_pool: Decimal,
    pub total_points: Decimal,
    pub distributed: Decimal,
    pub next_carry_over: Decimal,
    pub is_settled: bool,
    pub settled_at: Option<NaiveDateTime>,
}

impl PrizePool {
    pub fn open(year_month: YearMonth, base_pool: Decimal, carry_over: Decimal) -> Self {
        Self {
            year_month,
            base_pool,
            carry_over,
            total_pool: base_pool + carry_over,
            total_points: Decimal::ZERO,
            distributed: Decimal::ZERO,
            next_carry_over: Decimal::ZERO,
            is_settled: false,
            settled_at: None,
        }
    }
}

/// Month entry for history browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub year_month: YearMonth,
    pub is_settled: bool,
}

/// Singleton configuration driving the automatic settlement trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub enabled: bool,
    pub day_of_month: u8,
    pub hour: u8,
    pub minute: u8,
    /// Month in which the scheduler last fired, guarding against a second
    /// trigger within the same calendar month.
    pub last_settled_month: Option<YearMonth>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            day_of_month: 1,
            hour: 0,
            minute: 0,
            last_settled_month: None,
        }
    }
}

impl SettlementConfig {
    pub fn validate(&self) -> Result<(), SettlementConfigError> {
        if !(1..=28).contains(&self.day_of_month) {
            return Err(SettlementConfigError::DayOutOfRange(self.day_of_month));
        }
        if self.hour > 23 {
            return Err(SettlementConfigError::HourOutOfRange(self.hour));
        }
        if self.minute > 59 {
            return Err(SettlementConfigError::MinuteOutOfRange(self.minute));
        }
        Ok(())
    }
}

/// Range violations rejected at the configuration boundary, before storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementConfigError {
    #[error("day_of_month must be between 1 and 28, got {0}")]
    DayOutOfRange(u8),
    #[error("hour must be between 0 and 23, got {0}")]
    HourOutOfRange(u8),
    #[error("minute must be between 0 and 59, got {0}")]
    MinuteOutOfRange(u8),
}

/// Per-user line of a settlement report. `reward` is rounded to 2 decimal
/// places for reporting; stored aggregates keep full precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserReward {
    pub nickname: String,
    pub points: Decimal,
    pub reward: Decimal,
}

/// Result of settling one month, returned to the caller and mirrored onto the
/// pool row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReport {
    pub year_month: YearMonth,
    pub total_points: Decimal,
    pub total_pool: Decimal,
    pub distributed: Decimal,
    pub next_carry_over: Decimal,
    pub rewards: Vec<UserReward>,
}

/// Ranked leaderboard row for one month. While the month is open the reward
/// column is a projection under the current pool; after settlement it is the
/// amount actually distributed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub nickname: String,
    pub points: Decimal,
    pub homework_count: u32,
    pub reward: Decimal,
}

/// Leaderboard response for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthLeaderboard {
    pub year_month: YearMonth,
    pub is_settled: bool,
    pub total_pool: Decimal,
    pub total_points: Decimal,
    pub entries: Vec<LeaderboardEntry>,
}

/// Lifetime ranking row computed from the permanent ledger; unaffected by
/// settlement state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifetimeRankEntry {
    pub rank: u32,
    pub nickname: String,
    pub points: Decimal,
    pub homework_count: u32,
}
