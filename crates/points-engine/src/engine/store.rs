use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::domain::{
    AccrualEntry, MonthlyAggregate, PoolStatus, PrizePool, SettlementConfig, SettlementReport,
    SubmissionId, YearMonth,
};
use super::settlement;

/// Base pool amount used until an operator overrides it.
pub const DEFAULT_BASE_POOL: Decimal = Decimal::from_parts(200, 0, 0, false, 0);

/// Result of recording an accrual. `credited` is false when the submission's
/// month was already settled, in which case only the permanent ledger grew.
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualOutcome {
    pub entry: AccrualEntry,
    pub credited: bool,
}

/// Result of removing an accrual. `debited` is false when the month was
/// settled at reversal time and the aggregate/pool were left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversalOutcome {
    pub entry: AccrualEntry,
    pub debited: bool,
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for the four engine tables: accrual ledger, monthly
/// aggregates, prize pools, and the settlement configuration singleton.
///
/// Every method is one transaction: either all of its record mutations are
/// applied or none are, and no other store call interleaves with it. The
/// settlement methods in particular must not allow an accrual between reading
/// the month's points and freezing the pool.
pub trait PointsStore: Send + Sync {
    /// Returns the live ledger entry for a submission, if any.
    fn find_accrual(&self, submission: &SubmissionId) -> Result<Option<AccrualEntry>, StoreError>;

    /// Inserts a ledger entry, crediting the month's aggregate and pool
    /// counter when the pool is still open. Rejects a second live entry for
    /// the same submission with [`StoreError::Conflict`].
    fn insert_accrual(&self, entry: AccrualEntry) -> Result<AccrualOutcome, StoreError>;

    /// Removes the ledger entry for a submission, debiting the aggregate and
    /// pool counter when the pool is still open. Returns `None` when no live
    /// entry exists.
    fn remove_accrual(&self, submission: &SubmissionId)
        -> Result<Option<ReversalOutcome>, StoreError>;

    /// Returns the month's pool, creating it lazily with the configured base
    /// pool plus the previous month's carry-over. While the pool is open, a
    /// changed base pool configuration is folded into `total_pool`; settled
    /// pools are returned as immutable snapshots.
    fn get_or_create_pool(&self, month: YearMonth) -> Result<PrizePool, StoreError>;

    /// Settles the month: reads the accumulated points, computes the
    /// distribution, and freezes the pool, all in one step. Fails with
    /// [`StoreError::Conflict`] when the pool is already settled.
    fn settle_pool(
        &self,
        month: YearMonth,
        settled_at: NaiveDateTime,
    ) -> Result<SettlementReport, StoreError>;

    /// Reopens a settled month, clearing the distribution fields. Fails with
    /// [`StoreError::NotFound`] when no pool exists and
    /// [`StoreError::Conflict`] when the pool was never settled.
    fn cancel_settlement(&self, month: YearMonth) -> Result<PrizePool, StoreError>;

    /// All aggregates for one month, unordered.
    fn month_aggregates(&self, month: YearMonth) -> Result<Vec<MonthlyAggregate>, StoreError>;

    /// All known months with their settlement status, newest first.
    fn list_months(&self) -> Result<Vec<PoolStatus>, StoreError>;

    /// Lifetime (nickname, points, entry count) totals folded from the
    /// permanent ledger.
    fn lifetime_totals(&self) -> Result<Vec<(String, Decimal, u32)>, StoreError>;

    fn base_pool(&self) -> Result<Decimal, StoreError>;

    fn set_base_pool(&self, amount: Decimal) -> Result<(), StoreError>;

    fn settlement_config(&self) -> Result<SettlementConfig, StoreError>;

    /// Replaces the trigger configuration, preserving the last-settled-month
    /// marker.
    fn update_settlement_config(&self, config: SettlementConfig) -> Result<(), StoreError>;

    /// Advances the scheduler's last-settled-month marker.
    fn mark_month_settled(&self, month: YearMonth) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct Tables {
    ledger: HashMap<SubmissionId, AccrualEntry>,
    aggregates: BTreeMap<(YearMonth, String), MonthlyAggregate>,
    pools: BTreeMap<YearMonth, PrizePool>,
    settlement: SettlementConfig,
    base_pool: Decimal,
}

impl Tables {
    fn new(base_pool: Decimal) -> Self {
        Self {
            ledger: HashMap::new(),
            aggregates: BTreeMap::new(),
            pools: BTreeMap::new(),
            settlement: SettlementConfig::default(),
            base_pool,
        }
    }

    fn ensure_pool(&mut self, month: YearMonth) -> &mut PrizePool {
        if !self.pools.contains_key(&month) {
            let carry_over = self
                .pools
                .get(&month.previous())
                .map(|previous| previous.next_carry_over)
                .unwrap_or(Decimal::ZERO);
            self.pools
                .insert(month, PrizePool::open(month, self.base_pool, carry_over));
        }

        let base_pool = self.base_pool;
        let pool = self.pools.get_mut(&month).expect("pool just ensured");
        if !pool.is_settled && pool.base_pool != base_pool {
            pool.base_pool = base_pool;
            pool.total_pool = base_pool + pool.carry_over;
        }
        pool
    }
}

/// In-process store keeping all four tables behind one mutex, which makes
/// each trait method a serialized transaction.
#[derive(Clone)]
pub struct MemoryPointsStore {
    tables: Arc<Mutex<Tables>>,
}

impl Default for MemoryPointsStore {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_POOL)
    }
}

impl MemoryPointsStore {
    pub fn new(base_pool: Decimal) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::new(base_pool))),
        }
    }
}

impl PointsStore for MemoryPointsStore {
    fn find_accrual(&self, submission: &SubmissionId) -> Result<Option<AccrualEntry>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.ledger.get(submission).cloned())
    }

    fn insert_accrual(&self, entry: AccrualEntry) -> Result<AccrualOutcome, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        if tables.ledger.contains_key(&entry.submission_id) {
            return Err(StoreError::Conflict);
        }

        let month = entry.year_month;
        let credited = !tables.ensure_pool(month).is_settled;
        if credited {
            let aggregate = tables
                .aggregates
                .entry((month, entry.nickname.clone()))
                .or_insert_with(|| MonthlyAggregate::empty(entry.nickname.clone(), month));
            aggregate.points += entry.points;
            aggregate.homework_count += 1;

            let pool = tables.pools.get_mut(&month).expect("pool ensured above");
            pool.total_points += entry.points;
        }

        tables.ledger.insert(entry.submission_id.clone(), entry.clone());
        Ok(AccrualOutcome { entry, credited })
    }

    fn remove_accrual(
        &self,
        submission: &SubmissionId,
    ) -> Result<Option<ReversalOutcome>, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let Some(entry) = tables.ledger.remove(submission) else {
            return Ok(None);
        };

        let month = entry.year_month;
        let debited = tables
            .pools
            .get(&month)
            .map(|pool| !pool.is_settled)
            .unwrap_or(false);
        if debited {
            let key = (month, entry.nickname.clone());
            if let Some(aggregate) = tables.aggregates.get_mut(&key) {
                aggregate.points = (aggregate.points - entry.points).max(Decimal::ZERO);
                aggregate.homework_count = aggregate.homework_count.saturating_sub(1);
                if aggregate.points.is_zero() && aggregate.homework_count == 0 {
                    tables.aggregates.remove(&key);
                }
            }
            if let Some(pool) = tables.pools.get_mut(&month) {
                pool.total_points = (pool.total_points - entry.points).max(Decimal::ZERO);
            }
        }

        Ok(Some(ReversalOutcome { entry, debited }))
    }

    fn get_or_create_pool(&self, month: YearMonth) -> Result<PrizePool, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.ensure_pool(month).clone())
    }

    fn settle_pool(
        &self,
        month: YearMonth,
        settled_at: NaiveDateTime,
    ) -> Result<SettlementReport, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        if tables.ensure_pool(month).is_settled {
            return Err(StoreError::Conflict);
        }

        let aggregates: Vec<MonthlyAggregate> = tables
            .aggregates
            .range((month, String::new())..)
            .take_while(|((ym, _), _)| *ym == month)
            .map(|(_, aggregate)| aggregate.clone())
            .collect();

        let total_pool = tables.pools.get(&month).expect("pool ensured above").total_pool;
        let distribution = settlement::distribute(total_pool, &aggregates);

        let pool = tables.pools.get_mut(&month).expect("pool ensured above");
        pool.total_points = distribution.total_points;
        pool.distributed = distribution.distributed;
        pool.next_carry_over = distribution.next_carry_over;
        pool.is_settled = true;
        pool.settled_at = Some(settled_at);

        Ok(SettlementReport {
            year_month: month,
            total_points: distribution.total_points,
            total_pool,
            distributed: distribution.distributed,
            next_carry_over: distribution.next_carry_over,
            rewards: distribution.rewards,
        })
    }

    fn cancel_settlement(&self, month: YearMonth) -> Result<PrizePool, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let pool = tables.pools.get_mut(&month).ok_or(StoreError::NotFound)?;
        if !pool.is_settled {
            return Err(StoreError::Conflict);
        }

        pool.is_settled = false;
        pool.settled_at = None;
        pool.distributed = Decimal::ZERO;
        pool.next_carry_over = Decimal::ZERO;
        Ok(pool.clone())
    }

    fn month_aggregates(&self, month: YearMonth) -> Result<Vec<MonthlyAggregate>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .aggregates
            .range((month, String::new())..)
            .take_while(|((ym, _), _)| *ym == month)
            .map(|(_, aggregate)| aggregate.clone())
            .collect())
    }

    fn list_months(&self) -> Result<Vec<PoolStatus>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .pools
            .values()
            .rev()
            .map(|pool| PoolStatus {
                year_month: pool.year_month,
                is_settled: pool.is_settled,
            })
            .collect())
    }

    fn lifetime_totals(&self) -> Result<Vec<(String, Decimal, u32)>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        let mut totals: BTreeMap<&str, (Decimal, u32)> = BTreeMap::new();
        for entry in tables.ledger.values() {
            let slot = totals
                .entry(entry.nickname.as_str())
                .or_insert((Decimal::ZERO, 0));
            slot.0 += entry.points;
            slot.1 += 1;
        }
        Ok(totals
            .into_iter()
            .map(|(nickname, (points, count))| (nickname.to_string(), points, count))
            .collect())
    }

    fn base_pool(&self) -> Result<Decimal, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.base_pool)
    }

    fn set_base_pool(&self, amount: Decimal) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        tables.base_pool = amount;
        Ok(())
    }

    fn settlement_config(&self) -> Result<SettlementConfig, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.settlement.clone())
    }

    fn update_settlement_config(&self, config: SettlementConfig) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let marker = tables.settlement.last_settled_month;
        tables.settlement = SettlementConfig {
            last_settled_month: marker,
            ..config
        };
        Ok(())
    }

    fn mark_month_settled(&self, month: YearMonth) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        tables.settlement.last_settled_month = Some(month);
        Ok(())
    }
}
