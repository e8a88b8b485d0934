use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use points_engine::engine::{
    ApprovedSubmission, Clock, EngineError, MemoryPointsStore, PointsEngine, SettlementConfig,
    SettlementScheduler, StageId, SubmissionId, TickOutcome, YearMonth,
};
use rust_decimal::Decimal;

struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    fn new(at: NaiveDateTime) -> Self {
        Self { now: Mutex::new(at) }
    }

    fn set(&self, at: NaiveDateTime) {
        *self.now.lock().expect("clock mutex poisoned") = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).expect("valid year-month")
}

fn dec(raw: &str) -> Decimal {
    raw.parse().expect("valid decimal literal")
}

fn submission(
    id: &str,
    nickname: &str,
    area: u32,
    index: u32,
    team_count: u32,
    submitted_at: NaiveDateTime,
) -> ApprovedSubmission {
    ApprovedSubmission {
        submission_id: SubmissionId(id.to_string()),
        nickname: nickname.to_string(),
        stage: StageId::new(area, index),
        team_count,
        submitted_at,
    }
}

#[test]
fn a_full_month_flows_from_approvals_to_carry_over() {
    let store = Arc::new(MemoryPointsStore::default());
    let clock = Arc::new(FixedClock::new(dt(2026, 7, 5, 10, 0)));
    let engine = Arc::new(PointsEngine::new(store, clock.clone()));

    // July activity: full award, halved duplicate stage, sub-threshold area.
    engine
        .record_approval(
            submission("hw-1", "alice", 19, 1, 3, dt(2026, 7, 2, 9, 0)),
            false,
        )
        .expect("alice full award");
    engine
        .record_approval(
            submission("hw-2", "bob", 19, 1, 3, dt(2026, 7, 3, 9, 0)),
            true,
        )
        .expect("bob halved award");
    engine
        .record_approval(
            submission("hw-3", "carol", 12, 4, 3, dt(2026, 7, 4, 9, 0)),
            false,
        )
        .expect("carol below scoring threshold");

    let july = ym(2026, 7);
    let pool = engine.pool(july).expect("july pool");
    assert_eq!(pool.total_pool, dec("200"));
    assert_eq!(pool.total_points, dec("1.5"));

    // One approval gets retracted before the month closes.
    engine
        .record_approval(
            submission("hw-4", "alice", 20, 2, 2, dt(2026, 7, 10, 9, 0)),
            false,
        )
        .expect("alice second award");
    engine
        .record_reversal(&SubmissionId("hw-4".to_string()))
        .expect("reversal")
        .expect("entry existed");
    assert_eq!(engine.pool(july).expect("pool").total_points, dec("1.5"));

    // Month boundary: the per-minute check settles July on August 1st.
    engine
        .update_settlement_config(SettlementConfig {
            enabled: true,
            day_of_month: 1,
            hour: 0,
            minute: 5,
            last_settled_month: None,
        })
        .expect("trigger configured");

    clock.set(dt(2026, 8, 1, 0, 5));
    let scheduler = SettlementScheduler::new(engine.clone());
    let report = match scheduler.tick().expect("tick") {
        TickOutcome::Settled(report) => report,
        other => panic!("expected a settlement, got {other:?}"),
    };

    assert_eq!(report.year_month, july);
    assert_eq!(report.total_points, dec("1.5"));
    assert_eq!(report.distributed, dec("1.5"));
    assert_eq!(report.next_carry_over, dec("198.5"));
    assert_eq!(report.rewards.len(), 3);
    assert_eq!(report.rewards[0].nickname, "alice");
    assert_eq!(report.rewards[0].reward, dec("1.0"));
    assert_eq!(report.rewards[1].nickname, "bob");
    assert_eq!(report.rewards[1].reward, dec("0.5"));
    assert_eq!(report.rewards[2].nickname, "carol");
    assert_eq!(report.rewards[2].reward, Decimal::ZERO);

    // August opens with the carry-over folded in.
    let august = engine.pool(ym(2026, 8)).expect("august pool");
    assert_eq!(august.carry_over, dec("198.5"));
    assert_eq!(august.total_pool, dec("398.5"));

    // July is frozen: a straggling approval only reaches the ledger.
    let outcome = engine
        .record_approval(
            submission("hw-5", "dave", 19, 2, 3, dt(2026, 7, 30, 9, 0)),
            false,
        )
        .expect("late approval");
    assert!(!outcome.credited);
    assert_eq!(engine.pool(july).expect("pool").total_points, dec("1.5"));

    match engine.settle(july) {
        Err(EngineError::AlreadySettled(month)) => assert_eq!(month, july),
        other => panic!("expected already settled error, got {other:?}"),
    }

    // The lifetime ranking still counts every ledger entry.
    let ranking = engine.lifetime_ranking().expect("ranking");
    assert_eq!(ranking[0].nickname, "alice");
    assert_eq!(ranking[0].points, dec("1.0"));
    assert!(ranking.iter().any(|entry| entry.nickname == "dave"));
}

#[test]
fn cancelling_a_settlement_allows_a_corrected_rerun() {
    let store = Arc::new(MemoryPointsStore::default());
    let clock = Arc::new(FixedClock::new(dt(2026, 8, 1, 9, 0)));
    let engine = PointsEngine::new(store, clock);
    let july = ym(2026, 7);

    engine
        .record_approval(
            submission("hw-1", "alice", 19, 1, 3, dt(2026, 7, 2, 9, 0)),
            false,
        )
        .expect("accrual");
    let first = engine.settle(july).expect("first settlement");
    assert_eq!(first.distributed, dec("1.0"));

    engine.cancel_settlement(july).expect("cancellation");
    engine
        .record_approval(
            submission("hw-2", "bob", 19, 2, 2, dt(2026, 7, 8, 9, 0)),
            false,
        )
        .expect("missed approval backfilled");

    let second = engine.settle(july).expect("second settlement");
    assert_eq!(second.total_points, dec("1.5"));
    assert_eq!(second.distributed, dec("1.5"));
    assert_eq!(second.next_carry_over, dec("198.5"));
}
