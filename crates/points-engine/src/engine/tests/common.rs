use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::engine::clock::Clock;
use crate::engine::domain::{ApprovedSubmission, StageId, SubmissionId, YearMonth};
use crate::engine::service::PointsEngine;
use crate::engine::store::MemoryPointsStore;

/// Clock whose readings are set explicitly by the test.
pub(super) struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub(super) fn new(at: NaiveDateTime) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub(super) fn set(&self, at: NaiveDateTime) {
        *self.now.lock().expect("clock mutex poisoned") = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

pub(super) fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).expect("valid year-month")
}

pub(super) fn dec(raw: &str) -> Decimal {
    raw.parse().expect("valid decimal literal")
}

pub(super) type TestEngine = PointsEngine<MemoryPointsStore, ManualClock>;

pub(super) fn engine_at(
    at: NaiveDateTime,
) -> (Arc<MemoryPointsStore>, Arc<ManualClock>, Arc<TestEngine>) {
    let store = Arc::new(MemoryPointsStore::default());
    let clock = Arc::new(ManualClock::new(at));
    let engine = Arc::new(PointsEngine::new(store.clone(), clock.clone()));
    (store, clock, engine)
}

pub(super) fn approved(
    id: &str,
    nickname: &str,
    stage: StageId,
    team_count: u32,
    submitted_at: NaiveDateTime,
) -> ApprovedSubmission {
    ApprovedSubmission {
        submission_id: SubmissionId(id.to_string()),
        nickname: nickname.to_string(),
        stage,
        team_count,
        submitted_at,
    }
}
