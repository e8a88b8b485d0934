use chrono::{Local, NaiveDateTime};

/// Time source abstraction so settlement timing can be tested without
/// sleeping. The engine and scheduler compare wall-clock components, so the
/// system implementation uses local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
