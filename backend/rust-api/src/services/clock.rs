use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use crate::utils::time::CalendarZone;

/// Source of "now" for interview timing and calendar bucketing.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn zone(&self) -> CalendarZone;

    /// Calendar day of "now" in the deployment zone.
    fn today(&self) -> NaiveDate {
        self.zone().date_of(self.now())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    zone: CalendarZone,
}

impl SystemClock {
    pub fn new(zone: CalendarZone) -> Self {
        Self { zone }
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn zone(&self) -> CalendarZone {
        self.zone
    }
}

/// Clock pinned to an instant, moved only by `set`/`advance`.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    zone: CalendarZone,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, zone: CalendarZone) -> Self {
        Self {
            now: Mutex::new(now),
            zone,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|guard| *guard).unwrap_or_else(|_| Utc::now())
    }

    fn zone(&self) -> CalendarZone {
        self.zone
    }
}
