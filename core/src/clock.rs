//! Tick counter and wall-clock sources.
//!
//! The scheduler counts ticks; ledger timestamps, retention and the daily
//! bonus use wall-clock milliseconds. Both are injectable so tests can move
//! time explicitly.

use crate::types::{Millis, RunId, Tick};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickClock {
    pub run_id:       RunId,
    pub current_tick: Tick,
    pub paused:       bool,
}

impl TickClock {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            current_tick: 0,
            paused: true,
        }
    }

    /// Advance one tick. Returns the new tick number.
    /// Panics if called while paused.
    pub fn advance(&mut self) -> Tick {
        assert!(!self.paused, "advance() called on paused clock");
        self.current_tick += 1;
        self.current_tick
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }
}

/// Source of "now" in epoch milliseconds.
pub trait WallClock {
    fn now_millis(&self) -> Millis;

    /// Calendar date (UTC) of `now_millis()`.
    fn today_utc(&self) -> NaiveDate {
        utc_date(self.now_millis())
    }
}

/// Real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_millis(&self) -> Millis {
        Utc::now().timestamp_millis()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, millis: Millis) {
        self.now.set(millis);
    }

    pub fn advance(&self, millis: Millis) {
        self.now.set(self.now.get() + millis);
    }
}

impl WallClock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.now.get()
    }
}

/// UTC calendar date for an epoch-millisecond timestamp.
/// Out-of-range timestamps collapse to the Unix epoch date.
pub fn utc_date(millis: Millis) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_date_uses_calendar_day_boundaries() {
        // 2024-03-01T23:59:59.999Z and 2024-03-02T00:00:00.000Z
        let before_midnight = 1_709_337_599_999;
        let after_midnight = before_midnight + 1;
        assert_eq!(utc_date(before_midnight).to_string(), "2024-03-01");
        assert_eq!(utc_date(after_midnight).to_string(), "2024-03-02");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
    }
}
