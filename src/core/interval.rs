//! Value types for the time intervals the engine reasons about.

use std::fmt::{Debug, Formatter};

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta};

use crate::{prelude::*, quantity::energy::KilowattHours};

/// Concrete time interval as returned by the API, with the offset of its origin.
#[derive(Copy, Clone, Eq, PartialEq)]
#[must_use]
pub struct Interval {
    /// Inclusive.
    pub start: DateTime<FixedOffset>,

    /// Exclusive.
    pub end: DateTime<FixedOffset>,
}

impl Debug for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Interval {
    /// Build the interval, returning [`None`] when it is empty or inverted.
    pub fn try_new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        self.end - self.start
    }

    /// Closed containment test, the end instant is considered inside.
    #[must_use]
    pub fn contains_inclusive(self, instant: DateTime<FixedOffset>) -> bool {
        (self.start <= instant) && (instant <= self.end)
    }
}

/// Recurring daily wall-clock window, possibly wrapping past midnight.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct RateWindow {
    /// Inclusive.
    pub start: NaiveTime,

    /// Exclusive.
    pub end: NaiveTime,
}

impl Default for RateWindow {
    /// Intelligent Octopus Go: 23:30–05:30.
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(23, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(5, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl RateWindow {
    pub fn try_new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        ensure!(start != end, "the off-peak window `{start}–{end}` has zero duration");
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn wraps_midnight(self) -> bool {
        self.start > self.end
    }

    #[must_use]
    pub fn contains(self, time: NaiveTime) -> bool {
        if self.wraps_midnight() {
            time >= self.start || time < self.end
        } else {
            self.start <= time && time < self.end
        }
    }
}

/// Smart-charge slot scheduled by the provider for a connected EV or battery.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct DispatchInterval {
    pub interval: Interval,
    pub source: String,

    /// Energy delta of the dispatch, when reported.
    pub delta: Option<KilowattHours>,
}

/// Demand-response event rewarding reduced consumption.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct SavingSessionWindow {
    pub code: String,
    pub interval: Interval,

    /// Reward in OctoPoints per kilowatt-hour saved.
    pub reward_per_kwh: u32,
}

/// Metered consumption over one (nominally half-hour) interval.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct ConsumptionSample {
    pub interval: Interval,
    pub consumption: KilowattHours,
}

impl ConsumptionSample {
    /// Build the sample, returning [`None`] for a negative or non-finite reading.
    pub fn try_new(interval: Interval, consumption: KilowattHours) -> Option<Self> {
        (consumption.0.is_finite() && consumption >= KilowattHours::ZERO)
            .then_some(Self { interval, consumption })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn instant(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn test_try_new_rejects_inverted() {
        let start = instant("2025-01-15T10:00:00Z");
        let end = instant("2025-01-15T11:00:00Z");
        assert!(Interval::try_new(start, end).is_some());
        assert!(Interval::try_new(end, start).is_none());
        assert!(Interval::try_new(start, start).is_none());
    }

    #[test]
    fn test_contains_inclusive() {
        let interval =
            Interval::try_new(instant("2025-01-15T10:00:00Z"), instant("2025-01-15T11:00:00Z"))
                .unwrap();
        assert!(interval.contains_inclusive(interval.start));
        assert!(interval.contains_inclusive(interval.end));
        assert!(!interval.contains_inclusive(instant("2025-01-15T11:00:01Z")));
        assert_eq!(interval.duration(), TimeDelta::hours(1));
    }

    #[test]
    fn test_contains_across_offsets() {
        let interval =
            Interval::try_new(instant("2025-06-15T10:00:00Z"), instant("2025-06-15T11:00:00Z"))
                .unwrap();
        assert!(interval.contains_inclusive(instant("2025-06-15T11:30:00+01:00")));
        assert!(!interval.contains_inclusive(instant("2025-06-15T11:30:00+00:00")));
    }

    #[test]
    fn test_default_window_wraps() {
        let window = RateWindow::default();
        assert!(window.wraps_midnight());
        assert!(window.contains(at(23, 30)));
        assert!(window.contains(at(0, 0)));
        assert!(window.contains(at(5, 29)));
        assert!(!window.contains(at(5, 30)));
        assert!(!window.contains(at(23, 29)));
    }

    #[test]
    fn test_plain_window() -> Result {
        let window = RateWindow::try_new(at(1, 0), at(4, 0))?;
        assert!(!window.wraps_midnight());
        assert!(window.contains(at(1, 0)));
        assert!(!window.contains(at(4, 0)));
        assert!(!window.contains(at(23, 45)));
        Ok(())
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(RateWindow::try_new(at(2, 0), at(2, 0)).is_err());
    }

    #[test]
    fn test_negative_consumption_rejected() {
        let interval =
            Interval::try_new(instant("2025-01-15T10:00:00Z"), instant("2025-01-15T10:30:00Z"))
                .unwrap();
        assert!(ConsumptionSample::try_new(interval, KilowattHours(0.0)).is_some());
        assert!(ConsumptionSample::try_new(interval, KilowattHours(-0.1)).is_none());
        assert!(ConsumptionSample::try_new(interval, KilowattHours(f64::NAN)).is_none());
    }
}
