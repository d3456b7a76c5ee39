use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

use crate::{core::tariff::Tariff, quantity::rate::KilowattHourRate};

/// Rate band in effect at a given wall-clock instant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct CurrentRate {
    pub rate: KilowattHourRate,
    pub is_off_peak: bool,

    /// Next wall-clock instant at which the band flips, always after the queried instant.
    pub period_end: NaiveDateTime,

    /// Rate of the band that follows.
    pub next_rate: KilowattHourRate,
}

impl CurrentRate {
    pub fn at(tariff: &Tariff, now: NaiveDateTime) -> Self {
        let window = tariff.off_peak_window;
        let off_peak_rate = tariff.off_peak_rate_or_default();
        let peak_rate = tariff.peak_rate_or_default();

        if window.contains(now.time()) {
            Self {
                rate: off_peak_rate,
                is_off_peak: true,
                period_end: next_occurrence(now, window.end),
                next_rate: peak_rate,
            }
        } else {
            Self {
                rate: peak_rate,
                is_off_peak: false,
                period_end: next_occurrence(now, window.start),
                next_rate: off_peak_rate,
            }
        }
    }

    /// Time left until the band flips, never negative.
    #[must_use]
    pub fn remaining(&self, now: NaiveDateTime) -> TimeDelta {
        (self.period_end - now).max(TimeDelta::zero())
    }
}

/// Earliest instant strictly after `now` whose time of day is `time`.
///
/// For a wrapping window this gives tomorrow's end when queried before midnight
/// and today's end when queried after it.
fn next_occurrence(now: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(time);
    if today > now { today } else { today + TimeDelta::days(1) }
}
