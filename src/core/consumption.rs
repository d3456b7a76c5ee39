use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, TimeZone, Timelike};

use crate::{
    core::{interval::ConsumptionSample, series::bounded, tariff::Tariff},
    prelude::*,
    quantity::{currency::Pounds, energy::KilowattHours},
};

/// Hours billed at the off-peak rate when splitting a day's cost.
///
/// This approximates the 23:30–05:30 window at hour granularity and intentionally differs from
/// the wall-clock test in [`crate::core::rate::CurrentRate`]. Keep both until the cost split is
/// reconciled with the actual window.
pub const OFF_PEAK_HOURS: [usize; 7] = [0, 1, 2, 3, 4, 5, 23];

/// Pounds per kilowatt-hour, used when no tariff is available.
const FLAT_RATE_ESTIMATE: f64 = 0.245;

/// Consumption of one calendar day.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct DailyBucket {
    pub total: KilowattHours,
    pub hourly: [KilowattHours; 24],

    /// Slot 0 is 00:00, slot 47 is 23:30.
    pub half_hourly: [KilowattHours; 48],
}

impl Default for DailyBucket {
    fn default() -> Self {
        Self {
            total: KilowattHours::ZERO,
            hourly: [KilowattHours::ZERO; 24],
            half_hourly: [KilowattHours::ZERO; 48],
        }
    }
}

impl DailyBucket {
    fn add(&mut self, time: NaiveTime, consumption: KilowattHours) {
        let hour = time.hour() as usize;
        self.total += consumption;
        self.hourly[hour] += consumption;
        self.half_hourly[half_hour_slot(time)] += consumption;
    }

    pub fn off_peak_consumption(&self) -> KilowattHours {
        OFF_PEAK_HOURS.iter().map(|hour| self.hourly[*hour]).sum()
    }

    pub fn peak_consumption(&self) -> KilowattHours {
        self.total - self.off_peak_consumption()
    }

    /// Estimate the day's cost including the standing charge.
    pub fn cost(&self, tariff: Option<&Tariff>) -> Pounds {
        let Some(tariff) = tariff else {
            return Pounds(self.total.0 * FLAT_RATE_ESTIMATE);
        };
        let pence = self.off_peak_consumption() * tariff.off_peak_rate_or_default()
            + self.peak_consumption() * tariff.peak_rate_or_default()
            + tariff.standing_charge;
        Pounds::from(pence)
    }

    /// Off-peak share of the day's consumption in percent, rounded to one decimal.
    #[must_use]
    pub fn off_peak_percentage(&self) -> Option<f64> {
        (self.total > KilowattHours::ZERO).then(|| {
            let percentage = self.off_peak_consumption().0 / self.total.0 * 100.0;
            (percentage * 10.0).round() / 10.0
        })
    }
}

/// Half-hour slot index of the time of day, `0..48`.
#[must_use]
pub fn half_hour_slot(time: NaiveTime) -> usize {
    time.hour() as usize * 2 + usize::from(time.minute() >= 30)
}

/// Pair of days to report: the two most recent dates that have data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct DaySelection {
    pub latest: NaiveDate,
    pub previous: NaiveDate,
}

/// Consumption buckets keyed by calendar date.
#[derive(Clone, Debug, Default, derive_more::Deref)]
#[must_use]
pub struct DailyUsage(BTreeMap<NaiveDate, DailyBucket>);

impl DailyUsage {
    /// Bucket the samples by the calendar day, hour and half-hour of their start in `zone`.
    ///
    /// Samples may come in any order, with gaps, and of any duration.
    #[instrument(skip_all)]
    pub fn aggregate<Tz: TimeZone>(
        samples: impl IntoIterator<Item = ConsumptionSample>,
        zone: &Tz,
    ) -> Self {
        let mut buckets = BTreeMap::<NaiveDate, DailyBucket>::new();
        for sample in samples {
            let start = sample.interval.start.with_timezone(zone);
            buckets.entry(start.date_naive()).or_default().add(start.time(), sample.consumption);
        }
        debug!(n_days = buckets.len(), "aggregated");
        Self(buckets)
    }

    /// Smart-meter data lags behind, so the most recent dates with data are used rather than
    /// the calendar. Calendar today and yesterday only fill in when there is no data for the slot.
    ///
    /// When calendar yesterday is the latest data day itself, the previous day becomes the day
    /// before it instead, so that the two selected days never coincide.
    pub fn select_days(&self, today: NaiveDate) -> DaySelection {
        let mut dates = self.0.keys().rev().copied();
        let latest = dates.next().unwrap_or(today);
        let previous = dates
            .next()
            .or_else(|| today.pred_opt().filter(|yesterday| *yesterday != latest))
            .or_else(|| latest.pred_opt())
            .unwrap_or(latest);
        DaySelection { latest, previous }
    }

    /// Last 24 hourly values up to and including `hour` of the latest day.
    #[must_use]
    pub fn hourly_series(&self, days: DaySelection, hour: u32) -> Vec<KilowattHours> {
        stitch(
            self.0.get(&days.previous).map(|bucket| &bucket.hourly[..]),
            self.0.get(&days.latest).map(|bucket| &bucket.hourly[..]),
            hour as usize,
            24,
        )
    }

    /// Last 48 half-hourly values up to and including `slot` of the latest day.
    #[must_use]
    pub fn half_hourly_series(&self, days: DaySelection, slot: usize) -> Vec<KilowattHours> {
        stitch(
            self.0.get(&days.previous).map(|bucket| &bucket.half_hourly[..]),
            self.0.get(&days.latest).map(|bucket| &bucket.half_hourly[..]),
            slot,
            48,
        )
    }
}

/// Join the previous day's values from `position` onwards with the latest day's values up to
/// `position`, and keep the trailing `length` entries.
fn stitch(
    previous: Option<&[KilowattHours]>,
    latest: Option<&[KilowattHours]>,
    position: usize,
    length: usize,
) -> Vec<KilowattHours> {
    let position = position.min(length - 1);
    let mut series = Vec::with_capacity(2 * length);
    if let Some(previous) = previous {
        series.extend_from_slice(&previous[position..]);
    }
    if let Some(latest) = latest {
        series.extend_from_slice(&latest[..=position]);
    }
    bounded(&series, length)
}
