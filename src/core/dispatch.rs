use chrono::{DateTime, FixedOffset, TimeZone};
use serde::Serialize;

use crate::{
    core::interval::DispatchInterval,
    quantity::{currency::Pounds, energy::KilowattHours, rate::KilowattHourRate},
};

/// Smart-charge state derived from the planned dispatches.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct DispatchStatus {
    /// Dispatch containing the queried instant, end included.
    pub current: Option<DispatchInterval>,

    /// First dispatch starting after the queried instant.
    pub next: Option<DispatchInterval>,
}

impl DispatchStatus {
    /// Scan the dispatches, which must be sorted by start time.
    ///
    /// Unlike the rest of the engine, a dispatch is current up to and including its end instant.
    /// The first matching dispatch wins when the intervals overlap.
    pub fn reconcile<Tz: TimeZone>(dispatches: &[DispatchInterval], now: &DateTime<Tz>) -> Self {
        debug_assert!(
            dispatches.is_sorted_by_key(|dispatch| dispatch.interval.start),
            "dispatches must be sorted by start time",
        );

        let mut status = Self::default();
        for dispatch in dispatches {
            let now = now.with_timezone(&dispatch.interval.start.timezone());
            if status.current.is_none() && dispatch.interval.contains_inclusive(now) {
                status.current = Some(dispatch.clone());
            } else if status.next.is_none() && dispatch.interval.start > now {
                status.next = Some(dispatch.clone());
            }
            if status.current.is_some() && status.next.is_some() {
                break;
            }
        }
        status
    }

    #[must_use]
    pub const fn is_dispatching(&self) -> bool {
        self.current.is_some()
    }

    pub const fn phase(&self) -> DispatchPhase {
        if self.is_dispatching() {
            DispatchPhase::Charging
        } else if self.next.is_some() {
            DispatchPhase::Scheduled
        } else {
            DispatchPhase::None
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPhase {
    None,
    Charging,
    Scheduled,
}

/// Completed smart-charge session with its estimated cost.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[must_use]
pub struct ChargeSession {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub kwh: KilowattHours,
    pub duration_mins: i64,
    pub cost: Pounds,
}

impl ChargeSession {
    /// Charging happens off-peak, so the whole session is priced at the off-peak rate.
    pub fn from_completed(dispatch: &DispatchInterval, off_peak_rate: KilowattHourRate) -> Self {
        let kwh = dispatch.delta.unwrap_or(KilowattHours::ZERO).abs().round_to(2);
        Self {
            start: dispatch.interval.start,
            end: dispatch.interval.end,
            kwh,
            duration_mins: dispatch.interval.duration().num_minutes(),
            cost: Pounds::from(kwh * off_peak_rate).round_to(2),
        }
    }
}
