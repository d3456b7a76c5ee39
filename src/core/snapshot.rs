use bon::Builder;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Timelike};
use serde::Serialize;

use crate::{
    core::{
        account::{Account, LivePower, SmartDevice},
        consumption::{DailyUsage, half_hour_slot},
        dispatch::{ChargeSession, DispatchPhase, DispatchStatus},
        interval::{ConsumptionSample, DispatchInterval, RateWindow, SavingSessionWindow},
        rate::CurrentRate,
        saving_session::upcoming_sessions,
        tariff::Tariff,
    },
    prelude::*,
    quantity::{
        currency::{Pence, Pounds},
        energy::KilowattHours,
        power::Watts,
        rate::KilowattHourRate,
    },
};

/// Optional integrations, resolved once at startup.
#[derive(Copy, Clone, Debug, Default)]
pub struct Capabilities {
    pub assistant: bool,
}

/// Raw data gathered by one full refresh.
#[derive(Clone, Debug, Default, Builder)]
pub struct Refresh {
    pub account: Option<Account>,
    pub tariff: Option<Tariff>,

    /// Planned dispatches, sorted by start time.
    #[builder(default)]
    pub dispatches: Vec<DispatchInterval>,

    #[builder(default)]
    pub completed_dispatches: Vec<DispatchInterval>,

    #[builder(default)]
    pub saving_sessions: Vec<SavingSessionWindow>,

    pub live_power: Option<LivePower>,

    #[builder(default)]
    pub consumption: Vec<ConsumptionSample>,

    #[builder(default)]
    pub devices: Vec<SmartDevice>,
}

/// Everything the presentation layer needs to know about "now".
#[derive(Clone, Debug, Serialize)]
#[must_use]
pub struct Snapshot {
    pub timestamp: DateTime<FixedOffset>,

    pub live_power_watts: Option<Watts>,

    /// Running cost of the live demand at the current rate, pence per hour.
    pub live_cost_per_hour: Option<Pence>,

    pub live_history: Vec<Watts>,

    pub rate: Option<KilowattHourRate>,
    pub is_off_peak: bool,
    pub rate_ends_in_seconds: i64,

    pub balance: Pounds,
    pub balance_is_credit: bool,

    pub dispatch_status: DispatchPhase,
    pub dispatch_end: Option<DateTime<FixedOffset>>,
    pub next_dispatch_start: Option<DateTime<FixedOffset>>,
    pub next_dispatch_end: Option<DateTime<FixedOffset>>,
    pub charger_provider: Option<String>,
    pub charge_history: Vec<ChargeSession>,

    pub has_saving_session: bool,
    pub saving_session_start: Option<DateTime<FixedOffset>>,
    pub saving_session_end: Option<DateTime<FixedOffset>>,
    pub saving_session_active: bool,
    pub saving_session_upcoming: bool,

    pub data_date_latest: Option<NaiveDate>,
    pub data_date_previous: Option<NaiveDate>,
    pub latest_kwh: KilowattHours,
    pub latest_cost: Pounds,
    pub previous_kwh: KilowattHours,
    pub previous_cost: Pounds,
    pub hourly_usage: Vec<KilowattHours>,
    pub half_hourly_usage: Vec<KilowattHours>,
    pub off_peak_percentage: f64,
    pub monthly_projection: Pounds,

    pub tariff_name: Option<String>,
    pub standing_charge: Pence,
    pub peak_rate: Option<KilowattHourRate>,
    pub off_peak_rate: Option<KilowattHourRate>,
    pub off_peak_start: String,
    pub off_peak_end: String,

    pub assistant_available: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Snapshot {
    /// Snapshot with every fact in its neutral state.
    pub fn neutral(timestamp: DateTime<FixedOffset>, capabilities: Capabilities) -> Self {
        let window = RateWindow::default();
        Self {
            timestamp,
            live_power_watts: None,
            live_cost_per_hour: None,
            live_history: Vec::new(),
            rate: None,
            is_off_peak: false,
            rate_ends_in_seconds: 0,
            balance: Pounds::ZERO,
            balance_is_credit: false,
            dispatch_status: DispatchPhase::None,
            dispatch_end: None,
            next_dispatch_start: None,
            next_dispatch_end: None,
            charger_provider: None,
            charge_history: Vec::new(),
            has_saving_session: false,
            saving_session_start: None,
            saving_session_end: None,
            saving_session_active: false,
            saving_session_upcoming: false,
            data_date_latest: None,
            data_date_previous: None,
            latest_kwh: KilowattHours::ZERO,
            latest_cost: Pounds::ZERO,
            previous_kwh: KilowattHours::ZERO,
            previous_cost: Pounds::ZERO,
            hourly_usage: Vec::new(),
            half_hourly_usage: Vec::new(),
            off_peak_percentage: 0.0,
            monthly_projection: Pounds::ZERO,
            tariff_name: None,
            standing_charge: Pence::ZERO,
            peak_rate: None,
            off_peak_rate: None,
            off_peak_start: format_time_of_day(window.start),
            off_peak_end: format_time_of_day(window.end),
            assistant_available: capabilities.assistant,
            error: None,
        }
    }

    /// Neutral snapshot carrying the refresh failure.
    pub fn failed(
        timestamp: DateTime<FixedOffset>,
        capabilities: Capabilities,
        error: &Error,
    ) -> Self {
        Self { error: Some(format!("{error:#}")), ..Self::neutral(timestamp, capabilities) }
    }

    /// Reduce the refreshed data against `now`.
    ///
    /// Calendar days and wall-clock times are taken in the time zone of `now`.
    #[instrument(skip_all)]
    pub fn assemble<Tz: TimeZone>(
        refresh: &Refresh,
        now: &DateTime<Tz>,
        capabilities: Capabilities,
        live_history: &[Watts],
    ) -> Self {
        let mut snapshot = Self::neutral(now.fixed_offset(), capabilities);
        let wall_now = now.naive_local();
        let tariff = refresh.tariff.as_ref();

        if let Some(account) = &refresh.account {
            snapshot.balance = account.balance.abs();
            snapshot.balance_is_credit = account.is_credit();
        }

        let current_rate = tariff.map(|tariff| CurrentRate::at(tariff, wall_now));
        if let Some(tariff) = tariff {
            snapshot.tariff_name = Some(tariff.product_code.clone());
            snapshot.standing_charge = tariff.standing_charge;
            snapshot.peak_rate = tariff.peak_rate;
            snapshot.off_peak_rate = tariff.off_peak_rate;
            snapshot.off_peak_start = format_time_of_day(tariff.off_peak_window.start);
            snapshot.off_peak_end = format_time_of_day(tariff.off_peak_window.end);
        }
        if let Some(current_rate) = current_rate {
            snapshot.rate = Some(current_rate.rate);
            snapshot.is_off_peak = current_rate.is_off_peak;
            snapshot.rate_ends_in_seconds = current_rate.remaining(wall_now).num_seconds();
        }

        if let Some(live_power) = refresh.live_power {
            snapshot.live_power_watts = Some(live_power.demand);
            snapshot.live_cost_per_hour =
                current_rate.map(|current_rate| live_power.demand * current_rate.rate);
        }
        snapshot.live_history = live_history.to_vec();

        let dispatch_status = DispatchStatus::reconcile(&refresh.dispatches, now);
        snapshot.dispatch_status = dispatch_status.phase();
        if let Some(current) = &dispatch_status.current {
            snapshot.dispatch_end = Some(current.interval.end);
        } else if let Some(next) = &dispatch_status.next {
            snapshot.next_dispatch_start = Some(next.interval.start);
            snapshot.next_dispatch_end = Some(next.interval.end);
        }
        snapshot.charger_provider = refresh.devices.first().map(|device| device.provider.clone());
        let off_peak_rate =
            tariff.map_or(KilowattHourRate::DEFAULT_OFF_PEAK, Tariff::off_peak_rate_or_default);
        snapshot.charge_history = refresh
            .completed_dispatches
            .iter()
            .map(|dispatch| ChargeSession::from_completed(dispatch, off_peak_rate))
            .collect();

        if let Some(session) = upcoming_sessions(refresh.saving_sessions.clone(), now).first() {
            snapshot.has_saving_session = true;
            snapshot.saving_session_start = Some(session.interval.start);
            snapshot.saving_session_end = Some(session.interval.end);
            snapshot.saving_session_active = session.is_active(now);
            snapshot.saving_session_upcoming = session.is_upcoming(now);
        }

        let usage = DailyUsage::aggregate(refresh.consumption.iter().copied(), &now.timezone());
        if !usage.is_empty() {
            snapshot.add_usage(&usage, tariff, now);
        }

        debug!(
            is_off_peak = snapshot.is_off_peak,
            dispatch_status = ?snapshot.dispatch_status,
            has_saving_session = snapshot.has_saving_session,
            "assembled",
        );
        snapshot
    }

    fn add_usage<Tz: TimeZone>(
        &mut self,
        usage: &DailyUsage,
        tariff: Option<&Tariff>,
        now: &DateTime<Tz>,
    ) {
        let days = usage.select_days(now.date_naive());
        self.data_date_latest = Some(days.latest);
        self.data_date_previous = Some(days.previous);

        if let Some(bucket) = usage.get(&days.latest) {
            self.latest_kwh = bucket.total;
            self.latest_cost = bucket.cost(tariff);
            self.off_peak_percentage = bucket.off_peak_percentage().unwrap_or_default();
        }
        if let Some(bucket) = usage.get(&days.previous) {
            self.previous_kwh = bucket.total;
            self.previous_cost = bucket.cost(tariff);
        }

        self.hourly_usage = usage.hourly_series(days, now.hour());
        self.half_hourly_usage = usage.half_hourly_series(days, half_hour_slot(now.time()));

        let projection_basis =
            if self.latest_cost > Pounds::ZERO { self.latest_cost } else { self.previous_cost };
        self.monthly_projection = (projection_basis * 30.0).round_to(2);
    }
}

fn format_time_of_day(time: chrono::NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::core::interval::Interval;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z").unwrap().to_utc()
    }

    fn interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
        Interval::try_new(start.fixed_offset(), end.fixed_offset()).unwrap()
    }

    fn tariff() -> Tariff {
        Tariff::builder()
            .display_name("Intelligent Octopus Go")
            .product_code("INTELLI-VAR-22-10-14")
            .standing_charge(Pence(50.0))
            .off_peak_rate(KilowattHourRate(7.0))
            .peak_rate(KilowattHourRate(30.0))
            .build()
    }

    fn day_of_samples(midnight: DateTime<Utc>, kwh: f64) -> Vec<ConsumptionSample> {
        (0..48)
            .map(|slot| {
                let start = midnight + TimeDelta::minutes(30 * slot);
                ConsumptionSample::try_new(
                    interval(start, start + TimeDelta::minutes(30)),
                    KilowattHours(kwh),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_empty_refresh() -> Result {
        let snapshot =
            Snapshot::assemble(&Refresh::default(), &now(), Capabilities::default(), &[]);
        assert!(!snapshot.is_off_peak);
        assert_eq!(snapshot.dispatch_status, DispatchPhase::None);
        assert!(snapshot.hourly_usage.is_empty());
        assert!(snapshot.half_hourly_usage.is_empty());
        assert_eq!(snapshot.rate, None);
        assert_eq!(snapshot.data_date_latest, None);
        assert!(!snapshot.has_saving_session);

        let json = serde_json::to_value(&snapshot)?;
        assert_eq!(json["dispatch_status"], "none");
        assert_eq!(json["hourly_usage"], serde_json::json!([]));
        assert_eq!(json["off_peak_start"], "23:30");
        assert_eq!(json["off_peak_end"], "05:30");
        assert!(json.get("error").is_none());
        Ok(())
    }

    #[test]
    fn test_full_refresh() -> Result {
        let now = now();
        let midnight = now - TimeDelta::hours(12);
        let mut consumption = day_of_samples(midnight - TimeDelta::days(2), 0.25);
        consumption.extend(day_of_samples(midnight - TimeDelta::days(1), 0.5));

        let refresh = Refresh::builder()
            .account(Account {
                number: "A-1234ABCD".to_string(),
                balance: Pounds(-42.5),
                name: "Ada Lovelace".to_string(),
                status: "ACTIVE".to_string(),
                address: "1 Example Street".to_string(),
            })
            .tariff(tariff())
            .dispatches(vec![DispatchInterval {
                interval: interval(now + TimeDelta::hours(12), now + TimeDelta::hours(13)),
                source: "smart-charge".to_string(),
                delta: None,
            }])
            .completed_dispatches(vec![DispatchInterval {
                interval: interval(midnight - TimeDelta::hours(1), midnight),
                source: "smart-charge".to_string(),
                delta: Some(KilowattHours(-7.0)),
            }])
            .saving_sessions(vec![SavingSessionWindow {
                code: "EVENT-1".to_string(),
                interval: interval(now - TimeDelta::minutes(30), now + TimeDelta::minutes(30)),
                reward_per_kwh: 1800,
            }])
            .live_power(LivePower {
                demand: Watts(2000.0),
                read_at: now.fixed_offset(),
                consumption: None,
            })
            .consumption(consumption)
            .devices(vec![SmartDevice {
                device_id: "00000000-0000-0000-0000-000000000000".to_string(),
                provider: "HYPERVOLT".to_string(),
                status: "ACTIVE".to_string(),
            }])
            .build();

        let history = [Watts(1800.0), Watts(2000.0)];
        let snapshot = Snapshot::assemble(&refresh, &now, Capabilities::default(), &history);

        assert_abs_diff_eq!(snapshot.balance.0, 42.5);
        assert!(!snapshot.balance_is_credit);

        assert_eq!(snapshot.rate, Some(KilowattHourRate(30.0)));
        assert!(!snapshot.is_off_peak);
        assert_eq!(snapshot.rate_ends_in_seconds, 11 * 3600 + 30 * 60);
        assert_eq!(snapshot.live_cost_per_hour, Some(Pence(60.0)));
        assert_eq!(snapshot.live_history.len(), 2);

        assert_eq!(snapshot.dispatch_status, DispatchPhase::Scheduled);
        assert_eq!(snapshot.next_dispatch_start, Some((now + TimeDelta::hours(12)).fixed_offset()));
        assert_eq!(snapshot.dispatch_end, None);
        assert_eq!(snapshot.charger_provider.as_deref(), Some("HYPERVOLT"));
        assert_eq!(snapshot.charge_history.len(), 1);
        assert_abs_diff_eq!(snapshot.charge_history[0].cost.0, 0.49);

        assert!(snapshot.has_saving_session);
        assert!(snapshot.saving_session_active);
        assert!(!snapshot.saving_session_upcoming);

        assert_eq!(snapshot.data_date_latest, NaiveDate::from_ymd_opt(2025, 1, 14));
        assert_eq!(snapshot.data_date_previous, NaiveDate::from_ymd_opt(2025, 1, 13));
        assert_abs_diff_eq!(snapshot.latest_kwh.0, 24.0);
        assert_abs_diff_eq!(snapshot.previous_kwh.0, 12.0);
        assert_abs_diff_eq!(snapshot.previous_cost.0, 3.295, epsilon = 1e-9);
        assert_abs_diff_eq!(snapshot.latest_cost.0, 6.09, epsilon = 1e-9);
        assert_abs_diff_eq!(snapshot.off_peak_percentage, 29.2);
        assert_abs_diff_eq!(snapshot.monthly_projection.0, 182.7);
        assert_eq!(snapshot.hourly_usage.len(), 24);
        assert_eq!(snapshot.half_hourly_usage.len(), 48);
        Ok(())
    }

    #[test]
    fn test_projection_falls_back_to_previous_day() {
        let now = now();
        let midnight = now - TimeDelta::hours(12);
        let mut consumption = day_of_samples(midnight - TimeDelta::days(1), 0.25);
        consumption.extend(day_of_samples(midnight, 0.0));

        let refresh = Refresh::builder().consumption(consumption.clone()).build();
        let snapshot = Snapshot::assemble(&refresh, &now, Capabilities::default(), &[]);
        assert_eq!(snapshot.latest_cost, Pounds::ZERO);
        assert_abs_diff_eq!(snapshot.off_peak_percentage, 0.0);
        assert_abs_diff_eq!(snapshot.monthly_projection.0, 88.2);

        // The standing charge alone makes the latest day cost something:
        let refresh = Refresh::builder().tariff(tariff()).consumption(consumption).build();
        let snapshot = Snapshot::assemble(&refresh, &now, Capabilities::default(), &[]);
        assert_abs_diff_eq!(snapshot.latest_cost.0, 0.5);
        assert_abs_diff_eq!(snapshot.monthly_projection.0, 15.0);
    }

    #[test]
    fn test_charging_now() {
        let now = now();
        let refresh = Refresh::builder()
            .dispatches(vec![DispatchInterval {
                interval: interval(now - TimeDelta::hours(1), now),
                source: "smart-charge".to_string(),
                delta: None,
            }])
            .build();
        let snapshot = Snapshot::assemble(&refresh, &now, Capabilities::default(), &[]);
        assert_eq!(snapshot.dispatch_status, DispatchPhase::Charging);
        assert_eq!(snapshot.dispatch_end, Some(now.fixed_offset()));
        assert_eq!(snapshot.next_dispatch_start, None);
    }

    #[test]
    fn test_failed() {
        let error = anyhow!("authentication failed");
        let snapshot = Snapshot::failed(now().fixed_offset(), Capabilities::default(), &error);
        assert_eq!(snapshot.error.as_deref(), Some("authentication failed"));
        assert_eq!(snapshot.dispatch_status, DispatchPhase::None);
    }
}
