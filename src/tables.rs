use chrono::{DateTime, FixedOffset, TimeZone};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        account::{Account, LivePower, SmartDevice},
        consumption::DailyUsage,
        dispatch::{ChargeSession, DispatchPhase, DispatchStatus},
        interval::{DispatchInterval, SavingSessionWindow},
        rate::CurrentRate,
        saving_session::SessionPhase,
        snapshot::Snapshot,
        tariff::Tariff,
    },
    quantity::{energy::KilowattHours, rate::KilowattHourRate},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

const fn rate_color(is_off_peak: bool) -> Color {
    if is_off_peak { Color::Green } else { Color::Red }
}

fn format_instant(instant: Option<DateTime<FixedOffset>>) -> String {
    instant.map_or_else(|| "—".to_string(), |instant| instant.format("%b %d %H:%M").to_string())
}

fn format_rate(rate: Option<KilowattHourRate>) -> String {
    rate.map_or_else(|| "—".to_string(), |rate| format!("{rate:.2}"))
}

#[must_use]
pub fn build_snapshot_table(snapshot: &Snapshot) -> Table {
    let mut table = new_table();
    table.set_header(vec!["", "Value"]);
    table.add_row(vec![
        Cell::new("Rate"),
        Cell::new(format_rate(snapshot.rate)).fg(rate_color(snapshot.is_off_peak)),
    ]);
    table.add_row(vec![
        Cell::new("Band ends in"),
        Cell::new(format!(
            "{}h {:02}m",
            snapshot.rate_ends_in_seconds / 3600,
            snapshot.rate_ends_in_seconds % 3600 / 60,
        )),
    ]);
    table.add_row(vec![
        Cell::new("Balance"),
        Cell::new(format!(
            "{:.2} {}",
            snapshot.balance,
            if snapshot.balance_is_credit { "credit" } else { "owed" },
        ))
        .fg(if snapshot.balance_is_credit { Color::Green } else { Color::DarkYellow }),
    ]);
    if let Some(live_power) = snapshot.live_power_watts {
        table.add_row(vec![Cell::new("Live power"), Cell::new(format!("{live_power:.0}"))]);
    }
    if let Some(live_cost) = snapshot.live_cost_per_hour {
        table.add_row(vec![Cell::new("Live cost"), Cell::new(format!("{live_cost:.1}/h"))]);
    }
    table.add_row(vec![
        Cell::new("Smart charge"),
        Cell::new(match snapshot.dispatch_status {
            DispatchPhase::Charging => {
                format!("charging until {}", format_instant(snapshot.dispatch_end))
            }
            DispatchPhase::Scheduled => format!(
                "scheduled {} – {}",
                format_instant(snapshot.next_dispatch_start),
                format_instant(snapshot.next_dispatch_end),
            ),
            DispatchPhase::None => "none".to_string(),
        })
        .fg(match snapshot.dispatch_status {
            DispatchPhase::Charging => Color::Green,
            DispatchPhase::Scheduled => Color::DarkYellow,
            DispatchPhase::None => Color::Reset,
        }),
    ]);
    if snapshot.has_saving_session {
        table.add_row(vec![
            Cell::new("Saving session"),
            Cell::new(format!(
                "{} – {}",
                format_instant(snapshot.saving_session_start),
                format_instant(snapshot.saving_session_end),
            ))
            .fg(if snapshot.saving_session_active { Color::Green } else { Color::Reset }),
        ]);
    }
    if let Some(date) = snapshot.data_date_latest {
        table.add_row(vec![
            Cell::new(format!("Usage {}", date.format("%b %d"))),
            Cell::new(format!("{:.2} / {:.2}", snapshot.latest_kwh, snapshot.latest_cost)),
        ]);
    }
    if let Some(date) = snapshot.data_date_previous {
        table.add_row(vec![
            Cell::new(format!("Usage {}", date.format("%b %d"))).add_attribute(Attribute::Dim),
            Cell::new(format!("{:.2} / {:.2}", snapshot.previous_kwh, snapshot.previous_cost))
                .add_attribute(Attribute::Dim),
        ]);
    }
    table.add_row(vec![
        Cell::new("Off-peak share"),
        Cell::new(format!("{:.1}%", snapshot.off_peak_percentage)),
    ]);
    table.add_row(vec![
        Cell::new("Monthly projection"),
        Cell::new(format!("{:.2}", snapshot.monthly_projection)),
    ]);
    if let Some(tariff_name) = &snapshot.tariff_name {
        table.add_row(vec![Cell::new("Tariff"), Cell::new(tariff_name)]);
    }
    if let Some(charger_provider) = &snapshot.charger_provider {
        table.add_row(vec![Cell::new("Charger"), Cell::new(charger_provider)]);
    }
    if let Some(error) = &snapshot.error {
        table.add_row(vec![Cell::new("Error"), Cell::new(error).fg(Color::Red)]);
    }
    table
}

/// Hourly usage series, oldest first, ending at the current hour.
#[must_use]
pub fn build_series_table(series: &[KilowattHours]) -> Table {
    let peak = series.iter().copied().max().unwrap_or(KilowattHours::ZERO);
    let mut table = new_table();
    table.set_header(vec!["Hours ago", "Usage"]);
    for (hours_ago, kwh) in series.iter().rev().enumerate() {
        let is_peak = *kwh >= peak && peak > KilowattHours::ZERO;
        table.add_row(vec![
            Cell::new(hours_ago).add_attribute(Attribute::Dim),
            Cell::new(format!("{kwh:.3}"))
                .set_alignment(CellAlignment::Right)
                .fg(if is_peak { Color::Red } else { Color::Reset }),
        ]);
    }
    table
}

#[must_use]
pub fn build_tariff_table(tariff: &Tariff) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Name", "Product", "Standing", "Off-peak", "Peak", "Window"]);
    table.add_row(vec![
        Cell::new(&tariff.display_name),
        Cell::new(&tariff.product_code).add_attribute(Attribute::Dim),
        Cell::new(format!("{:.2}/day", tariff.standing_charge)).set_alignment(CellAlignment::Right),
        Cell::new(format_rate(tariff.off_peak_rate)).fg(Color::Green),
        Cell::new(format_rate(tariff.peak_rate)).fg(Color::Red),
        Cell::new(format!(
            "{} – {}",
            tariff.off_peak_window.start.format("%H:%M"),
            tariff.off_peak_window.end.format("%H:%M"),
        )),
    ]);
    table
}

#[must_use]
pub fn build_rate_table(rate: &CurrentRate) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Rate", "Band", "Until", "Next rate"]);
    table.add_row(vec![
        Cell::new(format!("{:.2}", rate.rate)).fg(rate_color(rate.is_off_peak)),
        Cell::new(if rate.is_off_peak { "off-peak" } else { "peak" }),
        Cell::new(rate.period_end.format("%b %d %H:%M")),
        Cell::new(format!("{:.2}", rate.next_rate)).fg(rate_color(!rate.is_off_peak)),
    ]);
    table
}

#[must_use]
pub fn build_dispatches_table(dispatches: &[DispatchInterval], status: &DispatchStatus) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Start", "End", "Source", "Delta", ""]);
    for dispatch in dispatches {
        let (marker, color) = if status.current.as_ref() == Some(dispatch) {
            ("charging", Color::Green)
        } else if status.next.as_ref() == Some(dispatch) {
            ("next", Color::DarkYellow)
        } else {
            ("", Color::Reset)
        };
        table.add_row(vec![
            Cell::new(dispatch.interval.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(dispatch.interval.start.format("%H:%M")),
            Cell::new(dispatch.interval.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(&dispatch.source),
            Cell::new(
                dispatch.delta.map_or_else(|| "—".to_string(), |delta| format!("{delta:.2}")),
            )
            .set_alignment(CellAlignment::Right),
            Cell::new(marker).fg(color),
        ]);
    }
    table
}

#[must_use]
pub fn build_charge_history_table(sessions: &[ChargeSession]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Start", "End", "Duration", "Energy", "Cost"]);
    for session in sessions {
        table.add_row(vec![
            Cell::new(session.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(session.start.format("%H:%M")),
            Cell::new(session.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(format!("{} min", session.duration_mins)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", session.kwh)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", session.cost)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[must_use]
pub fn build_sessions_table<Tz: TimeZone>(
    sessions: &[SavingSessionWindow],
    now: &DateTime<Tz>,
) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Code", "Date", "Start", "End", "Reward", ""]);
    for session in sessions {
        let phase = session.phase(now);
        table.add_row(vec![
            Cell::new(&session.code),
            Cell::new(session.interval.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(session.interval.start.format("%H:%M")),
            Cell::new(session.interval.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(format!("{} pts/kWh", session.reward_per_kwh))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{phase:?}").to_lowercase()).fg(match phase {
                SessionPhase::Active => Color::Green,
                SessionPhase::Upcoming => Color::DarkYellow,
                SessionPhase::Past => Color::Reset,
            }),
        ]);
    }
    table
}

#[must_use]
pub fn build_daily_usage_table(usage: &DailyUsage, tariff: Option<&Tariff>) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Total", "Off-peak", "Peak", "Off-peak %", "Cost"]);
    for (date, bucket) in usage.iter().rev() {
        table.add_row(vec![
            Cell::new(date.format("%a %b %d")),
            Cell::new(format!("{:.2}", bucket.total)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", bucket.off_peak_consumption()))
                .set_alignment(CellAlignment::Right)
                .fg(Color::Green),
            Cell::new(format!("{:.2}", bucket.peak_consumption()))
                .set_alignment(CellAlignment::Right)
                .fg(Color::Red),
            Cell::new(
                bucket
                    .off_peak_percentage()
                    .map_or_else(|| "—".to_string(), |percentage| format!("{percentage:.1}%")),
            )
            .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", bucket.cost(tariff))).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[must_use]
pub fn build_account_table(account: &Account) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Account", "Name", "Status", "Balance", "Address"]);
    table.add_row(vec![
        Cell::new(&account.number),
        Cell::new(&account.name),
        Cell::new(&account.status).add_attribute(Attribute::Dim),
        Cell::new(format!("{:.2}", account.balance))
            .set_alignment(CellAlignment::Right)
            .fg(if account.is_credit() { Color::Green } else { Color::DarkYellow }),
        Cell::new(&account.address).add_attribute(Attribute::Dim),
    ]);
    table
}

#[must_use]
pub fn build_live_power_table(live_power: &LivePower) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Read at", "Demand", "Consumption"]);
    table.add_row(vec![
        Cell::new(live_power.read_at.format("%H:%M:%S")),
        Cell::new(format!("{:.0}", live_power.demand)).set_alignment(CellAlignment::Right),
        Cell::new(
            live_power.consumption.map_or_else(|| "—".to_string(), |kwh| format!("{kwh:.3}")),
        )
        .set_alignment(CellAlignment::Right),
    ]);
    table
}

#[must_use]
pub fn build_devices_table(devices: &[SmartDevice]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Device", "Provider", "Status"]);
    for device in devices {
        table.add_row(vec![
            Cell::new(&device.device_id).add_attribute(Attribute::Dim),
            Cell::new(&device.provider),
            Cell::new(&device.status),
        ]);
    }
    table
}
