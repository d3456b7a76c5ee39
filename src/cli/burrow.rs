use chrono::Local;
use clap::{Parser, Subcommand};

use crate::{
    cli::octopus::OctopusArgs,
    core::{
        consumption::DailyUsage,
        dispatch::{ChargeSession, DispatchStatus},
        rate::CurrentRate,
        saving_session::upcoming_sessions,
    },
    prelude::*,
    quantity::rate::KilowattHourRate,
    tables::{
        build_account_table,
        build_charge_history_table,
        build_daily_usage_table,
        build_devices_table,
        build_dispatches_table,
        build_live_power_table,
        build_rate_table,
        build_sessions_table,
        build_tariff_table,
    },
};

#[derive(Parser)]
pub struct BurrowArgs {
    #[clap(flatten)]
    octopus: OctopusArgs,

    #[command(subcommand)]
    command: BurrowCommand,
}

#[derive(Subcommand)]
enum BurrowCommand {
    /// Get the active tariff with the parsed unit rates.
    Tariff,

    /// Get the rate band in effect right now.
    Rate,

    /// Get the planned and the recently completed smart-charge dispatches.
    Dispatches,

    /// Get the saving sessions that have not ended yet.
    Sessions,

    /// Get the daily consumption with the peak and off-peak split.
    Consumption,

    /// Get the latest Home Mini reading.
    LivePower,

    /// Get the account details.
    Account,

    /// Get the registered smart-charging devices.
    Devices,
}

impl BurrowArgs {
    #[instrument(skip_all)]
    pub fn run(self) -> Result {
        let api = self.octopus.new_client();
        let now = Local::now();

        match self.command {
            BurrowCommand::Tariff => {
                let tariff = api
                    .get_tariff(&self.octopus.region, self.octopus.off_peak_window()?)?
                    .context("no active electricity tariff")?;
                println!("{}", build_tariff_table(&tariff));
            }
            BurrowCommand::Rate => {
                let tariff = api
                    .get_tariff(&self.octopus.region, self.octopus.off_peak_window()?)?
                    .context("no active electricity tariff")?;
                let rate = CurrentRate::at(&tariff, now.naive_local());
                info!(remaining = ?rate.remaining(now.naive_local()), "gotcha");
                println!("{}", build_rate_table(&rate));
            }
            BurrowCommand::Dispatches => {
                let dispatches = api.get_dispatches()?;
                let status = DispatchStatus::reconcile(&dispatches, &now);
                info!(phase = ?status.phase(), "gotcha");
                println!("{}", build_dispatches_table(&dispatches, &status));

                let sessions = api
                    .get_completed_dispatches(5)?
                    .iter()
                    .map(|dispatch| {
                        ChargeSession::from_completed(dispatch, KilowattHourRate::DEFAULT_OFF_PEAK)
                    })
                    .collect::<Vec<_>>();
                println!("{}", build_charge_history_table(&sessions));
            }
            BurrowCommand::Sessions => {
                let sessions = upcoming_sessions(api.get_saving_sessions()?, &now);
                println!("{}", build_sessions_table(&sessions, &now));
            }
            BurrowCommand::Consumption => {
                let meter =
                    self.octopus.meter().context("the MPAN and meter serial number are required")?;
                let samples = api.get_consumption(&meter, self.octopus.consumption_periods)?;
                let tariff =
                    api.get_tariff(&self.octopus.region, self.octopus.off_peak_window()?)?;
                let usage = DailyUsage::aggregate(samples, &Local);
                println!("{}", build_daily_usage_table(&usage, tariff.as_ref()));
            }
            BurrowCommand::LivePower => {
                let live_power = api.get_live_power(self.octopus.device_id.as_deref())?;
                if let Some(live_power) = live_power {
                    println!("{}", build_live_power_table(&live_power));
                } else {
                    warn!("no live power reading");
                }
            }
            BurrowCommand::Account => {
                println!("{}", build_account_table(&api.get_account()?));
            }
            BurrowCommand::Devices => {
                println!("{}", build_devices_table(&api.get_smart_devices()?));
            }
        }

        Ok(())
    }
}
