use chrono::NaiveTime;
use clap::Parser;

use crate::{
    api::octopus::{Api, Meter, RefreshOptions},
    core::interval::RateWindow,
    prelude::*,
};

#[derive(Parser)]
pub struct OctopusArgs {
    /// Octopus Energy API key, starts with `sk_live_`.
    #[clap(long = "api-key", env = "OCTOPUS_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Account number, for example: `A-1234ABCD`.
    #[clap(long, env = "OCTOPUS_ACCOUNT")]
    pub account: String,

    /// Meter point administration number.
    #[clap(long, env = "OCTOPUS_MPAN")]
    pub mpan: Option<String>,

    #[clap(long = "meter-serial", env = "OCTOPUS_METER_SERIAL")]
    pub meter_serial: Option<String>,

    /// Distribution region letter used in the tariff code.
    #[clap(long, env = "OCTOPUS_REGION", default_value = "J")]
    pub region: String,

    #[clap(
        long = "off-peak-start",
        env = "OCTOPUS_OFF_PEAK_START",
        default_value = "23:30",
        value_parser = parse_time_of_day,
    )]
    pub off_peak_start: NaiveTime,

    #[clap(
        long = "off-peak-end",
        env = "OCTOPUS_OFF_PEAK_END",
        default_value = "05:30",
        value_parser = parse_time_of_day,
    )]
    pub off_peak_end: NaiveTime,

    /// Number of half-hourly consumption readings to fetch.
    #[clap(
        long = "consumption-periods",
        env = "OCTOPUS_CONSUMPTION_PERIODS",
        default_value = "96"
    )]
    pub consumption_periods: usize,

    /// Home Mini device ID, discovered from the account when not set.
    #[clap(long = "device-id", env = "OCTOPUS_DEVICE_ID")]
    pub device_id: Option<String>,
}

impl OctopusArgs {
    pub fn new_client(&self) -> Api {
        Api::new(self.api_key.clone(), self.account.clone())
    }

    pub fn off_peak_window(&self) -> Result<RateWindow> {
        RateWindow::try_new(self.off_peak_start, self.off_peak_end)
    }

    pub fn meter(&self) -> Option<Meter> {
        match (&self.mpan, &self.meter_serial) {
            (Some(mpan), Some(serial_number)) => {
                Some(Meter { mpan: mpan.clone(), serial_number: serial_number.clone() })
            }
            (None, None) => None,
            _ => {
                warn!("both the MPAN and the meter serial number are needed for consumption");
                None
            }
        }
    }

    pub fn refresh_options(&self) -> Result<RefreshOptions> {
        Ok(RefreshOptions::builder()
            .region(&self.region)
            .off_peak_window(self.off_peak_window()?)
            .maybe_meter(self.meter())
            .consumption_periods(self.consumption_periods)
            .maybe_device_id(self.device_id.clone())
            .build())
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("`{value}` is not a valid `HH:MM` time"))
}
