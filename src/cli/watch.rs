use std::{thread::sleep, time::Duration};

use chrono::Local;
use clap::Parser;

use crate::{
    cli::octopus::OctopusArgs,
    core::{
        series::BoundedSeries,
        snapshot::{Capabilities, Snapshot},
    },
    prelude::*,
    quantity::power::Watts,
};

/// Number of live power readings kept between refreshes.
const LIVE_HISTORY_LENGTH: usize = 60;

#[derive(Parser)]
pub struct WatchArgs {
    #[clap(flatten)]
    octopus: OctopusArgs,

    /// Refresh interval, for example: `30s` or `2m`.
    #[clap(
        long,
        env = "OCTOPUS_REFRESH_INTERVAL",
        default_value = "30s",
        value_parser = humantime::parse_duration,
    )]
    interval: Duration,
}

impl WatchArgs {
    #[instrument(skip_all, fields(interval = ?self.interval))]
    pub fn run(self, capabilities: Capabilities) -> Result {
        let api = self.octopus.new_client();
        let mut options = self.octopus.refresh_options()?;
        if options.device_id.is_none() {
            // Resolve the device once instead of on every refresh:
            match api.discover_meter_device() {
                Ok(Some(device_id)) => options.device_id = Some(device_id),
                Ok(None) => {
                    info!("no smart-meter device, live power is disabled");
                    options.live_power = false;
                }
                Err(error) => warn!("failed to discover the smart-meter device: {error:#}"),
            }
        }

        let mut live_history = BoundedSeries::<Watts>::new(LIVE_HISTORY_LENGTH);
        loop {
            let now = Local::now();
            let snapshot = match api.refresh(&options) {
                Ok(refresh) => {
                    if let Some(live_power) = refresh.live_power {
                        live_history.push(live_power.demand);
                        debug!(n_readings = live_history.len(), "recorded the live power");
                    }
                    Snapshot::assemble(&refresh, &now, capabilities, &live_history.to_vec())
                }
                Err(error) => {
                    let error = Error::from(error);
                    error!("refresh failed: {error:#}");
                    Snapshot::failed(now.fixed_offset(), capabilities, &error)
                }
            };
            println!("{}", serde_json::to_string(&snapshot)?);
            sleep(self.interval);
        }
    }
}
