use chrono::Local;
use clap::Parser;

use crate::{
    cli::octopus::OctopusArgs,
    core::snapshot::{Capabilities, Snapshot},
    prelude::*,
    tables::{build_charge_history_table, build_series_table, build_snapshot_table},
};

#[derive(Parser)]
pub struct SnapshotArgs {
    #[clap(flatten)]
    octopus: OctopusArgs,

    /// Print the snapshot as a single JSON object instead of the tables.
    #[clap(long)]
    json: bool,
}

impl SnapshotArgs {
    #[instrument(skip_all)]
    pub fn run(self, capabilities: Capabilities) -> Result {
        let refresh = self.octopus.new_client().refresh(&self.octopus.refresh_options()?)?;
        let live_history = refresh.live_power.map(|live_power| live_power.demand);
        let snapshot = Snapshot::assemble(
            &refresh,
            &Local::now(),
            capabilities,
            live_history.as_slice(),
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        } else {
            println!("{}", build_snapshot_table(&snapshot));
            if !snapshot.hourly_usage.is_empty() {
                println!("{}", build_series_table(&snapshot.hourly_usage));
            }
            if !snapshot.charge_history.is_empty() {
                println!("{}", build_charge_history_table(&snapshot.charge_history));
            }
        }
        Ok(())
    }
}
