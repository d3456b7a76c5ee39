mod burrow;
mod octopus;
mod snapshot;
mod watch;

use clap::{Parser, Subcommand};

use crate::{
    cli::{burrow::BurrowArgs, snapshot::SnapshotArgs, watch::WatchArgs},
    core::snapshot::Capabilities,
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: fetch everything once and print the snapshot.
    #[clap(name = "snapshot")]
    Snapshot(Box<SnapshotArgs>),

    /// Refresh on an interval and print one JSON snapshot per line.
    #[clap(name = "watch")]
    Watch(Box<WatchArgs>),

    /// Development tools.
    #[clap(name = "burrow")]
    Burrow(Box<BurrowArgs>),
}

impl Command {
    pub fn run(self, capabilities: Capabilities) -> Result {
        match self {
            Self::Snapshot(args) => args.run(capabilities),
            Self::Watch(args) => args.run(capabilities),
            Self::Burrow(args) => args.run(),
        }
    }
}
