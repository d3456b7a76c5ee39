#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod core;
mod prelude;
mod quantity;
mod tables;

use clap::{Parser, crate_version};
use tracing_subscriber::EnvFilter;

use crate::{cli::Args, core::snapshot::Capabilities, prelude::*};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    info!(version = crate_version!(), "starting…");

    // The assistant integration is not part of this build.
    let capabilities = Capabilities { assistant: false };

    Args::parse().command.run(capabilities)?;
    info!("done!");
    Ok(())
}
