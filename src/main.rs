#![allow(dead_code, unused_imports)]
#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;
mod error;

use anyhow::Result;
use cli::Cli;
use clap::Parser;
use tracing_subscriber::{fmt::time::Uptime, EnvFilter};

fn main() -> Result<()> {
    // Every line carries the time elapsed since start
    tracing_subscriber::fmt()
        .with_timer(Uptime::default())
        .with_env_filter(EnvFilter::from_default_env().add_directive("seq2seq_rl=info".parse()?))
        .init();

    let cli = Cli::parse();
    cli.run()
}
