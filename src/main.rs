extern crate clap;
extern crate tracing;
extern crate tracing_subscriber;

use clap::Parser;
use qecsim_deformed::cli::*;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    if let Err(err) = Cli::parse().run() {
        error!("{err}");
        std::process::exit(1);
    }
}
