mod args;
mod scenario;

use chrono::{DateTime, Utc};
use clap::Parser;
use log::warn;
use snafu::ErrorCompat;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let now_override: Option<DateTime<Utc>> = match args.now {
        Some(s) => match DateTime::parse_from_rfc3339(s.as_str()) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                eprintln!("Could not parse --now {:?} as an RFC 3339 timestamp: {}", s, e);
                std::process::exit(2);
            }
        },
        None => None,
    };

    let res = scenario::run_scenario(args.scenario, args.out, args.reference, now_override);
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
