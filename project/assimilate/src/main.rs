extern crate anyhow;
extern crate assimilate;
extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate log;

use anyhow::Context;
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::LevelFilter;

use std::path::PathBuf;

use assimilate::RunConfig;

#[derive(Debug, Parser)]
#[command(name = "assimilate", version,
          about = "Lagged init-to-horizon ensemble smoother for ODE models")]
struct Args {
  /// TOML run configuration.
  config: PathBuf,
  /// Overrides `output_dir` from the config.
  #[arg(long)]
  output_dir: Option<PathBuf>,
  /// Overrides `seed` from the config.
  #[arg(long)]
  seed: Option<u64>,
  /// -v for debug, -vv for trace. `RUST_LOG` applies otherwise.
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,
}

/// Filter directives from `env` (eg `RUST_LOG=assimilate=debug`), with
/// `-v` raising the global level on top of them.
fn logger(env: Env, verbose: u8) -> env_logger::Builder {
  let mut builder = env_logger::Builder::from_env(env);
  match verbose {
    0 => {},
    1 => { builder.filter_level(LevelFilter::Debug); },
    _ => { builder.filter_level(LevelFilter::Trace); },
  }
  builder.format_timestamp_secs();
  builder
}

pub fn main() -> anyhow::Result<()> {
  let args = Args::parse();
  logger(Env::default().default_filter_or("info"), args.verbose).init();

  let mut config = RunConfig::load(&args.config)
    .with_context(|| format!("loading {}", args.config.display()))?;
  if let Some(dir) = args.output_dir {
    config.output_dir = dir;
  }
  if let Some(seed) = args.seed {
    config.seed = seed;
  }

  let summary = assimilate::run(&config)
    .with_context(|| format!("assimilating {}", config.data.display()))?;

  info!("assimilated {} observations, lag windows {:?}",
        summary.lags.len(), summary.lags);
  info!("final parameters ({} rows) in {}",
        summary.params.dim().0, config.output_dir.display());
  Ok(())
}
