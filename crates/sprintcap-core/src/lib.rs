pub mod calendar;
pub mod capacity;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod render;
pub mod timeoff;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use calendar::{
  CalendarDay,
  DateRange,
  WorkCalendarConfig,
  calculate_working_days,
  get_working_days_in_range,
  is_working_day
};
pub use capacity::{
  CapacityReport,
  TimeOffEntry,
  WorkingDayResult,
  calculate_capacity_impact,
  capacity_breakdown
};
pub use error::{
  CalendarError,
  RangeViolation
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting sprintcap"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(
    files = ?cfg.loaded_files,
    time_zone = %cfg.calendar.time_zone,
    "effective config"
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    timeoff::TimeOffStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open time-off \
         store at {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg, cli.json);
  let ctx = commands::CommandContext {
    cfg:      &cfg,
    store:    &store,
    renderer: &renderer,
    now:      Utc::now()
  };

  commands::dispatch_stdout(
    &ctx,
    cli.command
  )?;

  info!("done");
  Ok(())
}
