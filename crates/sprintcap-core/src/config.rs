use std::collections::BTreeSet;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::calendar::{
  CalendarDay,
  SATURDAY,
  WorkCalendarConfig
};
use crate::datetime::{
  parse_timezone,
  weekday_index_from_name
};

const CONFIG_ENV_VAR: &str =
  "SPRINTCAP_CONFIG";
const CONFIG_DIR_NAME: &str =
  "sprintcap";
const CONFIG_FILE_NAME: &str =
  "config.toml";
const DEFAULT_DATA_DIR_NAME: &str =
  ".sprintcap";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
  calendar: RawCalendar,
  holidays: Vec<RawHoliday>,
  data:     RawData,
  display:  RawDisplay
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawCalendar {
  working_days_per_week: Option<u8>,
  working_days: Option<Vec<WeekdaySpec>>,
  time_zone: Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeekdaySpec {
  Index(u8),
  Name(String)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHoliday {
  date: NaiveDate,
  #[serde(default)]
  name: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawData {
  location: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawDisplay {
  color: Option<bool>
}

/// A configured holiday; the name is
/// only used for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
  pub date: NaiveDate,
  pub name: Option<String>
}

/// Effective team configuration after
/// the file and `--set` overrides.
#[derive(Debug, Clone)]
pub struct Config {
  pub calendar:      WorkCalendarConfig,
  pub holidays:      Vec<Holiday>,
  pub data_location: Option<PathBuf>,
  pub color:         bool,
  pub loaded_files:  Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      calendar:      WorkCalendarConfig::default(),
      holidays:      vec![],
      data_location: None,
      color:         true,
      loaded_files:  vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) = resolve_config_path(
      config_override
    )?
    else {
      warn!(
        "no team calendar config \
         found; using defaults"
      );
      return Ok(Self::default());
    };

    info!(config = %path.display(), "loading team calendar config");
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    let mut cfg = Self::from_toml_str(
      &text,
      &path.display().to_string()
    )?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str,
    source: &str
  ) -> anyhow::Result<Self> {
    let raw: RawConfig =
      toml::from_str(text)
        .with_context(|| {
          format!(
            "invalid config in {source}"
          )
        })?;

    let mut cfg = Self::default();

    if let Some(days) =
      raw.calendar.working_days
    {
      cfg.calendar.working_days =
        resolve_weekdays(&days)
          .with_context(|| {
            format!(
              "invalid \
               calendar.working_days in \
               {source}"
            )
          })?;
    }
    if let Some(per_week) = raw
      .calendar
      .working_days_per_week
    {
      cfg.calendar.working_days_per_week =
        per_week;
    }
    if let Some(tz) =
      raw.calendar.time_zone
    {
      cfg.calendar.time_zone =
        parse_timezone(&tz, source)?;
    }

    for holiday in raw.holidays {
      cfg.add_holiday(
        holiday.date,
        holiday.name
      );
    }

    cfg.data_location = raw
      .data
      .location
      .map(|loc| {
        expand_tilde(Path::new(&loc))
      });
    if let Some(color) =
      raw.display.color
    {
      cfg.color = color;
    }

    cfg.warn_if_inconsistent();
    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k.trim();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");
      match key {
        | "calendar.working_days" => {
          let specs: Vec<WeekdaySpec> =
            value
              .split(',')
              .map(str::trim)
              .filter(|s| !s.is_empty())
              .map(|s| {
                s.parse::<u8>()
                  .map(WeekdaySpec::Index)
                  .unwrap_or_else(|_| {
                    WeekdaySpec::Name(
                      s.to_string()
                    )
                  })
              })
              .collect();
          self.calendar.working_days =
            resolve_weekdays(&specs)?;
        }
        | "calendar.working_days_per_week" => {
          self
            .calendar
            .working_days_per_week =
            value.parse().with_context(
              || {
                format!(
                  "invalid working days \
                   per week: {value}"
                )
              }
            )?;
        }
        | "calendar.time_zone" => {
          self.calendar.time_zone =
            parse_timezone(
              value, "override"
            )?;
        }
        | "holidays.add" => {
          let date =
            value.calendar_day()?;
          self.add_holiday(date, None);
        }
        | "data.location" => {
          self.data_location =
            Some(expand_tilde(
              Path::new(value)
            ));
        }
        | "display.color" => {
          self.color = parse_bool(value)
            .ok_or_else(|| {
              anyhow!(
                "invalid color setting: \
                 {value}"
              )
            })?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: {other}"
          ));
        }
      }
    }

    self.warn_if_inconsistent();
    Ok(())
  }

  /// Adds a holiday, keeping the list
  /// sorted and free of duplicates.
  pub fn add_holiday(
    &mut self,
    date: NaiveDate,
    name: Option<String>
  ) {
    match self
      .holidays
      .binary_search_by_key(
        &date,
        |h| h.date
      ) {
      | Ok(idx) => {
        if name.is_some() {
          self.holidays[idx].name = name;
        }
      }
      | Err(idx) => {
        self
          .holidays
          .insert(idx, Holiday {
            date,
            name
          });
      }
    }
    self.calendar.holidays = self
      .holidays
      .iter()
      .map(|h| h.date)
      .collect();
  }

  fn warn_if_inconsistent(&self) {
    let listed =
      self.calendar.working_days.len();
    if listed == 0 {
      warn!(
        "no working weekdays \
         configured; every range has \
         zero working days"
      );
    } else if listed
      != usize::from(
        self
          .calendar
          .working_days_per_week
      )
    {
      warn!(
        listed,
        per_week = self
          .calendar
          .working_days_per_week,
        "working_days_per_week does \
         not match working_days"
      );
    }
  }
}

fn resolve_weekdays(
  specs: &[WeekdaySpec]
) -> anyhow::Result<BTreeSet<u8>> {
  specs
    .iter()
    .map(|spec| match spec {
      | WeekdaySpec::Index(idx)
        if *idx <= SATURDAY =>
      {
        Ok(*idx)
      }
      | WeekdaySpec::Index(idx) => {
        Err(anyhow!(
          "weekday index {idx} is out \
           of range 0..=6"
        ))
      }
      | WeekdaySpec::Name(name) => {
        weekday_index_from_name(name)
          .ok_or_else(|| {
            anyhow!(
              "unknown weekday name: \
               {name}"
            )
          })
      }
    })
    .collect()
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(location) =
    &cfg.data_location
  {
    location.clone()
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(
      path
    )));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(expand_tilde(
      Path::new(&env_path)
    )));
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!(
      "no platform config directory"
    );
    return Ok(None);
  };
  let candidate = config_dir
    .join(CONFIG_DIR_NAME)
    .join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(DEFAULT_DATA_DIR_NAME))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
