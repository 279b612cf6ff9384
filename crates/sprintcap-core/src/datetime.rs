use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::calendar::CalendarDay;
use crate::error::{
  CalendarError,
  Result
};

/// The calendar day `now` falls on in
/// the team's zone.
#[must_use]
pub fn today_in(
  tz: Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(&tz).date_naive()
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

#[must_use]
pub fn weekday_name(
  date: NaiveDate
) -> &'static str {
  match date.weekday() {
    | Weekday::Mon => "Monday",
    | Weekday::Tue => "Tuesday",
    | Weekday::Wed => "Wednesday",
    | Weekday::Thu => "Thursday",
    | Weekday::Fri => "Friday",
    | Weekday::Sat => "Saturday",
    | Weekday::Sun => "Sunday"
  }
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return Err(anyhow!(
      "empty time zone in {source}"
    ));
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured team timezone"
      );
      Ok(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      Err(anyhow!(
        "unknown time zone {trimmed:?} \
         in {source}"
      ))
    }
  }
}

/// Resolves a command-line date
/// expression to a calendar day.
///
/// Relative forms are evaluated against
/// `now` as seen from `tz`.
#[tracing::instrument(skip(tz, now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  tz: Tz,
  now: DateTime<Utc>
) -> Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = today_in(tz, now);

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(
        input, today, 1
      );
    }
    | "yesterday" => {
      return shift_days(
        input, today, -1
      );
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  if let Some((sign, num, unit)) =
    parse_relative(token)
  {
    let days = match unit {
      | 'w' => num.checked_mul(7),
      | _ => Some(num)
    }
    .ok_or_else(|| {
      CalendarError::invalid_date(input)
    })?;
    return shift_days(
      input,
      today,
      if sign == '-' {
        -days
      } else {
        days
      }
    );
  }

  token.calendar_day().map_err(|_| {
    CalendarError::invalid_date(input)
  })
}

fn shift_days(
  input: &str,
  from: NaiveDate,
  days: i64
) -> Result<NaiveDate> {
  Duration::try_days(days)
    .and_then(|delta| {
      from.checked_add_signed(delta)
    })
    .ok_or_else(|| {
      CalendarError::invalid_date(input)
    })
}

fn parse_relative(
  token: &str
) -> Option<(char, i64, char)> {
  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
  )
  .ok()?;
  let caps = rel_re.captures(token)?;

  let sign = caps
    .name("sign")?
    .as_str()
    .chars()
    .next()?;
  let num = caps
    .name("num")?
    .as_str()
    .parse::<i64>()
    .ok()?;
  let unit = caps
    .name("unit")?
    .as_str()
    .chars()
    .next()?;
  Some((sign, num, unit))
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Weekday names used in calendar
/// files, mapped to Sunday-based
/// indices.
pub fn weekday_index_from_name(
  token: &str
) -> Option<u8> {
  parse_weekday_name(
    &token.to_ascii_lowercase()
  )
  .map(|weekday| {
    weekday.num_days_from_sunday() as u8
  })
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
