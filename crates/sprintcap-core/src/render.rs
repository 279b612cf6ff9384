use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{DateRange, WorkCalendarConfig};
use crate::capacity::CapacityReport;
use crate::config::{Config, Holiday};
use crate::datetime::{format_date, weekday_name};
use crate::timeoff::TimeOffRecord;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    json: bool,
}

impl Renderer {
    pub fn new(cfg: &Config, json: bool) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
            json,
        }
    }

    /// Renderer that never emits colour codes.
    pub fn plain(json: bool) -> Self {
        Self { color: false, json }
    }

    pub fn is_workday<W: Write>(&self, out: &mut W, date: NaiveDate, working: bool) -> anyhow::Result<()> {
        if self.json {
            return write_json(
                out,
                &json!({
                    "date": date,
                    "weekday": weekday_name(date),
                    "working_day": working,
                }),
            );
        }

        let answer = if working {
            self.paint("yes", "32")
        } else {
            self.paint("no", "31")
        };
        writeln!(out, "{answer}")?;
        Ok(())
    }

    pub fn workdays<W: Write>(
        &self,
        out: &mut W,
        range: &DateRange,
        days: &[NaiveDate],
        list: bool,
    ) -> anyhow::Result<()> {
        if self.json {
            let dates = list.then_some(days);
            return write_json(
                out,
                &json!({
                    "start": range.start(),
                    "end": range.end(),
                    "working_days": days.len(),
                    "dates": dates,
                }),
            );
        }

        if !list {
            writeln!(out, "{}", days.len())?;
            return Ok(());
        }

        let headers = vec!["Date".to_string(), "Weekday".to_string()];
        let rows = days
            .iter()
            .map(|day| vec![format_date(*day), weekday_name(*day).to_string()])
            .collect();
        write_table(&mut *out, headers, rows)?;
        writeln!(out, "{} working days in {}", days.len(), range)?;
        Ok(())
    }

    pub fn capacity<W: Write>(&self, out: &mut W, report: &CapacityReport) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, report);
        }

        let result = &report.result;
        let pct = result.available_capacity_percentage.to_string() + "%";
        let pct = if result.available_capacity_percentage < 50 {
            self.paint(&pct, "31")
        } else {
            pct
        };

        writeln!(out, "sprint              {}..{}", report.sprint.start, report.sprint.end)?;
        writeln!(out, "working days        {}", result.total_working_days)?;
        writeln!(out, "impacted days       {}", format_days(result.impacted_days))?;
        writeln!(out, "available capacity  {pct}")?;

        if report.impact_by_user.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        let headers = vec!["User".to_string(), "Days off".to_string()];
        let rows = report
            .impact_by_user
            .iter()
            .map(|(user, days)| vec![user.clone(), format_days(*days)])
            .collect();
        write_table(&mut *out, headers, rows)
    }

    pub fn timeoff<W: Write>(&self, out: &mut W, records: &[TimeOffRecord]) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, &records);
        }

        let headers = vec![
            "ID".to_string(),
            "User".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Kind".to_string(),
            "Day".to_string(),
            "Note".to_string(),
        ];
        let rows = records
            .iter()
            .map(|record| {
                vec![
                    self.paint(&record.short_id(), "33"),
                    record.entry.user_id.clone(),
                    format_date(record.entry.start_date),
                    format_date(record.entry.end_date),
                    record.kind.to_string(),
                    if record.entry.all_day { "full" } else { "half" }.to_string(),
                    record.note.clone().unwrap_or_default(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn holidays<W: Write>(&self, out: &mut W, holidays: &[Holiday]) -> anyhow::Result<()> {
        if self.json {
            let items: Vec<_> = holidays
                .iter()
                .map(|h| json!({ "date": h.date, "name": h.name, "weekday": weekday_name(h.date) }))
                .collect();
            return write_json(out, &items);
        }

        let headers = vec!["Date".to_string(), "Weekday".to_string(), "Name".to_string()];
        let rows = holidays
            .iter()
            .map(|h| {
                vec![
                    format_date(h.date),
                    weekday_name(h.date).to_string(),
                    h.name.clone().unwrap_or_default(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn config<W: Write>(&self, out: &mut W, cfg: &Config) -> anyhow::Result<()> {
        let calendar: &WorkCalendarConfig = &cfg.calendar;
        let files: Vec<String> = cfg
            .loaded_files
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        if self.json {
            return write_json(
                out,
                &json!({
                    "working_days_per_week": calendar.working_days_per_week,
                    "working_days": calendar.working_days,
                    "holidays": calendar.holidays,
                    "time_zone": calendar.time_zone.name(),
                    "data_location": cfg.data_location.as_ref().map(|p| p.display().to_string()),
                    "loaded_files": files,
                }),
            );
        }

        let weekdays = calendar
            .working_days
            .iter()
            .map(|idx| WEEKDAY_ABBREVIATIONS.get(usize::from(*idx)).copied().unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "working days      {weekdays}")?;
        writeln!(out, "days per week     {}", calendar.working_days_per_week)?;
        writeln!(out, "holidays          {}", calendar.holidays.len())?;
        writeln!(out, "time zone         {}", calendar.time_zone.name())?;
        if let Some(location) = &cfg.data_location {
            writeln!(out, "data location     {}", location.display())?;
        }
        if files.is_empty() {
            writeln!(out, "config file       (defaults)")?;
        } else {
            writeln!(out, "config file       {}", files.join(", "))?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

const WEEKDAY_ABBREVIATIONS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn format_days(days: f64) -> String {
    if days.fract() == 0.0 {
        format!("{days:.0}")
    } else {
        format!("{days:.1}")
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
