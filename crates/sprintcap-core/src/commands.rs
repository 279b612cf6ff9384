use std::io::{self, Write};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::calendar::{DateRange, is_working_day};
use crate::capacity::{TimeOffEntry, capacity_breakdown};
use crate::cli::{Command, TimeoffAddArgs, TimeoffCommand};
use crate::config::Config;
use crate::datetime::parse_date_expr;
use crate::render::Renderer;
use crate::timeoff::{TimeOffRecord, TimeOffStore, for_user, overlapping};

/// Everything a subcommand needs, resolved once by [`crate::run`].
pub struct CommandContext<'a> {
    pub cfg: &'a Config,
    pub store: &'a TimeOffStore,
    pub renderer: &'a Renderer,
    pub now: DateTime<Utc>,
}

impl CommandContext<'_> {
    fn date(&self, input: &str) -> anyhow::Result<chrono::NaiveDate> {
        parse_date_expr(input, self.cfg.calendar.time_zone, self.now)
            .with_context(|| format!("could not read date {input:?}"))
    }

    fn range(&self, start: &str, end: &str) -> anyhow::Result<DateRange> {
        let start = self.date(start)?;
        let end = self.date(end)?;
        Ok(DateRange::new(start, end)?)
    }
}

#[instrument(skip(ctx, out, command))]
pub fn dispatch<W: Write>(ctx: &CommandContext<'_>, out: &mut W, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::IsWorkday { date } => cmd_is_workday(ctx, out, &date),
        Command::Workdays { start, end, list } => cmd_workdays(ctx, out, &start, &end, list),
        Command::Capacity { start, end, users } => cmd_capacity(ctx, out, &start, &end, &users),
        Command::Timeoff(TimeoffCommand::Add(args)) => cmd_timeoff_add(ctx, out, args),
        Command::Timeoff(TimeoffCommand::List { user }) => cmd_timeoff_list(ctx, out, user.as_deref()),
        Command::Timeoff(TimeoffCommand::Remove { id }) => cmd_timeoff_remove(ctx, out, &id),
        Command::Holidays => ctx.renderer.holidays(out, &ctx.cfg.holidays),
        Command::Config => ctx.renderer.config(out, ctx.cfg),
    }
}

/// Runs `command` against stdout.
pub fn dispatch_stdout(ctx: &CommandContext<'_>, command: Command) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    dispatch(ctx, &mut out, command)?;
    out.flush()?;
    Ok(())
}

fn cmd_is_workday<W: Write>(ctx: &CommandContext<'_>, out: &mut W, input: &str) -> anyhow::Result<()> {
    info!("command is-workday");
    let date = ctx.date(input)?;
    let working = is_working_day(&date, &ctx.cfg.calendar)?;
    ctx.renderer.is_workday(out, date, working)
}

fn cmd_workdays<W: Write>(
    ctx: &CommandContext<'_>,
    out: &mut W,
    start: &str,
    end: &str,
    list: bool,
) -> anyhow::Result<()> {
    info!("command workdays");
    let range = ctx.range(start, end)?;
    let days = range.working_days(&ctx.cfg.calendar);
    ctx.renderer.workdays(out, &range, &days, list)
}

fn cmd_capacity<W: Write>(
    ctx: &CommandContext<'_>,
    out: &mut W,
    start: &str,
    end: &str,
    users: &[String],
) -> anyhow::Result<()> {
    info!("command capacity");
    let sprint = ctx.range(start, end)?;
    let records = ctx.store.load()?;

    let entries: Vec<&TimeOffEntry> = overlapping(&records, &sprint)
        .filter(|r| users.is_empty() || users.contains(&r.entry.user_id))
        .map(|r| &r.entry)
        .collect();
    debug!(entries = entries.len(), "time-off entries in sprint");

    let report = capacity_breakdown(&sprint, entries, &ctx.cfg.calendar)?;
    ctx.renderer.capacity(out, &report)
}

fn cmd_timeoff_add<W: Write>(ctx: &CommandContext<'_>, out: &mut W, args: TimeoffAddArgs) -> anyhow::Result<()> {
    info!("command timeoff add");
    let range = ctx.range(&args.start, &args.end)?;
    let entry = TimeOffEntry {
        user_id: args.user,
        start_date: range.start(),
        end_date: range.end(),
        all_day: !args.half_day,
    };

    let mut record = TimeOffRecord::new(entry, args.kind);
    record.note = args.note;
    let id = record.id;
    let records = ctx.store.add(record)?;

    let added: Vec<TimeOffRecord> = records.into_iter().filter(|r| r.id == id).collect();
    ctx.renderer.timeoff(out, &added)
}

fn cmd_timeoff_list<W: Write>(ctx: &CommandContext<'_>, out: &mut W, user: Option<&str>) -> anyhow::Result<()> {
    info!("command timeoff list");
    let records = ctx.store.load()?;
    let shown: Vec<TimeOffRecord> = match user {
        Some(user) => for_user(&records, user).cloned().collect(),
        None => records,
    };
    ctx.renderer.timeoff(out, &shown)
}

fn cmd_timeoff_remove<W: Write>(ctx: &CommandContext<'_>, out: &mut W, id: &str) -> anyhow::Result<()> {
    info!("command timeoff remove");
    let removed = ctx.store.remove(id)?;
    ctx.renderer.timeoff(out, std::slice::from_ref(&removed))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::{CommandContext, dispatch};
    use crate::cli::{Command, TimeoffAddArgs, TimeoffCommand};
    use crate::config::Config;
    use crate::render::Renderer;
    use crate::timeoff::{TimeOffKind, TimeOffStore};

    fn run(ctx: &CommandContext<'_>, command: Command) -> String {
        let mut buf = Vec::new();
        dispatch(ctx, &mut buf, command).expect("dispatch");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn timeoff_feeds_capacity() {
        let temp = tempdir().expect("tempdir");
        let store = TimeOffStore::open(temp.path()).expect("store");
        let cfg = Config::default();
        let renderer = Renderer::plain(true);
        let ctx = CommandContext {
            cfg: &cfg,
            store: &store,
            renderer: &renderer,
            now: Utc
                .with_ymd_and_hms(2024, 7, 1, 9, 0, 0)
                .single()
                .expect("valid now"),
        };

        run(
            &ctx,
            Command::Timeoff(TimeoffCommand::Add(TimeoffAddArgs {
                user: "alice".to_string(),
                start: "today".to_string(),
                end: "2024-07-03".to_string(),
                half_day: false,
                kind: TimeOffKind::Vacation,
                note: Some("beach".to_string()),
            })),
        );
        run(
            &ctx,
            Command::Timeoff(TimeoffCommand::Add(TimeoffAddArgs {
                user: "bob".to_string(),
                start: "2024-07-05".to_string(),
                end: "2024-07-05".to_string(),
                half_day: true,
                kind: TimeOffKind::Personal,
                note: None,
            })),
        );

        let text = run(
            &ctx,
            Command::Capacity {
                start: "2024-07-01".to_string(),
                end: "2024-07-12".to_string(),
                users: vec![],
            },
        );
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["result"]["total_working_days"], 10);
        assert_eq!(value["result"]["impacted_days"], 3.5);
        assert_eq!(value["result"]["available_capacity_percentage"], 65);

        let text = run(
            &ctx,
            Command::Capacity {
                start: "2024-07-01".to_string(),
                end: "2024-07-12".to_string(),
                users: vec!["bob".to_string()],
            },
        );
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["result"]["impacted_days"], 0.5);
    }

    #[test]
    fn is_workday_reports_holidays() {
        let temp = tempdir().expect("tempdir");
        let store = TimeOffStore::open(temp.path()).expect("store");
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("holidays.add".to_string(), "2024-07-04".to_string())])
            .expect("override");
        let renderer = Renderer::plain(false);
        let ctx = CommandContext {
            cfg: &cfg,
            store: &store,
            renderer: &renderer,
            now: Utc::now(),
        };

        assert_eq!(
            run(&ctx, Command::IsWorkday { date: "2024-07-04".to_string() }),
            "no\n"
        );
        assert_eq!(
            run(
                &ctx,
                Command::Workdays {
                    start: "2024-07-01".to_string(),
                    end: "2024-07-07".to_string(),
                    list: false,
                }
            ),
            "4\n"
        );
    }

    #[test]
    fn reversed_range_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = TimeOffStore::open(temp.path()).expect("store");
        let cfg = Config::default();
        let renderer = Renderer::plain(false);
        let ctx = CommandContext {
            cfg: &cfg,
            store: &store,
            renderer: &renderer,
            now: Utc::now(),
        };

        let mut buf = Vec::new();
        let err = dispatch(
            &ctx,
            &mut buf,
            Command::Workdays {
                start: "2024-07-05".to_string(),
                end: "2024-07-01".to_string(),
                list: false,
            },
        )
        .expect_err("reversed");
        assert!(format!("{err:#}").contains("before start date"));
    }
}
