use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar::DateRange;
use crate::capacity::TimeOffEntry;

const TIMEOFF_FILE_NAME: &str = "timeoff.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOffKind {
    #[default]
    Vacation,
    Holiday,
    Sick,
    Personal,
}

impl fmt::Display for TimeOffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vacation => "vacation",
            Self::Holiday => "holiday",
            Self::Sick => "sick",
            Self::Personal => "personal",
        };
        f.write_str(name)
    }
}

impl FromStr for TimeOffKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vacation" | "pto" => Ok(Self::Vacation),
            "holiday" => Ok(Self::Holiday),
            "sick" => Ok(Self::Sick),
            "personal" => Ok(Self::Personal),
            other => Err(anyhow!("unknown time-off kind: {other}")),
        }
    }
}

/// A stored time-off entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffRecord {
    pub id: Uuid,

    #[serde(flatten)]
    pub entry: TimeOffEntry,

    #[serde(default)]
    pub kind: TimeOffKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TimeOffRecord {
    pub fn new(entry: TimeOffEntry, kind: TimeOffKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry,
            kind,
            note: None,
        }
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

#[derive(Debug)]
pub struct TimeOffStore {
    pub data_dir: PathBuf,
    pub entries_path: PathBuf,
}

impl TimeOffStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let entries_path = data_dir.join(TIMEOFF_FILE_NAME);
        if !entries_path.exists() {
            fs::write(&entries_path, "")
                .with_context(|| format!("failed to create {}", entries_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            entries = %entries_path.display(),
            "opened time-off store"
        );

        Ok(Self {
            data_dir,
            entries_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Vec<TimeOffRecord>> {
        load_jsonl(&self.entries_path).context("failed to load timeoff.jsonl")
    }

    #[tracing::instrument(skip(self, records))]
    pub fn save(&self, records: &[TimeOffRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.entries_path, records).context("failed to save timeoff.jsonl")
    }

    /// Stores `record`, rejecting spans that end before they start.
    #[tracing::instrument(skip(self, record), fields(id = %record.id, user = %record.entry.user_id))]
    pub fn add(&self, record: TimeOffRecord) -> anyhow::Result<Vec<TimeOffRecord>> {
        DateRange::new(record.entry.start_date, record.entry.end_date)?;

        let mut records = self.load()?;
        records.push(record);
        sort_records(&mut records);
        self.save(&records)?;
        Ok(records)
    }

    /// Removes the single record whose id starts with `prefix`.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, prefix: &str) -> anyhow::Result<TimeOffRecord> {
        let mut records = self.load()?;
        let needle = prefix.trim().to_ascii_lowercase().replace('-', "");
        if needle.is_empty() {
            return Err(anyhow!("time-off id prefix cannot be empty"));
        }

        let matches: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.id.simple().to_string().starts_with(&needle))
            .map(|(idx, _)| idx)
            .collect();

        let idx = match matches.as_slice() {
            [idx] => *idx,
            [] => return Err(anyhow!("no time-off entry matches id {prefix}")),
            _ => {
                return Err(anyhow!(
                    "id prefix {prefix} is ambiguous ({} entries match)",
                    matches.len()
                ));
            }
        };

        let removed = records.remove(idx);
        self.save(&records)?;
        info!(id = %removed.id, "removed time-off entry");
        Ok(removed)
    }
}

/// Records belonging to `user`.
pub fn for_user<'a>(records: &'a [TimeOffRecord], user: &'a str) -> impl Iterator<Item = &'a TimeOffRecord> {
    records.iter().filter(move |r| r.entry.user_id == user)
}

/// Records sharing at least one calendar day with `range`.
pub fn overlapping<'a>(
    records: &'a [TimeOffRecord],
    range: &'a DateRange,
) -> impl Iterator<Item = &'a TimeOffRecord> {
    records
        .iter()
        .filter(move |r| range.overlap(r.entry.start_date, r.entry.end_date).is_some())
}

fn sort_records(records: &mut [TimeOffRecord]) {
    records.sort_by(|a, b| {
        a.entry
            .start_date
            .cmp(&b.entry.start_date)
            .then_with(|| a.entry.user_id.cmp(&b.entry.user_id))
    });
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<TimeOffRecord>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: TimeOffRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded time-off entries from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic(path: &Path, records: &[TimeOffRecord]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
