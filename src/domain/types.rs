use crate::domain::{duration_between_millis, duration_from_micros};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncAction {
    Query,
    Start,
    Stop,
}

impl SyncAction {
    pub fn path(self) -> &'static str {
        match self {
            Self::Query => "time",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Body of `/time`, `/start` and `/stop`. `time` is in microseconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionQueryResult {
    pub time: u64,
    pub running: bool,
}

impl SessionQueryResult {
    pub fn elapsed(&self) -> Duration {
        duration_from_micros(self.time)
    }
}

/// One entry of `/sessions`: epoch milliseconds, `end == 0` while still open.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start: i64,
    pub end: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkSession {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl WorkSession {
    pub fn from_record(record: SessionRecord) -> Option<Self> {
        let start = Utc.timestamp_millis_opt(record.start).single()?;
        let end = if record.end == 0 {
            None
        } else {
            Some(Utc.timestamp_millis_opt(record.end).single()?)
        };
        Some(Self { start, end })
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// End used for layout: open sessions end at `now`, and an end before the
    /// start is pulled up to the start.
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now).max(self.start)
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        duration_between_millis(self.start.timestamp_millis(), self.end_or(now).timestamp_millis())
    }
}

/// Immutable snapshot of one `/sessions` response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionList {
    pub sessions: Vec<WorkSession>,
    pub skipped: usize,
}

impl SessionList {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        let mut sessions = Vec::with_capacity(records.len());
        let mut skipped = 0usize;
        for record in records {
            match WorkSession::from_record(*record) {
                Some(session) => sessions.push(session),
                None => skipped += 1,
            }
        }
        Self { sessions, skipped }
    }


    pub fn total(&self, now: DateTime<Utc>) -> Duration {
        self.sessions
            .iter()
            .map(|session| session.duration(now))
            .sum()
    }
}

/// One entry of `/stat`: a logical day and the time tracked on it (microseconds).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DayStatRecord {
    pub date: String,
    pub time: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DayStat {
    pub date: NaiveDate,
    pub elapsed: Duration,
}

impl DayStat {
    pub fn from_record(record: &DayStatRecord) -> Option<Self> {
        let date = crate::domain::parse_date_segment(record.date.trim())?;
        Some(Self {
            date,
            elapsed: duration_from_micros(record.time),
        })
    }
}

pub fn day_stats_from_records(records: &[DayStatRecord]) -> Vec<DayStat> {
    let mut stats: Vec<DayStat> = records.iter().filter_map(DayStat::from_record).collect();
    stats.sort_by_key(|stat| stat.date);
    stats
}
