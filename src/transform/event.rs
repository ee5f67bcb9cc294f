//! Event-log transformation
//!
//! A log file holds one JSON event per line. Only `NextSong` events are play
//! events; everything else (navigation, login, settings) is dropped before any
//! row is built. From the retained events we derive, in insert order:
//!
//! 1. one `time` row per event (duplicates are left for the sink to absorb),
//! 2. one `users` row per distinct user with a first name,
//! 3. one `songplays` row per event, with song/artist resolved by lookup.

use super::FileTransform;
use crate::catalog::StatementCatalog;
use crate::error::{EtlError, Result, SourceLocation};
use crate::lookup::{DurationTolerance, LookupResolver};
use crate::sink::Sink;
use crate::types::{Level, Row, SongplayRow, TimeRow, UserRow};
use chrono::{DateTime, Datelike, Timelike};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const PLAY_PAGE: &str = "NextSong";

/// A retained play event. Fields the rows need are required; the rest of the
/// event is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayEvent {
    ts: i64,
    #[serde(deserialize_with = "string_or_number")]
    user_id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<String>,
    level: Level,
    song: Option<String>,
    artist: Option<String>,
    length: Option<f64>,
    session_id: i64,
    location: Option<String>,
    user_agent: Option<String>,
}

/// Log files write `userId` as a string, older dumps as a number
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(i64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s,
        Repr::Number(n) => n.to_string(),
    })
}

/// Break an epoch-millisecond timestamp into calendar fields, in UTC.
///
/// Returns `None` when the timestamp is outside the representable range.
pub fn decompose_timestamp(ts_ms: i64) -> Option<TimeRow> {
    let dt = DateTime::from_timestamp_millis(ts_ms)?.naive_utc();
    Some(TimeRow {
        start_time: ts_ms,
        hour: dt.hour(),
        day: dt.day(),
        week: dt.iso_week().week(),
        month: dt.month(),
        year: dt.year(),
        weekday: dt.weekday().num_days_from_monday(),
    })
}

/// The rows derived from one log file, each in insert order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRows {
    pub times: Vec<TimeRow>,
    pub users: Vec<UserRow>,
    pub songplays: Vec<SongplayRow>,
}

impl EventRows {
    /// Flatten into one sequence: time rows, then users, then songplays
    pub fn into_rows(self) -> Vec<Row> {
        let capacity = self.times.len() + self.users.len() + self.songplays.len();
        let mut rows = Vec::with_capacity(capacity);
        rows.extend(self.times.into_iter().map(Row::Time));
        rows.extend(self.users.into_iter().map(Row::User));
        rows.extend(self.songplays.into_iter().map(Row::Songplay));
        rows
    }
}

/// Reads an event-log file into time, user and songplay rows
#[derive(Debug, Default, Clone, Copy)]
pub struct EventTransformer {
    tolerance: DurationTolerance,
}

impl EventTransformer {
    pub fn new(tolerance: DurationTolerance) -> Self {
        EventTransformer { tolerance }
    }

    pub fn extract(
        &self,
        path: &Path,
        sink: &mut dyn Sink,
        catalog: &StatementCatalog,
    ) -> Result<EventRows> {
        let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;
        let events = read_play_events(path, &content)?;
        debug!("{} play events in {}", events.len(), path.display());

        let times = events
            .iter()
            .map(|(line, event)| {
                decompose_timestamp(event.ts).ok_or_else(|| {
                    EtlError::parse(
                        SourceLocation::line(path, *line),
                        format!("timestamp {} out of range", event.ts),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let users = collect_users(events.iter().map(|(_, event)| event));

        let resolver = LookupResolver::new(catalog, self.tolerance);
        let mut songplays = Vec::with_capacity(events.len());
        for (_, event) in events {
            let song = resolver.resolve(
                sink,
                event.song.as_deref(),
                event.artist.as_deref(),
                event.length,
            )?;
            songplays.push(SongplayRow {
                start_time: event.ts,
                user_id: event.user_id,
                level: event.level,
                song,
                session_id: event.session_id,
                location: event.location,
                user_agent: event.user_agent,
            });
        }

        Ok(EventRows {
            times,
            users,
            songplays,
        })
    }
}

impl FileTransform for EventTransformer {
    fn name(&self) -> &'static str {
        "log"
    }

    fn transform(
        &self,
        path: &Path,
        sink: &mut dyn Sink,
        catalog: &StatementCatalog,
    ) -> Result<Vec<Row>> {
        Ok(self.extract(path, sink, catalog)?.into_rows())
    }
}

/// Parse every line, keeping only play events with their 1-based line numbers.
///
/// Every line must be valid JSON; only play events must carry the fields the
/// rows need.
fn read_play_events(path: &Path, content: &str) -> Result<Vec<(usize, PlayEvent)>> {
    let mut events = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line)
            .map_err(|e| EtlError::parse(SourceLocation::line(path, line_no), e))?;

        if value.get("page").and_then(Value::as_str) != Some(PLAY_PAGE) {
            continue;
        }

        let event: PlayEvent = serde_json::from_value(value)
            .map_err(|e| EtlError::parse(SourceLocation::line(path, line_no), e))?;
        events.push((line_no, event));
    }

    Ok(events)
}

/// One row per user id that has a first name on at least one event.
///
/// Rows keep the order of each user's first named appearance; the values come
/// from that user's last named event in the file.
fn collect_users<'a>(events: impl Iterator<Item = &'a PlayEvent>) -> Vec<UserRow> {
    let mut users: Vec<UserRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for event in events {
        let Some(first_name) = &event.first_name else {
            continue;
        };

        let row = UserRow {
            user_id: event.user_id.clone(),
            first_name: first_name.clone(),
            last_name: event.last_name.clone(),
            gender: event.gender.clone(),
            level: event.level,
        };

        match index.get(&event.user_id) {
            Some(&slot) => users[slot] = row,
            None => {
                index.insert(event.user_id.clone(), users.len());
                users.push(row);
            }
        }
    }

    users
}
