use serde::Deserialize;
use std::fmt;

/// The five tables the ETL job loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Songs,
    Artists,
    Time,
    Users,
    Songplays,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Songs,
        Table::Artists,
        Table::Time,
        Table::Users,
        Table::Songplays,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Time => "time",
            Table::Users => "users",
            Table::Songplays => "songplays",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single statement parameter, or a single column read back from the sink
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Subscription tier of a user at the time of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Free,
    Paid,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Free => "free",
            Level::Paid => "paid",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `songs` table
#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    /// 0 when the year is unknown
    pub year: i32,
    /// Seconds
    pub duration: f64,
}

/// One row of the `artists` table
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One row of the `time` table: a play timestamp broken into calendar fields.
///
/// All fields are derived from `start_time` (epoch milliseconds, UTC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRow {
    pub start_time: i64,
    pub hour: u32,
    pub day: u32,
    /// ISO 8601 week number
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// Monday = 0
    pub weekday: u32,
}

/// One row of the `users` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub user_id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Level,
}

/// The (song_id, artist_id) pair a play event resolved to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SongArtistRef {
    pub song_id: String,
    pub artist_id: String,
}

/// One row of the `songplays` table.
///
/// `song` is `None` when the lookup found no match, which keeps song_id and
/// artist_id null together.
#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRow {
    pub start_time: i64,
    pub user_id: String,
    pub level: Level,
    pub song: Option<SongArtistRef>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// A transformed row, tagged with the table it belongs to
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Song(SongRow),
    Artist(ArtistRow),
    Time(TimeRow),
    User(UserRow),
    Songplay(SongplayRow),
}

impl Row {
    pub fn table(&self) -> Table {
        match self {
            Row::Song(_) => Table::Songs,
            Row::Artist(_) => Table::Artists,
            Row::Time(_) => Table::Time,
            Row::User(_) => Table::Users,
            Row::Songplay(_) => Table::Songplays,
        }
    }

    /// Statement parameters, in the column order of the table's insert statement
    pub fn params(&self) -> Vec<SqlValue> {
        match self {
            Row::Song(r) => vec![
                r.song_id.as_str().into(),
                r.title.as_str().into(),
                r.artist_id.as_str().into(),
                r.year.into(),
                r.duration.into(),
            ],
            Row::Artist(r) => vec![
                r.artist_id.as_str().into(),
                r.name.as_str().into(),
                r.location.as_deref().into(),
                r.latitude.into(),
                r.longitude.into(),
            ],
            Row::Time(r) => vec![
                r.start_time.into(),
                r.hour.into(),
                r.day.into(),
                r.week.into(),
                r.month.into(),
                r.year.into(),
                r.weekday.into(),
            ],
            Row::User(r) => vec![
                r.user_id.as_str().into(),
                r.first_name.as_str().into(),
                r.last_name.as_deref().into(),
                r.gender.as_deref().into(),
                r.level.as_str().into(),
            ],
            Row::Songplay(r) => vec![
                r.start_time.into(),
                r.user_id.as_str().into(),
                r.level.as_str().into(),
                r.song.as_ref().map(|s| s.song_id.as_str()).into(),
                r.song.as_ref().map(|s| s.artist_id.as_str()).into(),
                r.session_id.into(),
                r.location.as_deref().into(),
                r.user_agent.as_deref().into(),
            ],
        }
    }
}
