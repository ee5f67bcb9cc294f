//! Statement catalog
//!
//! Every SQL statement the pipeline runs lives here and is handed to the
//! driver, transformers and lookup explicitly. Insert statements take their
//! parameters in the order produced by [`Row::params`](crate::types::Row::params).

use crate::types::Table;

/// SQL flavour of a sink: placeholder syntax and column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `n`
    fn param(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{n}"),
            Dialect::Postgres => format!("${n}"),
        }
    }

    fn params(&self, count: usize) -> String {
        (1..=count)
            .map(|n| self.param(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn real(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "REAL",
            Dialect::Postgres => "DOUBLE PRECISION",
        }
    }

    fn big_integer(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres => "BIGINT",
        }
    }

    fn surrogate_key(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Postgres => "BIGSERIAL PRIMARY KEY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatementCatalog {
    pub dialect: Dialect,

    pub song_insert: String,
    pub artist_insert: String,
    pub time_insert: String,
    pub user_insert: String,
    pub songplay_insert: String,

    /// Parameters: title, artist name, duration, tolerance.
    /// Returns (song_id, artist_id) rows, best match first.
    pub song_select: String,

    pub create_tables: Vec<String>,
    pub drop_tables: Vec<String>,
}

impl StatementCatalog {
    pub fn sqlite() -> Self {
        Self::for_dialect(Dialect::Sqlite)
    }

    pub fn postgres() -> Self {
        Self::for_dialect(Dialect::Postgres)
    }

    /// Dimension inserts ignore conflicts and user inserts upsert, so a rerun
    /// over the same files leaves every table but `songplays` unchanged.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let d = dialect;
        let (p1, p2, p3, p4) = (d.param(1), d.param(2), d.param(3), d.param(4));

        StatementCatalog {
            dialect,
            song_insert: format!(
                "INSERT INTO songs (song_id, title, artist_id, year, duration) \
                 VALUES ({}) ON CONFLICT (song_id) DO NOTHING",
                d.params(5)
            ),
            artist_insert: format!(
                "INSERT INTO artists (artist_id, name, location, latitude, longitude) \
                 VALUES ({}) ON CONFLICT (artist_id) DO NOTHING",
                d.params(5)
            ),
            time_insert: format!(
                "INSERT INTO time (start_time, hour, day, week, month, year, weekday) \
                 VALUES ({}) ON CONFLICT (start_time) DO NOTHING",
                d.params(7)
            ),
            user_insert: format!(
                "INSERT INTO users (user_id, first_name, last_name, gender, level) \
                 VALUES ({}) \
                 ON CONFLICT (user_id) DO UPDATE SET \
                 first_name = excluded.first_name, \
                 last_name = excluded.last_name, \
                 gender = excluded.gender, \
                 level = excluded.level",
                d.params(5)
            ),
            songplay_insert: format!(
                "INSERT INTO songplays \
                 (start_time, user_id, level, song_id, artist_id, \
                 session_id, location, user_agent) \
                 VALUES ({})",
                d.params(8)
            ),
            song_select: format!(
                "SELECT s.song_id, a.artist_id \
                 FROM songs s JOIN artists a ON s.artist_id = a.artist_id \
                 WHERE s.title = {p1} AND a.name = {p2} AND abs(s.duration - {p3}) <= {p4} \
                 ORDER BY abs(s.duration - {p3}), s.song_id \
                 LIMIT 1"
            ),
            create_tables: vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS songs (\
                     song_id TEXT PRIMARY KEY, \
                     title TEXT NOT NULL, \
                     artist_id TEXT NOT NULL, \
                     year INTEGER NOT NULL, \
                     duration {real} NOT NULL)",
                    real = d.real()
                ),
                format!(
                    "CREATE TABLE IF NOT EXISTS artists (\
                     artist_id TEXT PRIMARY KEY, \
                     name TEXT NOT NULL, \
                     location TEXT, \
                     latitude {real}, \
                     longitude {real})",
                    real = d.real()
                ),
                format!(
                    "CREATE TABLE IF NOT EXISTS time (\
                     start_time {big} PRIMARY KEY, \
                     hour INTEGER NOT NULL, \
                     day INTEGER NOT NULL, \
                     week INTEGER NOT NULL, \
                     month INTEGER NOT NULL, \
                     year INTEGER NOT NULL, \
                     weekday INTEGER NOT NULL)",
                    big = d.big_integer()
                ),
                "CREATE TABLE IF NOT EXISTS users (\
                 user_id TEXT PRIMARY KEY, \
                 first_name TEXT NOT NULL, \
                 last_name TEXT, \
                 gender TEXT, \
                 level TEXT NOT NULL)"
                    .to_string(),
                format!(
                    "CREATE TABLE IF NOT EXISTS songplays (\
                     songplay_id {key}, \
                     start_time {big} NOT NULL, \
                     user_id TEXT NOT NULL, \
                     level TEXT NOT NULL, \
                     song_id TEXT, \
                     artist_id TEXT, \
                     session_id {big} NOT NULL, \
                     location TEXT, \
                     user_agent TEXT)",
                    key = d.surrogate_key(),
                    big = d.big_integer()
                ),
            ],
            drop_tables: Table::ALL
                .iter()
                .map(|t| format!("DROP TABLE IF EXISTS {}", t.name()))
                .collect(),
        }
    }

    /// The insert statement for rows of `table`
    pub fn insert_for(&self, table: Table) -> &str {
        match table {
            Table::Songs => &self.song_insert,
            Table::Artists => &self.artist_insert,
            Table::Time => &self.time_insert,
            Table::Users => &self.user_insert,
            Table::Songplays => &self.songplay_insert,
        }
    }
}

impl Default for StatementCatalog {
    fn default() -> Self {
        StatementCatalog::sqlite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_follow_dialect() {
        let sqlite = StatementCatalog::sqlite();
        let postgres = StatementCatalog::postgres();

        assert!(sqlite.songplay_insert.contains("?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8"));
        assert!(postgres.songplay_insert.contains("$1, $2, $3, $4, $5, $6, $7, $8"));
        assert!(!postgres.song_select.contains('?'));
        assert!(postgres.song_select.contains("abs(s.duration - $3) <= $4"));
        assert!(postgres.user_insert.contains("ON CONFLICT (user_id) DO UPDATE"));
    }

    #[test]
    fn test_postgres_tables_use_native_types() {
        let catalog = StatementCatalog::postgres();
        let ddl = catalog.create_tables.join("\n");

        assert!(ddl.contains("songplay_id BIGSERIAL PRIMARY KEY"));
        assert!(ddl.contains("duration DOUBLE PRECISION NOT NULL"));
        assert!(!ddl.contains("AUTOINCREMENT"));
        assert_eq!(catalog.create_tables.len(), Table::ALL.len());
        assert_eq!(catalog.drop_tables.len(), Table::ALL.len());
    }
}
