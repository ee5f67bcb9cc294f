use crate::catalog::StatementCatalog;
use crate::error::{EtlError, Result};
use crate::sink::Sink;
use crate::types::{SongArtistRef, SqlValue};
use tracing::trace;

/// How far apart, in seconds, an event's song length and a stored song
/// duration may be and still match. Zero means exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DurationTolerance(f64);

impl DurationTolerance {
    pub const EXACT: DurationTolerance = DurationTolerance(0.0);

    pub fn new(seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EtlError::Config(format!(
                "duration tolerance must be a finite, non-negative number of seconds, got {seconds}"
            )));
        }
        Ok(DurationTolerance(seconds))
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }
}

/// Joins a play event to the song and artist it refers to, using the
/// denormalized (title, artist name, duration) the event carries.
pub struct LookupResolver<'a> {
    catalog: &'a StatementCatalog,
    tolerance: DurationTolerance,
}

impl<'a> LookupResolver<'a> {
    pub fn new(catalog: &'a StatementCatalog, tolerance: DurationTolerance) -> Self {
        LookupResolver { catalog, tolerance }
    }

    /// Find the matching (song_id, artist_id), or `None` when nothing matches.
    ///
    /// An event missing any of the three keys never matches.
    pub fn resolve(
        &self,
        sink: &mut dyn Sink,
        title: Option<&str>,
        artist: Option<&str>,
        duration: Option<f64>,
    ) -> Result<Option<SongArtistRef>> {
        let (Some(title), Some(artist), Some(duration)) = (title, artist, duration) else {
            return Ok(None);
        };

        let params = [
            SqlValue::from(title),
            SqlValue::from(artist),
            SqlValue::Real(duration),
            SqlValue::Real(self.tolerance.seconds()),
        ];

        let Some(row) = sink.fetch_one(&self.catalog.song_select, &params)? else {
            trace!("No song match for {:?} by {:?} ({}s)", title, artist, duration);
            return Ok(None);
        };

        match row.as_slice() {
            [SqlValue::Text(song_id), SqlValue::Text(artist_id), ..] => Ok(Some(SongArtistRef {
                song_id: song_id.clone(),
                artist_id: artist_id.clone(),
            })),
            other => Err(EtlError::SinkMessage(format!(
                "song lookup returned unexpected row {:?}",
                other
            ))),
        }
    }
}
