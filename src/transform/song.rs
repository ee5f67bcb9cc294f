use super::FileTransform;
use crate::catalog::StatementCatalog;
use crate::error::{EtlError, Result, SourceLocation};
use crate::sink::Sink;
use crate::types::{ArtistRow, Row, SongRow};
use serde::Deserialize;
use std::path::Path;

/// Raw song-metadata record, one per file
#[derive(Debug, Deserialize)]
struct SongRecord {
    song_id: String,
    title: String,
    artist_id: String,
    year: i32,
    duration: f64,
    artist_name: String,
    artist_location: Option<String>,
    artist_latitude: Option<f64>,
    artist_longitude: Option<f64>,
}

impl SongRecord {
    fn into_rows(self) -> (SongRow, ArtistRow) {
        let song = SongRow {
            song_id: self.song_id,
            title: self.title,
            artist_id: self.artist_id.clone(),
            year: self.year,
            duration: self.duration,
        };
        let artist = ArtistRow {
            artist_id: self.artist_id,
            name: self.artist_name,
            location: self.artist_location,
            latitude: self.artist_latitude,
            longitude: self.artist_longitude,
        };
        (song, artist)
    }
}

/// Reads a song-metadata file into one song row and one artist row
#[derive(Debug, Default, Clone, Copy)]
pub struct SongTransformer;

impl SongTransformer {
    pub fn extract(&self, path: &Path) -> Result<(SongRow, ArtistRow)> {
        let mut content = std::fs::read(path).map_err(|e| EtlError::io(path, e))?;
        Self::parse(&mut content).map_err(|e| EtlError::parse(SourceLocation::file(path), e))
    }

    /// Parse the record with simd-json; the buffer is used as scratch space
    fn parse(content: &mut [u8]) -> std::result::Result<(SongRow, ArtistRow), simd_json::Error> {
        let record: SongRecord = simd_json::serde::from_slice(content)?;
        Ok(record.into_rows())
    }
}

impl FileTransform for SongTransformer {
    fn name(&self) -> &'static str {
        "song"
    }

    fn transform(
        &self,
        path: &Path,
        _sink: &mut dyn Sink,
        _catalog: &StatementCatalog,
    ) -> Result<Vec<Row>> {
        let (song, artist) = self.extract(path)?;
        Ok(vec![Row::Song(song), Row::Artist(artist)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::RecordingSink;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_song(dir: &TempDir, value: &serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("TRAAAAW128F429D538.json");
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn song_json() -> serde_json::Value {
        json!({
            "num_songs": 1,
            "artist_id": "ARD7TVE1187B99BFB1",
            "artist_latitude": null,
            "artist_longitude": null,
            "artist_location": "California - LA",
            "artist_name": "Casual",
            "song_id": "SOMZWCG12A8C13C480",
            "title": "I Didn't Mean To",
            "duration": 218.93179,
            "year": 0
        })
    }

    #[test]
    fn test_song_then_artist() {
        let dir = TempDir::new().unwrap();
        let path = write_song(&dir, &song_json());
        let mut sink = RecordingSink::default();

        let rows = SongTransformer
            .transform(&path, &mut sink, &StatementCatalog::sqlite())
            .unwrap();

        assert_eq!(rows.len(), 2);
        let Row::Song(song) = &rows[0] else { panic!("expected song row") };
        let Row::Artist(artist) = &rows[1] else { panic!("expected artist row") };

        assert_eq!(song.song_id, "SOMZWCG12A8C13C480");
        assert_eq!(song.title, "I Didn't Mean To");
        assert_eq!(song.year, 0);
        assert_eq!(song.duration, 218.93179);
        assert_eq!(song.artist_id, artist.artist_id);
        assert_eq!(artist.name, "Casual");
        assert_eq!(artist.location.as_deref(), Some("California - LA"));
        assert_eq!(artist.latitude, None);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn test_transform_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = write_song(&dir, &song_json());

        let first = SongTransformer.extract(&path).unwrap();
        let second = SongTransformer.extract(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            Row::Song(first.0).params(),
            Row::Song(second.0).params()
        );
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let mut value = song_json();
        value.as_object_mut().unwrap().remove("duration");
        let path = write_song(&dir, &value);

        let err = SongTransformer.extract(&path).unwrap_err();

        assert!(matches!(err, EtlError::Parse { .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"song_id\": ").unwrap();

        let err = SongTransformer.extract(&path).unwrap_err();

        match err {
            EtlError::Parse { location, .. } => {
                assert_eq!(location.path, path);
                assert_eq!(location.line, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
