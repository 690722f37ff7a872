use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::{AUDIO_FEATURES, FEATURE_COUNT};

/// A song's audio features in canonical axis order (see [`AUDIO_FEATURES`]).
/// Loudness is in dB (roughly -60..0) and tempo in BPM; the other seven
/// dimensions are nominally in [0, 1].
pub type FeatureVector = [f64; FEATURE_COUNT];

/// One song row from the dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Song {
    pub track_name: String,
    pub artists: String,
    /// Passthrough columns (album, genre, popularity, ...) kept for display.
    pub extras: BTreeMap<String, String>,
}

/// The loaded dataset: song records plus a row-aligned feature matrix.
/// Built once by [`FeatureStore::load`], never mutated afterward.
#[derive(Debug)]
pub struct FeatureStore {
    songs: Vec<Song>,
    vectors: Vec<FeatureVector>,
    columns: Vec<String>,
}

impl FeatureStore {
    /// Load a dataset from a CSV file with a header row.
    ///
    /// The header must contain `track_name`, `artists`, and all nine
    /// feature columns; the error lists every missing column at once.
    /// Feature cells must parse as finite numbers. Source column order
    /// is irrelevant: vectors are stored in canonical axis order.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader.headers()?.clone();
        let columns: Vec<String> = headers.iter().map(str::to_string).collect();

        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut missing: Vec<String> = Vec::new();
        for required in ["track_name", "artists"].into_iter().chain(AUDIO_FEATURES) {
            if position(required).is_none() {
                missing.push(required.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(EngineError::Schema { missing });
        }

        let column = |name: &'static str| -> Result<usize> {
            position(name).ok_or_else(|| EngineError::Schema {
                missing: vec![name.to_string()],
            })
        };
        let name_col = column("track_name")?;
        let artists_col = column("artists")?;
        let mut feature_cols = [0usize; FEATURE_COUNT];
        for (dim, feature) in AUDIO_FEATURES.iter().enumerate() {
            feature_cols[dim] = column(feature)?;
        }

        let mut songs = Vec::new();
        let mut vectors = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());

            let mut features = [0.0_f64; FEATURE_COUNT];
            for (dim, &col) in feature_cols.iter().enumerate() {
                let raw = record.get(col).unwrap_or("");
                let value: f64 = raw.trim().parse().map_err(|_| EngineError::InvalidValue {
                    line,
                    column: AUDIO_FEATURES[dim],
                    value: raw.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(EngineError::InvalidValue {
                        line,
                        column: AUDIO_FEATURES[dim],
                        value: raw.to_string(),
                    });
                }
                features[dim] = value;
            }

            let extras: BTreeMap<String, String> = headers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != name_col && *i != artists_col && !feature_cols.contains(i))
                .map(|(i, header)| (header.to_string(), record.get(i).unwrap_or("").to_string()))
                .collect();

            songs.push(Song {
                track_name: record.get(name_col).unwrap_or("").to_string(),
                artists: record.get(artists_col).unwrap_or("").to_string(),
                extras,
            });
            vectors.push(features);
        }

        Ok(Self {
            songs,
            vectors,
            columns,
        })
    }

    /// Build a store from already-parsed rows (synthetic datasets, tests).
    pub fn from_parts(rows: Vec<(Song, FeatureVector)>) -> Self {
        let (songs, vectors) = rows.into_iter().unzip();
        let columns = ["track_name", "artists"]
            .into_iter()
            .chain(AUDIO_FEATURES)
            .map(str::to_string)
            .collect();
        Self {
            songs,
            vectors,
            columns,
        }
    }

    /// Number of songs loaded.
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Column names from the dataset header, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Feature matrix, row-aligned with [`FeatureStore::songs`].
    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    /// Record at a zero-based row index.
    pub fn row_at(&self, index: usize) -> Result<&Song> {
        self.songs.get(index).ok_or(EngineError::RowOutOfBounds {
            index,
            len: self.songs.len(),
        })
    }

    /// Feature vector at a zero-based row index, in canonical axis order.
    pub fn features_of(&self, index: usize) -> Result<&FeatureVector> {
        self.vectors.get(index).ok_or(EngineError::RowOutOfBounds {
            index,
            len: self.vectors.len(),
        })
    }

    /// First row matching the identity, case-insensitively.
    /// `artist` narrows the match; `None` matches on track name alone.
    pub fn find_by_identity(&self, track_name: &str, artist: Option<&str>) -> Option<usize> {
        let name = track_name.to_lowercase();
        let artist = artist.map(str::to_lowercase);
        self.songs.iter().position(|s| {
            s.track_name.to_lowercase() == name
                && artist
                    .as_deref()
                    .is_none_or(|a| s.artists.to_lowercase() == a)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CANONICAL_HEADER: &str = "track_name,artists,acousticness,danceability,energy,\
instrumentalness,liveness,loudness,speechiness,tempo,valence";

    fn dataset(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn make_song(track_name: &str, artists: &str) -> Song {
        Song {
            track_name: track_name.to_string(),
            artists: artists.to_string(),
            extras: BTreeMap::new(),
        }
    }

    #[test]
    fn test_load_canonical_order() {
        // Columns deliberately scrambled, with passthrough columns mixed in
        let csv = "\
track_id,tempo,track_name,valence,speechiness,artists,loudness,liveness,instrumentalness,energy,danceability,acousticness,track_genre
t1,120.5,Ripple,0.9,0.03,Grateful Dead,-18.2,0.12,0.6,0.3,0.5,0.8,folk
t2,98.0,Thrasher,0.4,0.04,Neil Young,-15.0,0.2,0.1,0.45,0.41,0.7,rock
";
        let file = dataset(csv);
        let store = FeatureStore::load(file.path()).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.columns().len(), 13);
        assert_eq!(store.columns()[0], "track_id");

        let v = store.features_of(0).unwrap();
        assert_eq!(v, &[0.8, 0.5, 0.3, 0.6, 0.12, -18.2, 0.03, 120.5, 0.9]);

        let song = store.row_at(0).unwrap();
        assert_eq!(song.track_name, "Ripple");
        assert_eq!(song.artists, "Grateful Dead");
        assert_eq!(song.extras.get("track_genre").map(String::as_str), Some("folk"));
        assert_eq!(song.extras.get("track_id").map(String::as_str), Some("t1"));
        assert!(!song.extras.contains_key("tempo"));
    }

    #[test]
    fn test_missing_columns_all_listed() {
        let file = dataset("track_name,artists,acousticness,danceability\nRipple,Grateful Dead,0.8,0.5\n");
        let err = FeatureStore::load(file.path()).unwrap_err();
        match err {
            EngineError::Schema { missing } => {
                assert_eq!(
                    missing,
                    vec![
                        "energy",
                        "instrumentalness",
                        "liveness",
                        "loudness",
                        "speechiness",
                        "tempo",
                        "valence"
                    ]
                );
            }
            other => panic!("expected Schema, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_value_names_line_and_column() {
        let csv = format!("{CANONICAL_HEADER}\nRipple,Grateful Dead,0.8,0.5,0.3,0.6,0.12,-18.2,0.03,fast,0.9\n");
        let file = dataset(&csv);
        let err = FeatureStore::load(file.path()).unwrap_err();
        match err {
            EngineError::InvalidValue { line, column, value } => {
                assert_eq!(line, 2);
                assert_eq!(column, "tempo");
                assert_eq!(value, "fast");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_value_rejected() {
        // f64 parsing accepts "NaN", so finiteness needs its own check
        let csv = format!("{CANONICAL_HEADER}\nRipple,Grateful Dead,0.8,0.5,0.3,0.6,0.12,NaN,0.03,120.5,0.9\n");
        let file = dataset(&csv);
        let err = FeatureStore::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidValue { column: "loudness", .. }
        ));
    }

    #[test]
    fn test_header_only_dataset_loads_empty() {
        let file = dataset(&format!("{CANONICAL_HEADER}\n"));
        let store = FeatureStore::load(file.path()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.columns().len(), 11);
    }

    #[test]
    fn test_find_by_identity_case_and_artist() {
        let store = FeatureStore::from_parts(vec![
            (make_song("Ripple", "Grateful Dead"), [0.0; FEATURE_COUNT]),
            (make_song("Hurt", "Nine Inch Nails"), [0.0; FEATURE_COUNT]),
            (make_song("Hurt", "Johnny Cash"), [0.0; FEATURE_COUNT]),
        ]);

        assert_eq!(store.find_by_identity("ripple", None), Some(0));
        assert_eq!(store.find_by_identity("RIPPLE", Some("grateful dead")), Some(0));
        // First match wins when the artist is omitted
        assert_eq!(store.find_by_identity("hurt", None), Some(1));
        assert_eq!(store.find_by_identity("hurt", Some("Johnny Cash")), Some(2));
        assert_eq!(store.find_by_identity("hurt", Some("nobody")), None);
        assert_eq!(store.find_by_identity("missing", None), None);
    }

    #[test]
    fn test_row_at_out_of_bounds() {
        let store = FeatureStore::from_parts(vec![(
            make_song("Ripple", "Grateful Dead"),
            [0.0; FEATURE_COUNT],
        )]);
        assert!(matches!(
            store.row_at(5),
            Err(EngineError::RowOutOfBounds { index: 5, len: 1 })
        ));
        assert!(store.features_of(0).is_ok());
        assert!(matches!(
            store.features_of(1),
            Err(EngineError::RowOutOfBounds { index: 1, len: 1 })
        ));
    }
}
