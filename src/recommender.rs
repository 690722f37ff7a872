use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use serde::Serialize;

use crate::AUDIO_FEATURES;
use crate::error::{EngineError, Result};
use crate::playlist;
use crate::search::TextSearchIndex;
use crate::similarity::{self, DEFAULT_BATCH_SIZE, FeatureScaling, Neighbor};
use crate::store::{FeatureStore, FeatureVector, Song};

/// Most neighbors ever offered to the playlist sampler.
const CANDIDATE_POOL_CAP: usize = 50;

/// A ranked song with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation<'a> {
    pub index: usize,
    pub song: &'a Song,
    pub score: f64,
}

/// One entry of a generated playlist.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistEntry<'a> {
    pub position: usize,
    pub song: &'a Song,
    /// Similarity to the seed; `None` for the seed itself.
    pub score: Option<f64>,
    pub is_seed: bool,
}

/// The engine facade: owns the loaded store, its search index, and the
/// ranking knobs. Construct one per dataset and pass it by reference;
/// there is no process-global instance.
pub struct Recommender {
    store: FeatureStore,
    index: TextSearchIndex,
    scaling: Option<FeatureScaling>,
    scaled: Option<Vec<FeatureVector>>,
    batch_size: usize,
}

impl Recommender {
    /// Load the dataset at `path` and build the search index over it.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(FeatureStore::load(path)?))
    }

    /// Wrap an already-built store (synthetic datasets, tests).
    pub fn new(store: FeatureStore) -> Self {
        let index = TextSearchIndex::build(&store);
        Self {
            store,
            index,
            scaling: None,
            scaled: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows scored per batch during ranking. Values below 1 act as 1.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// Toggle z-scoring of the feature matrix before ranking. Off by
    /// default: raw features keep their mixed scales, so loudness and
    /// tempo dominate scores exactly as the unnormalized data implies.
    /// Turning it on refits the scaling and rescales the matrix once.
    pub fn set_normalization(&mut self, enabled: bool) {
        if enabled {
            let scaling = FeatureScaling::fit(self.store.vectors());
            self.scaled = Some(scaling.apply_all(self.store.vectors()));
            self.scaling = Some(scaling);
        } else {
            self.scaling = None;
            self.scaled = None;
        }
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    /// Number of songs in the store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn row_at(&self, index: usize) -> Result<&Song> {
        self.store.row_at(index)
    }

    pub fn features_of(&self, index: usize) -> Result<&FeatureVector> {
        self.store.features_of(index)
    }

    pub fn find_by_identity(&self, track_name: &str, artist: Option<&str>) -> Option<usize> {
        self.store.find_by_identity(track_name, artist)
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.store.is_empty() {
            Err(EngineError::EmptyStore)
        } else {
            Ok(())
        }
    }

    fn active_vectors(&self) -> &[FeatureVector] {
        self.scaled.as_deref().unwrap_or(self.store.vectors())
    }

    fn scale_query(&self, query: &FeatureVector) -> FeatureVector {
        match &self.scaling {
            Some(s) => s.apply(query),
            None => *query,
        }
    }

    /// Substring search over "track_name artists", in store order.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(usize, &Song)>> {
        self.ensure_loaded()?;
        Ok(self
            .index
            .search(query, limit)
            .into_iter()
            .map(|i| (i, &self.store.songs()[i]))
            .collect())
    }

    /// Rank every song against an arbitrary query vector (canonical
    /// axis order), keeping the best `n`.
    pub fn rank_vector(&self, query: &FeatureVector, n: usize) -> Result<Vec<Recommendation<'_>>> {
        self.ensure_loaded()?;
        let query = self.scale_query(query);
        let mut neighbors =
            similarity::rank_against(self.active_vectors(), &query, None, self.batch_size);
        neighbors.truncate(n);
        Ok(self.to_recommendations(neighbors))
    }

    /// The `n` nearest neighbors of a stored song, never including the
    /// song itself. `n` may exceed the store size; the result is just
    /// everything available.
    pub fn top_neighbors(&self, index: usize, n: usize) -> Result<Vec<Recommendation<'_>>> {
        let neighbors = self.neighbor_list(index, n)?;
        Ok(self.to_recommendations(neighbors))
    }

    /// Neighbors of a song referenced by name (and optionally artist).
    pub fn recommend_by_name(
        &self,
        track_name: &str,
        artist: Option<&str>,
        n: usize,
    ) -> Result<Vec<Recommendation<'_>>> {
        self.ensure_loaded()?;
        let index = self.store.find_by_identity(track_name, artist).ok_or_else(|| {
            EngineError::SongNotFound {
                title: track_name.to_string(),
                artist: artist.map(str::to_string),
            }
        })?;
        self.top_neighbors(index, n)
    }

    /// Build a playlist of up to `length` songs around a seed row. The
    /// candidate pool is the seed's top `min(50, 3 * length)` neighbors;
    /// see [`playlist::sample`] for how `diversity` shapes the result.
    pub fn playlist<R: Rng>(
        &self,
        seed: usize,
        length: usize,
        diversity: f64,
        rng: &mut R,
    ) -> Result<Vec<PlaylistEntry<'_>>> {
        let pool = length.saturating_mul(3).min(CANDIDATE_POOL_CAP);
        let candidates = self.neighbor_list(seed, pool)?;
        let slots = playlist::sample(seed, &candidates, length, diversity, rng);
        Ok(slots
            .iter()
            .enumerate()
            .map(|(pos, slot)| PlaylistEntry {
                position: pos + 1,
                song: &self.store.songs()[slot.index],
                score: slot.score,
                is_seed: slot.is_seed,
            })
            .collect())
    }

    /// Rows ordered by a single named feature, highest first unless
    /// `ascending`. Ties keep ascending row order.
    pub fn top_by_feature(
        &self,
        feature: &str,
        n: usize,
        ascending: bool,
    ) -> Result<Vec<(usize, f64)>> {
        self.ensure_loaded()?;
        let dim = AUDIO_FEATURES
            .iter()
            .position(|f| *f == feature)
            .ok_or_else(|| EngineError::UnknownFeature(feature.to_string()))?;

        let mut rows: Vec<(usize, f64)> = self
            .store
            .vectors()
            .iter()
            .enumerate()
            .map(|(i, v)| (i, v[dim]))
            .collect();
        rows.sort_by(|a, b| {
            let ord = b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal);
            let ord = if ascending { ord.reverse() } else { ord };
            ord.then(a.0.cmp(&b.0))
        });
        rows.truncate(n);
        Ok(rows)
    }

    /// Dataset overview for display.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary::compute(&self.store)
    }

    fn neighbor_list(&self, index: usize, n: usize) -> Result<Vec<Neighbor>> {
        self.ensure_loaded()?;
        let query = self.scale_query(self.store.features_of(index)?);
        let mut neighbors =
            similarity::rank_against(self.active_vectors(), &query, Some(index), self.batch_size);
        neighbors.truncate(n);
        Ok(neighbors)
    }

    fn to_recommendations(&self, neighbors: Vec<Neighbor>) -> Vec<Recommendation<'_>> {
        neighbors
            .into_iter()
            .map(|n| Recommendation {
                index: n.index,
                song: &self.store.songs()[n.index],
                score: n.score,
            })
            .collect()
    }
}

/// Per-feature spread across the store.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub name: &'static str,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// Dataset overview: row and identity counts plus feature spreads.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub songs: usize,
    pub artists: usize,
    /// Distinct `track_genre` values, when the dataset carries them.
    pub genres: Option<usize>,
    pub features: Vec<FeatureSummary>,
}

impl DatasetSummary {
    pub fn compute(store: &FeatureStore) -> Self {
        let artists = store
            .songs()
            .iter()
            .map(|s| s.artists.as_str())
            .collect::<HashSet<_>>()
            .len();

        let genres = store
            .columns()
            .iter()
            .any(|c| c == "track_genre")
            .then(|| {
                store
                    .songs()
                    .iter()
                    .filter_map(|s| s.extras.get("track_genre"))
                    .map(String::as_str)
                    .collect::<HashSet<_>>()
                    .len()
            });

        let features = AUDIO_FEATURES
            .iter()
            .enumerate()
            .map(|(dim, &name)| {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                let mut sum = 0.0_f64;
                for v in store.vectors() {
                    min = min.min(v[dim]);
                    max = max.max(v[dim]);
                    sum += v[dim];
                }
                if store.is_empty() {
                    FeatureSummary { name, min: 0.0, mean: 0.0, max: 0.0 }
                } else {
                    FeatureSummary {
                        name,
                        min,
                        mean: sum / store.len() as f64,
                        max,
                    }
                }
            })
            .collect();

        Self {
            songs: store.len(),
            artists,
            genres,
            features,
        }
    }
}
