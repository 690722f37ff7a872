pub mod config;
pub mod error;
pub mod playlist;
pub mod recommender;
pub mod search;
pub mod similarity;
pub mod store;

/// Audio feature columns in canonical order. Stored vectors and query
/// vectors both use this axis ordering.
pub const AUDIO_FEATURES: [&str; 9] = [
    "acousticness",
    "danceability",
    "energy",
    "instrumentalness",
    "liveness",
    "loudness",
    "speechiness",
    "tempo",
    "valence",
];

/// Number of audio feature dimensions.
pub const FEATURE_COUNT: usize = AUDIO_FEATURES.len();

/// Application name for XDG paths
pub const APP_NAME: &str = "soundalike";
