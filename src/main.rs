use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use soundalike::AUDIO_FEATURES;
use soundalike::recommender::{PlaylistEntry, Recommendation};
use soundalike::store::Song;

#[derive(Parser)]
#[command(name = "soundalike", version, about = "Song recommendations from audio feature similarity")]
struct Cli {
    /// Path to the dataset CSV
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Z-score features before ranking so every axis weighs equally
    #[arg(long, global = true)]
    normalize: bool,

    /// Rows scored per batch during ranking
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeatureName {
    Acousticness,
    Danceability,
    Energy,
    Instrumentalness,
    Liveness,
    Loudness,
    Speechiness,
    Tempo,
    Valence,
}

impl FeatureName {
    fn column(&self) -> &'static str {
        match self {
            Self::Acousticness => "acousticness",
            Self::Danceability => "danceability",
            Self::Energy => "energy",
            Self::Instrumentalness => "instrumentalness",
            Self::Liveness => "liveness",
            Self::Loudness => "loudness",
            Self::Speechiness => "speechiness",
            Self::Tempo => "tempo",
            Self::Valence => "valence",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search songs by title or artist (substring match)
    Search {
        /// Text to look for in "title artist"
        query: String,

        /// Number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Find songs that sound similar to a given song
    Similar {
        /// Song title (case-insensitive exact match)
        title: String,

        /// Artist, to disambiguate covers and duplicate titles
        #[arg(short, long)]
        artist: Option<String>,

        /// Number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Rank songs against a hand-picked feature profile
    Discover {
        /// Acoustic vs electric (0 to 1)
        #[arg(long, default_value = "0.5", value_parser = finite_f64)]
        acousticness: f64,

        /// Danceability (0 to 1)
        #[arg(long, default_value = "0.5", value_parser = finite_f64)]
        danceability: f64,

        /// Energy (0 to 1)
        #[arg(long, default_value = "0.5", value_parser = finite_f64)]
        energy: f64,

        /// Instrumental vs vocal (0 to 1)
        #[arg(long, default_value = "0.2", value_parser = finite_f64)]
        instrumentalness: f64,

        /// Live-audience presence (0 to 1)
        #[arg(long, default_value = "0.2", value_parser = finite_f64)]
        liveness: f64,

        /// Loudness in dB, typically -60 to 0
        #[arg(long, default_value = "-20", allow_hyphen_values = true, value_parser = finite_f64)]
        loudness: f64,

        /// Spoken-word presence (0 to 1)
        #[arg(long, default_value = "0.1", value_parser = finite_f64)]
        speechiness: f64,

        /// Tempo in BPM
        #[arg(long, default_value = "120", value_parser = finite_f64)]
        tempo: f64,

        /// Musical positiveness (0 to 1)
        #[arg(long, default_value = "0.5", value_parser = finite_f64)]
        valence: f64,

        /// Number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Build a playlist around a seed song
    Playlist {
        /// Seed song title (case-insensitive exact match)
        title: String,

        /// Artist, to disambiguate covers and duplicate titles
        #[arg(short, long)]
        artist: Option<String>,

        /// Playlist length, seed included
        #[arg(short, long)]
        length: Option<usize>,

        /// 0 = nearest neighbors only, 1 = mostly random picks
        #[arg(short, long)]
        diversity: Option<f64>,

        /// Seed for the random picks (for reproducible playlists)
        #[arg(long)]
        rng_seed: Option<u64>,
    },

    /// Show the audio feature profile of a song
    Features {
        /// Song title (case-insensitive exact match)
        title: String,

        /// Artist, to disambiguate covers and duplicate titles
        #[arg(short, long)]
        artist: Option<String>,
    },

    /// Show songs ranked by a single feature
    Top {
        /// Which feature to rank by
        #[arg(value_enum, default_value = "energy")]
        feature: FeatureName,

        /// Number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Rank lowest first instead of highest
        #[arg(long)]
        lowest: bool,
    },

    /// Show dataset statistics
    Stats,
}

/// Parse a feature flag value, rejecting NaN and infinities.
fn finite_f64(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{raw}' is not a finite number"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = soundalike::config::AppConfig::load();

    // Resolve dataset path: CLI > config
    let dataset = cli
        .dataset
        .or(config.dataset)
        .context("No dataset given. Pass --dataset or set `dataset` in the config file.")?;
    log::info!("Dataset: {}", dataset.display());

    let mut engine = soundalike::recommender::Recommender::load(&dataset)
        .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
    engine.set_batch_size(cli.batch_size.unwrap_or(config.batch_size));
    if cli.normalize {
        engine.set_normalization(true);
    }
    log::info!("{} songs loaded", engine.len());

    match cli.command {
        Commands::Search { query, limit } => {
            let limit = limit.unwrap_or(config.default_limit);
            let hits = engine.search(&query, limit).context("Search failed")?;

            if cli.json {
                let rows: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|(index, song)| serde_json::json!({"index": index, "song": song}))
                    .collect();
                print_json(&rows)?;
            } else if hits.is_empty() {
                println!("No songs match \"{}\".", query);
            } else {
                println!("{} songs matching \"{}\":", hits.len(), query);
                println!();
                print_song_table(&hits);
            }
        }

        Commands::Similar { title, artist, limit } => {
            let limit = limit.unwrap_or(config.default_recommendations);
            let Some(seed) = engine.find_by_identity(&title, artist.as_deref()) else {
                print_not_found(&title, artist.as_deref());
                return Ok(());
            };
            let results = engine.top_neighbors(seed, limit).context("Recommendation failed")?;

            if cli.json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No other songs to compare against.");
            } else {
                let seed_song = &engine.store().songs()[seed];
                println!(
                    "Songs similar to \"{}\" by {}:",
                    seed_song.track_name, seed_song.artists
                );
                println!();
                print_recommendation_table(&results);
            }
        }

        Commands::Discover {
            acousticness,
            danceability,
            energy,
            instrumentalness,
            liveness,
            loudness,
            speechiness,
            tempo,
            valence,
            limit,
        } => {
            let limit = limit.unwrap_or(config.default_recommendations);
            let query = [
                acousticness,
                danceability,
                energy,
                instrumentalness,
                liveness,
                loudness,
                speechiness,
                tempo,
                valence,
            ];
            let results = engine.rank_vector(&query, limit).context("Ranking failed")?;

            if cli.json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No results found.");
            } else {
                println!("Songs closest to the target profile:");
                println!();
                print_recommendation_table(&results);
            }
        }

        Commands::Playlist { title, artist, length, diversity, rng_seed } => {
            let length = length.unwrap_or(config.default_playlist_length);
            let diversity = diversity.unwrap_or(config.default_diversity);
            let Some(seed) = engine.find_by_identity(&title, artist.as_deref()) else {
                print_not_found(&title, artist.as_deref());
                return Ok(());
            };

            let mut rng = match rng_seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            let entries = engine
                .playlist(seed, length, diversity, &mut rng)
                .context("Playlist generation failed")?;

            if cli.json {
                print_json(&entries)?;
            } else {
                let seed_song = &engine.store().songs()[seed];
                println!(
                    "Playlist seeded by \"{}\" ({} songs, diversity {:.2}):",
                    seed_song.track_name,
                    entries.len(),
                    diversity.clamp(0.0, 1.0)
                );
                println!();
                print_playlist_table(&entries);
            }
        }

        Commands::Features { title, artist } => {
            let Some(index) = engine.find_by_identity(&title, artist.as_deref()) else {
                print_not_found(&title, artist.as_deref());
                return Ok(());
            };
            let song = &engine.store().songs()[index];
            let features = engine.features_of(index).context("Lookup failed")?;

            if cli.json {
                let map: BTreeMap<&str, f64> = AUDIO_FEATURES
                    .iter()
                    .copied()
                    .zip(features.iter().copied())
                    .collect();
                print_json(&serde_json::json!({
                    "index": index,
                    "song": song,
                    "features": map,
                }))?;
            } else {
                println!("{} - {}", song.track_name, song.artists);
                println!();
                for (name, value) in AUDIO_FEATURES.iter().zip(features.iter()) {
                    println!("  {:<16} {:>9.3}", name, value);
                }
            }
        }

        Commands::Top { feature, limit, lowest } => {
            let rows = engine
                .top_by_feature(feature.column(), limit, lowest)
                .context("Query failed")?;

            if cli.json {
                let out: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|(index, value)| {
                        let song = &engine.store().songs()[*index];
                        serde_json::json!({"index": index, "song": song, "value": value})
                    })
                    .collect();
                print_json(&out)?;
            } else if rows.is_empty() {
                println!("No results found.");
            } else {
                let direction = if lowest { "lowest" } else { "highest" };
                println!(
                    "{} songs with the {} {}:",
                    rows.len(),
                    direction,
                    feature.column()
                );
                println!();
                println!("{:<4} {:<40} {:<28} {:>9}", "#", "Title", "Artist", "Value");
                println!("{}", "-".repeat(84));
                for (pos, (index, value)) in rows.iter().enumerate() {
                    let song = &engine.store().songs()[*index];
                    println!(
                        "{:<4} {:<40} {:<28} {:>9.3}",
                        pos + 1,
                        clipped(&song.track_name, 40),
                        clipped(&song.artists, 28),
                        value
                    );
                }
            }
        }

        Commands::Stats => {
            let summary = engine.summary();

            if cli.json {
                print_json(&summary)?;
            } else {
                println!("Dataset Statistics");
                println!("==================");
                println!("Songs:    {}", summary.songs);
                println!("Artists:  {}", summary.artists);
                if let Some(genres) = summary.genres {
                    println!("Genres:   {}", genres);
                }
                println!();
                println!("{:<16} {:>9} {:>9} {:>9}", "Feature", "Min", "Mean", "Max");
                println!("{}", "-".repeat(46));
                for f in &summary.features {
                    println!(
                        "{:<16} {:>9.3} {:>9.3} {:>9.3}",
                        f.name, f.min, f.mean, f.max
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn print_not_found(title: &str, artist: Option<&str>) {
    match artist {
        Some(a) => println!("Song \"{}\" by {} not found in the dataset.", title, a),
        None => println!("Song \"{}\" not found in the dataset.", title),
    }
}

/// Truncate to `width` characters, marking the cut with "...".
fn clipped(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Print search hits with their row indices.
fn print_song_table(hits: &[(usize, &Song)]) {
    println!("{:<7} {:<40} {:<30}", "Row", "Title", "Artist");
    println!("{}", "-".repeat(79));

    for (index, song) in hits {
        println!(
            "{:<7} {:<40} {:<30}",
            index,
            clipped(&song.track_name, 40),
            clipped(&song.artists, 30)
        );
    }
}

/// Print ranked recommendations with similarity scores.
fn print_recommendation_table(results: &[Recommendation<'_>]) {
    println!("{:<4} {:<40} {:<28} {:>7}", "#", "Title", "Artist", "Score");
    println!("{}", "-".repeat(82));

    for (pos, r) in results.iter().enumerate() {
        println!(
            "{:<4} {:<40} {:<28} {:>7.4}",
            pos + 1,
            clipped(&r.song.track_name, 40),
            clipped(&r.song.artists, 28),
            r.score
        );
    }

    println!();
    println!("Score = cosine similarity (1 = identical feature profile)");
}

/// Print a playlist, marking the seed row.
fn print_playlist_table(entries: &[PlaylistEntry<'_>]) {
    println!("{:<5} {:<40} {:<28} {:>7}", "#", "Title", "Artist", "Score");
    println!("{}", "-".repeat(83));

    for e in entries {
        let marker = if e.is_seed { "*" } else { " " };
        let score = match e.score {
            Some(s) => format!("{:.4}", s),
            None => "seed".to_string(),
        };
        println!(
            "{:<4}{} {:<40} {:<28} {:>7}",
            e.position,
            marker,
            clipped(&e.song.track_name, 40),
            clipped(&e.song.artists, 28),
            score
        );
    }

    println!();
    println!("* = seed song. Score = similarity to the seed.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_f64_accepts_ordinary_values() {
        assert_eq!(finite_f64("0.5"), Ok(0.5));
        assert_eq!(finite_f64("-18.2"), Ok(-18.2));
        assert_eq!(finite_f64("120"), Ok(120.0));
    }

    #[test]
    fn test_finite_f64_rejects_non_finite_input() {
        assert!(finite_f64("NaN").is_err());
        assert!(finite_f64("inf").is_err());
        assert!(finite_f64("-inf").is_err());
        assert!(finite_f64("fast").is_err());
    }

    #[test]
    fn test_discover_flags_refuse_non_finite_values() {
        assert!(Cli::try_parse_from(["soundalike", "discover", "--tempo", "NaN"]).is_err());
        assert!(Cli::try_parse_from(["soundalike", "discover", "--energy", "inf"]).is_err());
        assert!(Cli::try_parse_from(["soundalike", "discover", "--loudness", "-18.2"]).is_ok());
    }
}
