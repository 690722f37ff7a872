use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Dataset is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("Line {line}, column \"{column}\": invalid feature value \"{value}\"")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("No songs loaded")]
    EmptyStore,
    #[error("Song \"{title}\" not found in the dataset")]
    SongNotFound {
        title: String,
        artist: Option<String>,
    },
    #[error("Unknown feature \"{0}\"")]
    UnknownFeature(String),
    #[error("Row index {index} out of bounds ({len} songs)")]
    RowOutOfBounds { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
