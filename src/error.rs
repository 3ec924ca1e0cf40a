//! Error types for catalog loading and recommendation queries.

use std::path::PathBuf;
use thiserror::Error;

use crate::mood::Mood;

/// Outcome of a query that could not produce a recommendation list.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    /// The catalog failed to load at startup; nothing can be answered.
    #[error("catalog unavailable: {reason}")]
    CatalogUnavailable { reason: String },

    #[error("no input tracks provided")]
    NoInputProvided,

    #[error("none of the {requested} input tracks were found in the catalog")]
    NoSeedTracksFound { requested: usize },

    #[error("invalid mood '{mood}'{}", did_you_mean(.suggestion))]
    InvalidMood {
        mood: String,
        suggestion: Option<Mood>,
    },

    /// Internal invariant violation; unreachable while a catalog is loaded.
    #[error("invalid neighbor query: k={k} against an index of {size} points")]
    InvalidNeighborQuery { k: usize, size: usize },
}

fn did_you_mean(suggestion: &Option<Mood>) -> String {
    match suggestion {
        Some(mood) => format!(" (did you mean '{}'?)", mood),
        None => String::new(),
    }
}

impl RecommendError {
    /// Stable identifier for machine consumers
    pub fn code(&self) -> &'static str {
        match self {
            RecommendError::CatalogUnavailable { .. } => "catalog_unavailable",
            RecommendError::NoInputProvided => "no_input_provided",
            RecommendError::NoSeedTracksFound { .. } => "no_seed_tracks_found",
            RecommendError::InvalidMood { .. } => "invalid_mood",
            RecommendError::InvalidNeighborQuery { .. } => "invalid_neighbor_query",
        }
    }
}

/// Failure to ingest a track dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("dataset '{0}' contains no usable tracks")]
    Empty(String),

    #[error("required column '{column}' missing (available: {available:?})")]
    MissingColumn {
        column: &'static str,
        available: Vec<String>,
    },

    #[error("unsupported dataset format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
