//! Core data models for the recommender.
//!
//! This module contains the catalog record, the request/response shapes
//! exchanged with callers, and ingestion statistics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecommendError;
use crate::features::FeatureVector;

// ============================================================================
// Catalog Models
// ============================================================================

/// One catalog track. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRecord {
    pub id: String,
    pub popularity: f64, // 0-100 in Spotify exports
    pub features: FeatureVector,
}

impl TrackRecord {
    pub fn new(id: impl Into<String>, popularity: f64, features: FeatureVector) -> Self {
        Self {
            id: id.into(),
            popularity,
            features,
        }
    }
}

// ============================================================================
// Request / Response Models
// ============================================================================

/// Similarity query: the union of liked and recently played tracks seeds it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SimilarityRequest {
    #[serde(default)]
    pub top_tracks: Vec<String>,
    #[serde(default)]
    pub recently_played: Vec<String>,
}

/// Mood query. The key alone marks a request as a mood query, so a null
/// or non-string value is still answered as an invalid mood.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MoodRequest {
    pub mood: Value,
}

impl MoodRequest {
    pub fn new(mood: impl Into<String>) -> Self {
        Self {
            mood: Value::String(mood.into()),
        }
    }

    /// The mood label, or `InvalidMood` when the value isn't a string.
    pub fn label(&self) -> Result<&str, RecommendError> {
        self.mood.as_str().ok_or_else(|| RecommendError::InvalidMood {
            mood: self.mood.to_string(),
            suggestion: None,
        })
    }
}

/// Either request shape. A `mood` key selects the mood query, whatever its
/// value.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RecommendRequest {
    Mood(MoodRequest),
    Similarity(SimilarityRequest),
}

/// Final list of recommended track ids: distinct, at most `max_results`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Recommendation {
    pub recommended_tracks: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecommendResponse {
    pub status: &'static str,
    pub recommended_tracks: Vec<String>,
}

impl From<Recommendation> for RecommendResponse {
    fn from(r: Recommendation) -> Self {
        Self {
            status: "success",
            recommended_tracks: r.recommended_tracks,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl From<&RecommendError> for ErrorResponse {
    fn from(e: &RecommendError) -> Self {
        Self {
            error: e.to_string(),
            code: e.code(),
        }
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Row accounting for one catalog load.
#[derive(Default, Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub rows_read: usize,
    pub missing_id_dropped: usize,
    pub duplicate_ids_dropped: usize,
    pub bad_popularity_dropped: usize,
    pub bad_features_dropped: usize,
    pub tracks_kept: usize,
    pub feature_columns: Vec<String>,
    pub elapsed_seconds: f64,
}

impl CatalogStats {
    /// Percentage of input rows that made it into the catalog
    pub fn keep_rate(&self) -> f64 {
        if self.rows_read == 0 {
            0.0
        } else {
            100.0 * self.tracks_kept as f64 / self.rows_read as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
