//! Startup-facing facade.
//!
//! A dataset that is missing, unreadable or empty does not abort startup:
//! the recommender comes up `Unavailable` and every query reports
//! [`RecommendError::CatalogUnavailable`] instead of computing on nothing.

use rand::Rng;
use std::path::Path;
use tracing::{error, warn};

use crate::catalog::CatalogStore;
use crate::config::RecommenderConfig;
use crate::engine::Engine;
use crate::error::RecommendError;
use crate::models::{CatalogStats, Recommendation, RecommendRequest};
use crate::pipeline;

pub enum CatalogState {
    Ready(Engine),
    Unavailable(String),
}

pub struct Recommender {
    state: CatalogState,
}

impl Recommender {
    /// Load a dataset and build the engine. Failures are logged and leave
    /// the recommender unavailable; stats are returned when loading worked.
    pub fn load(path: &Path, table: &str, config: RecommenderConfig) -> (Self, Option<CatalogStats>) {
        match CatalogStore::load(path, table) {
            Ok((catalog, stats)) => (Self::from_catalog(catalog, config), Some(stats)),
            Err(e) => {
                error!("Catalog load failed: {}", e);
                (Self::unavailable(e.to_string()), None)
            }
        }
    }

    pub fn from_catalog(catalog: CatalogStore, config: RecommenderConfig) -> Self {
        match Engine::build(catalog, config) {
            Ok(engine) => Self {
                state: CatalogState::Ready(engine),
            },
            Err(e) => {
                warn!("Engine build failed: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: CatalogState::Unavailable(reason.into()),
        }
    }

    pub fn state(&self) -> &CatalogState {
        &self.state
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, CatalogState::Ready(_))
    }

    pub fn engine(&self) -> Result<&Engine, RecommendError> {
        match &self.state {
            CatalogState::Ready(engine) => Ok(engine),
            CatalogState::Unavailable(reason) => Err(RecommendError::CatalogUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    pub fn recommend_by_similarity<S: AsRef<str>>(
        &self,
        top_tracks: &[S],
        recently_played: &[S],
    ) -> Result<Recommendation, RecommendError> {
        self.recommend_by_similarity_with_rng(top_tracks, recently_played, &mut rand::rng())
    }

    pub fn recommend_by_similarity_with_rng<S: AsRef<str>, R: Rng + ?Sized>(
        &self,
        top_tracks: &[S],
        recently_played: &[S],
        rng: &mut R,
    ) -> Result<Recommendation, RecommendError> {
        pipeline::recommend_by_similarity(self.engine()?, top_tracks, recently_played, rng)
    }

    pub fn recommend_by_mood(&self, mood: &str) -> Result<Recommendation, RecommendError> {
        self.recommend_by_mood_with_rng(mood, &mut rand::rng())
    }

    pub fn recommend_by_mood_with_rng<R: Rng + ?Sized>(
        &self,
        mood: &str,
        rng: &mut R,
    ) -> Result<Recommendation, RecommendError> {
        pipeline::recommend_by_mood(self.engine()?, mood, rng)
    }

    /// Answer either request shape.
    pub fn handle(&self, request: &RecommendRequest) -> Result<Recommendation, RecommendError> {
        match request {
            RecommendRequest::Mood(req) => self.recommend_by_mood(req.label()?),
            RecommendRequest::Similarity(req) => {
                self.recommend_by_similarity(req.top_tracks.as_slice(), req.recently_played.as_slice())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::models::{MoodRequest, SimilarityRequest, TrackRecord};
    use crate::mood::Mood;
    use std::io::Write;

    fn small_catalog() -> CatalogStore {
        let schema = FeatureSchema::from_columns(&["danceability", "energy", "valence"]);
        let records = (0..40).map(|i| {
            let x = i as f64 / 40.0;
            TrackRecord::new(format!("id{}", i), 20.0 + i as f64, vec![x, 1.0 - x, (x * 7.0) % 1.0])
        });
        CatalogStore::from_records(schema, records).unwrap()
    }

    #[test]
    fn test_unavailable_fails_fast() {
        let rec = Recommender::unavailable("spotify_data.csv not found");
        assert!(!rec.is_available());
        let err = rec.recommend_by_mood("happy").unwrap_err();
        assert_eq!(err.code(), "catalog_unavailable");
        let err = rec.recommend_by_similarity(&["a"], &[]).unwrap_err();
        assert_eq!(err.code(), "catalog_unavailable");
        // Unavailability takes precedence over input validation
        let empty: [&str; 0] = [];
        let err = rec.recommend_by_similarity(&empty, &empty).unwrap_err();
        assert_eq!(err.code(), "catalog_unavailable");
    }

    #[test]
    fn test_load_missing_dataset_is_unavailable() {
        let (rec, stats) = Recommender::load(
            Path::new("/nonexistent/spotify_data.csv"),
            "tracks",
            RecommenderConfig::default(),
        );
        assert!(stats.is_none());
        assert!(matches!(rec.state(), CatalogState::Unavailable(_)));
        assert!(matches!(
            rec.recommend_by_mood("sad"),
            Err(RecommendError::CatalogUnavailable { .. })
        ));
    }

    #[test]
    fn test_load_csv_and_query() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,popularity,energy,valence,tempo").unwrap();
        for i in 0..30 {
            writeln!(file, "s{},{},{},{},{}", i, 40 + i, i as f64 / 30.0, 0.5, 100 + i).unwrap();
        }
        let (rec, stats) = Recommender::load(file.path(), "tracks", RecommenderConfig::default());
        assert!(rec.is_available());
        assert_eq!(stats.unwrap().tracks_kept, 30);

        let result = rec.recommend_by_similarity(&["s3", "s4"], &["s5"]).unwrap();
        assert_eq!(result.recommended_tracks.len(), 10);
        assert!(!result.recommended_tracks.iter().any(|id| id == "s3" || id == "s4" || id == "s5"));
    }

    #[test]
    fn test_handle_dispatch() {
        let rec = Recommender::from_catalog(small_catalog(), RecommenderConfig::default());
        let mood = RecommendRequest::Mood(MoodRequest::new("party"));
        let out = rec.handle(&mood).unwrap();
        assert!(out.recommended_tracks.len() <= 10);

        let bad = RecommendRequest::Mood(MoodRequest::new("ecstatic"));
        assert_eq!(rec.handle(&bad).unwrap_err().code(), "invalid_mood");

        let empty = RecommendRequest::Similarity(SimilarityRequest::default());
        assert_eq!(rec.handle(&empty).unwrap_err(), RecommendError::NoInputProvided);
    }

    #[test]
    fn test_handle_non_string_mood_is_invalid() {
        let rec = Recommender::from_catalog(small_catalog(), RecommenderConfig::default());
        for raw in [r#"{"mood": null}"#, r#"{"mood": 7}"#, r#"{"mood": ["happy"]}"#] {
            let request: RecommendRequest = serde_json::from_str(raw).unwrap();
            assert!(matches!(request, RecommendRequest::Mood(_)), "{}", raw);
            let err = rec.handle(&request).unwrap_err();
            assert_eq!(err.code(), "invalid_mood", "{}", raw);
        }

        let request: RecommendRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(rec.handle(&request).unwrap_err(), RecommendError::NoInputProvided);
    }

    #[test]
    fn test_concurrent_queries_share_engine() {
        let rec = Recommender::from_catalog(small_catalog(), RecommenderConfig::default());
        std::thread::scope(|scope| {
            for t in 0..4 {
                let rec = &rec;
                scope.spawn(move || {
                    for _ in 0..25 {
                        let out = rec.recommend_by_mood(Mood::ALL[t % 8].as_str()).unwrap();
                        assert!(out.recommended_tracks.len() <= 10);
                        let out = rec.recommend_by_similarity(&["id1"], &["id2"]).unwrap();
                        assert!(!out.recommended_tracks.contains(&"id1".to_string()));
                    }
                });
            }
        });
    }
}
