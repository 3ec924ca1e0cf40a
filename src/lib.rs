//! Track recommender - feature-space nearest-neighbor recommendations over
//! a track catalog, seeded by listener tracks or by a mood.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod models;
pub mod mood;
pub mod neighbors;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod recommender;

pub use catalog::CatalogStore;
pub use config::RecommenderConfig;
pub use engine::Engine;
pub use error::{LoadError, RecommendError};
pub use models::{Recommendation, RecommendRequest, TrackRecord};
pub use mood::Mood;
pub use recommender::Recommender;
