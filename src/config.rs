use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::neighbors::{IndexKind, DEFAULT_LEAF_SIZE};
use crate::normalize::DEFAULT_MIN_STD;

/// Minimum popularity for a candidate to be recommended
pub const POPULARITY_THRESHOLD: f64 = 30.0;

/// Neighbors fetched before filtering
pub const CANDIDATE_COUNT: usize = 50;

/// Maximum tracks in a final recommendation list
pub const MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub popularity_threshold: f64,
    pub candidate_count: usize,
    pub max_results: usize,
    pub index: IndexKind,
    pub leaf_size: usize,
    pub min_std: f64,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            popularity_threshold: POPULARITY_THRESHOLD,
            candidate_count: CANDIDATE_COUNT,
            max_results: MAX_RESULTS,
            index: IndexKind::default(),
            leaf_size: DEFAULT_LEAF_SIZE,
            min_std: DEFAULT_MIN_STD,
        }
    }
}

impl RecommenderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidate_count == 0 {
            bail!("candidate_count must be at least 1");
        }
        if self.max_results == 0 {
            bail!("max_results must be at least 1");
        }
        if self.leaf_size == 0 {
            bail!("leaf_size must be at least 1");
        }
        if !self.popularity_threshold.is_finite() {
            bail!("popularity_threshold must be a finite number");
        }
        if !(self.min_std.is_finite() && self.min_std >= 0.0) {
            bail!("min_std must be a non-negative finite number");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RecommenderConfig::default();
        assert_eq!(config.popularity_threshold, 30.0);
        assert_eq!(config.candidate_count, 50);
        assert_eq!(config.max_results, 10);
        assert_eq!(config.index, IndexKind::BallTree);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "candidate_count = 80\nindex = \"brute_force\"").unwrap();
        let config = RecommenderConfig::load(file.path()).unwrap();
        assert_eq!(config.candidate_count, 80);
        assert_eq!(config.index, IndexKind::BruteForce);
        assert_eq!(config.max_results, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_results = 0").unwrap();
        let err = RecommenderConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_results"));

        let config = RecommenderConfig {
            candidate_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = RecommenderConfig::load(Path::new("/nonexistent/recommender.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
