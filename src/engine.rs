//! Immutable engine context.
//!
//! Built once at startup from a loaded catalog: the normalization parameters
//! are fitted over every catalog vector, and the neighbor index is built
//! from the normalized vectors (index position == catalog position).
//! Afterwards nothing is mutated, so one `Engine` can serve concurrent
//! queries through a shared reference.

use std::time::Instant;
use tracing::{debug, info};

use crate::catalog::CatalogStore;
use crate::config::RecommenderConfig;
use crate::error::RecommendError;
use crate::features::FeatureVector;
use crate::neighbors::{build_index, Neighbor, NeighborIndex};
use crate::normalize::NormalizationParams;
use crate::progress::format_duration;

pub struct Engine {
    catalog: CatalogStore,
    params: NormalizationParams,
    index: Box<dyn NeighborIndex>,
    config: RecommenderConfig,
}

impl Engine {
    pub fn build(catalog: CatalogStore, config: RecommenderConfig) -> Result<Self, RecommendError> {
        if catalog.is_empty() {
            return Err(RecommendError::CatalogUnavailable {
                reason: "catalog is empty".to_string(),
            });
        }
        let start = Instant::now();

        let dims = catalog.schema().len();
        let params = NormalizationParams::fit(catalog.vectors(), dims, config.min_std);
        let raw: Vec<&FeatureVector> = catalog.vectors().collect();
        let normalized = params.transform_all(&raw);
        let index = build_index(config.index, normalized, config.leaf_size);

        info!(
            "Engine ready: {} tracks, {} features, {:?} index ({})",
            catalog.len(),
            dims,
            config.index,
            format_duration(start.elapsed())
        );

        Ok(Self {
            catalog,
            params,
            index,
            config,
        })
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn params(&self) -> &NormalizationParams {
        &self.params
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Normalize a raw target vector and fetch its nearest catalog tracks.
    pub fn nearest(&self, target: &[f64]) -> Result<Vec<Neighbor>, RecommendError> {
        let scaled = self.params.transform(target);
        let neighbors = self.index.query(&scaled, self.config.candidate_count)?;
        debug!(
            "Neighbor query returned {} candidates (closest {:.4})",
            neighbors.len(),
            neighbors.first().map_or(f64::NAN, |n| n.distance)
        );
        Ok(neighbors)
    }
}
