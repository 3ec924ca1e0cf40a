//! Feature standardization.
//!
//! Fitted once over the whole catalog: every feature is centered on its
//! catalog mean and divided by its population standard deviation, so that
//! tempo (~120) and valence (~0.5) contribute comparably to distances.
//!
//! A column whose deviation falls below `min_std` is treated as already
//! centered with scale 1.0 instead of dividing by (nearly) zero.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

/// Deviation below which a column counts as constant
pub const DEFAULT_MIN_STD: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl NormalizationParams {
    /// Fit mean and scale per feature. An empty input yields identity params.
    pub fn fit<'a>(
        vectors: impl Iterator<Item = &'a FeatureVector> + Clone,
        dims: usize,
        min_std: f64,
    ) -> Self {
        let mut mean = vec![0.0; dims];
        let mut n = 0usize;
        for v in vectors.clone() {
            for (m, x) in mean.iter_mut().zip(v) {
                *m += x;
            }
            n += 1;
        }
        if n == 0 {
            return Self {
                mean,
                scale: vec![1.0; dims],
            };
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        // Use population std (divide by n, not n-1)
        let mut sum_sq = vec![0.0; dims];
        for v in vectors {
            for ((s, x), m) in sum_sq.iter_mut().zip(v).zip(&mean) {
                let diff = x - m;
                *s += diff * diff;
            }
        }
        let scale = sum_sq
            .into_iter()
            .map(|s| {
                let std = (s / n as f64).sqrt();
                if std < min_std {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Self { mean, scale }
    }

    /// `(x - mean) / scale` per feature.
    pub fn transform(&self, vector: &[f64]) -> FeatureVector {
        debug_assert_eq!(vector.len(), self.mean.len());
        vector
            .iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((x, m), s)| (x - m) / s)
            .collect()
    }

    /// Transform a batch in parallel, preserving order.
    pub fn transform_all(&self, vectors: &[&FeatureVector]) -> Vec<FeatureVector> {
        vectors.par_iter().map(|v| self.transform(v)).collect()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn dims(&self) -> usize {
        self.mean.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FeatureVector> {
        vec![
            vec![0.0, 100.0, 0.5],
            vec![1.0, 200.0, 0.5],
            vec![2.0, 300.0, 0.5],
            vec![3.0, 400.0, 0.5],
        ]
    }

    #[test]
    fn test_fit_population_std() {
        let data = sample();
        let params = NormalizationParams::fit(data.iter(), 3, DEFAULT_MIN_STD);
        assert_eq!(params.mean(), &[1.5, 250.0, 0.5]);
        let expected = (1.25f64).sqrt();
        assert!((params.scale()[0] - expected).abs() < 1e-12);
        assert!((params.scale()[1] - expected * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_has_unit_scale() {
        let data = sample();
        let params = NormalizationParams::fit(data.iter(), 3, DEFAULT_MIN_STD);
        assert_eq!(params.scale()[2], 1.0);
        let out = params.transform(&[0.5, 250.0, 0.7]);
        assert!(out.iter().all(|v| v.is_finite()));
        assert!((out[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_mean_vector_maps_to_origin() {
        let data = sample();
        let params = NormalizationParams::fit(data.iter(), 3, DEFAULT_MIN_STD);
        let out = params.transform(params.mean());
        assert!(out.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_transformed_columns_are_standardized() {
        let data = sample();
        let params = NormalizationParams::fit(data.iter(), 3, DEFAULT_MIN_STD);
        let refs: Vec<&FeatureVector> = data.iter().collect();
        let out = params.transform_all(&refs);
        for j in 0..2 {
            let mean: f64 = out.iter().map(|v| v[j]).sum::<f64>() / out.len() as f64;
            let var: f64 = out.iter().map(|v| (v[j] - mean).powi(2)).sum::<f64>() / out.len() as f64;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fit_empty_is_identity() {
        let data: Vec<FeatureVector> = Vec::new();
        let params = NormalizationParams::fit(data.iter(), 2, DEFAULT_MIN_STD);
        assert_eq!(params.transform(&[3.0, -1.0]), vec![3.0, -1.0]);
    }
}
