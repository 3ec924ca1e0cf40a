//! Acoustic feature columns.
//!
//! The catalog may carry any subset of the canonical Spotify audio features.
//! A [`FeatureSchema`] records which of them are present, in canonical order,
//! and every feature vector in a running instance follows that order.

/// Canonical feature names, in the order vectors are laid out.
pub const CANONICAL_FEATURES: [&str; 9] = [
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

/// Numeric feature vector laid out per a [`FeatureSchema`].
pub type FeatureVector = Vec<f64>;

/// The usable feature columns of a loaded catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<&'static str>,
}

impl FeatureSchema {
    /// Intersect the canonical list with the columns present in the data.
    /// Column matching is exact, like the dataset headers themselves.
    pub fn from_columns<S: AsRef<str>>(columns: &[S]) -> Self {
        let names = CANONICAL_FEATURES
            .iter()
            .copied()
            .filter(|feature| columns.iter().any(|c| c.as_ref() == *feature))
            .collect();
        Self { names }
    }

    /// Schema with every canonical feature.
    pub fn full() -> Self {
        Self {
            names: CANONICAL_FEATURES.to_vec(),
        }
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature within vectors of this schema
    pub fn index_of(&self, feature: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keeps_canonical_order() {
        let schema = FeatureSchema::from_columns(&["valence", "track_id", "energy", "acousticness"]);
        assert_eq!(schema.names(), &["acousticness", "energy", "valence"]);
    }

    #[test]
    fn test_schema_ignores_unknown_columns() {
        let schema = FeatureSchema::from_columns(&["id", "popularity", "key", "mode"]);
        assert!(schema.is_empty());
    }

    #[test]
    fn test_index_of() {
        let schema = FeatureSchema::from_columns(&["tempo", "energy"]);
        assert_eq!(schema.index_of("energy"), Some(0));
        assert_eq!(schema.index_of("tempo"), Some(1));
        assert_eq!(schema.index_of("valence"), None);
        assert_eq!(FeatureSchema::full().len(), 9);
    }
}
