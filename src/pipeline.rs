//! Recommendation pipeline.
//!
//! Both queries synthesize a target vector in raw feature space, fetch the
//! nearest candidates from the engine, then:
//! - keep candidates at or above the popularity threshold
//! - (similarity only) drop anything the listener supplied as a seed
//! - dedupe, keeping first-seen order
//! - randomize: a bounded sample for similarity, a full shuffle for moods
//!
//! Randomness is always passed in, never drawn from a hidden global.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::catalog::mean_of;
use crate::engine::Engine;
use crate::error::RecommendError;
use crate::features::FeatureVector;
use crate::models::Recommendation;
use crate::mood::Mood;
use crate::neighbors::Neighbor;

/// Recommend tracks similar to the listener's liked and recently played ones.
pub fn recommend_by_similarity<S, R>(
    engine: &Engine,
    top_tracks: &[S],
    recently_played: &[S],
    rng: &mut R,
) -> Result<Recommendation, RecommendError>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    let seeds: FxHashSet<&str> = top_tracks
        .iter()
        .chain(recently_played)
        .map(|s| s.as_ref())
        .collect();
    if seeds.is_empty() {
        return Err(RecommendError::NoInputProvided);
    }

    let target = seed_target(engine, &seeds).ok_or(RecommendError::NoSeedTracksFound {
        requested: seeds.len(),
    })?;
    let neighbors = engine.nearest(&target)?;

    let candidates: Vec<&str> = popular_candidates(engine, &neighbors)
        .filter(|id| !seeds.contains(id))
        .collect();
    let unique = dedupe_preserving_order(candidates);
    let max = engine.config().max_results;
    debug!(
        "Similarity query: {} seeds, {} candidates after filtering",
        seeds.len(),
        unique.len()
    );

    Ok(Recommendation {
        recommended_tracks: sample_bounded(unique, max, rng),
    })
}

/// Recommend tracks matching a mood label.
pub fn recommend_by_mood<R>(
    engine: &Engine,
    mood: &str,
    rng: &mut R,
) -> Result<Recommendation, RecommendError>
where
    R: Rng + ?Sized,
{
    let mood: Mood = mood.parse()?;
    let target = mood_target(engine, mood);
    let neighbors = engine.nearest(&target)?;

    let mut unique = dedupe_preserving_order(popular_candidates(engine, &neighbors).collect());
    debug!("Mood query '{}': {} candidates after filtering", mood, unique.len());

    unique.shuffle(rng);
    unique.truncate(engine.config().max_results);
    Ok(Recommendation {
        recommended_tracks: unique,
    })
}

/// Mean feature vector of the seeds found in the catalog, or `None` when
/// none of them resolve. Seeds are averaged in catalog order.
pub fn seed_target(engine: &Engine, seeds: &FxHashSet<&str>) -> Option<FeatureVector> {
    let catalog = engine.catalog();
    let mut positions: Vec<usize> = seeds.iter().filter_map(|id| catalog.position(id)).collect();
    if positions.is_empty() {
        return None;
    }
    positions.sort_unstable();
    let vectors = positions.iter().map(|&pos| &catalog.track(pos).features);
    Some(mean_of(vectors, catalog.schema().len()))
}

/// Catalog mean with the mood's overrides applied. Overrides for features
/// the catalog doesn't carry are ignored.
pub fn mood_target(engine: &Engine, mood: Mood) -> FeatureVector {
    let catalog = engine.catalog();
    let mut target = catalog.mean_vector().clone();
    for (feature, value) in mood.profile() {
        if let Some(i) = catalog.schema().index_of(feature) {
            target[i] = *value;
        }
    }
    target
}

/// Candidate ids, nearest first, that clear the popularity threshold.
fn popular_candidates<'a>(
    engine: &'a Engine,
    neighbors: &'a [Neighbor],
) -> impl Iterator<Item = &'a str> + 'a {
    let threshold = engine.config().popularity_threshold;
    neighbors
        .iter()
        .map(move |n| engine.catalog().track(n.position))
        .filter(move |t| t.popularity >= threshold)
        .map(|t| t.id.as_str())
}

/// Remove repeats, keeping the first occurrence of each id.
pub fn dedupe_preserving_order(ids: Vec<&str>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    ids.into_iter()
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Everything if it fits, otherwise `max` ids drawn uniformly without
/// replacement, in the order drawn.
pub fn sample_bounded<R: Rng + ?Sized>(mut ids: Vec<String>, max: usize, rng: &mut R) -> Vec<String> {
    if ids.len() <= max {
        return ids;
    }
    let (chosen, _) = ids.partial_shuffle(rng, max);
    chosen.to_vec()
}
