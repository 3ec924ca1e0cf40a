//! Mood profile table.
//!
//! Each mood pins a handful of features to target values in their natural
//! (pre-normalization) scale. Features a mood doesn't mention keep the
//! catalog mean when the query vector is synthesized.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecommendError;

/// Minimum Jaro-Winkler similarity for suggesting a mood on a typo
const SUGGESTION_THRESHOLD: f64 = 0.8;

static MOODS_BY_NAME: Lazy<FxHashMap<&'static str, Mood>> =
    Lazy::new(|| Mood::ALL.iter().map(|&m| (m.as_str(), m)).collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Energetic,
    Chill,
    Party,
    Workout,
    Focus,
    Romance,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Energetic,
        Mood::Chill,
        Mood::Party,
        Mood::Workout,
        Mood::Focus,
        Mood::Romance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Energetic => "energetic",
            Mood::Chill => "chill",
            Mood::Party => "party",
            Mood::Workout => "workout",
            Mood::Focus => "focus",
            Mood::Romance => "romance",
        }
    }

    /// Feature overrides as (feature name, target value) pairs.
    pub fn profile(self) -> &'static [(&'static str, f64)] {
        match self {
            Mood::Happy => &[("valence", 0.8), ("energy", 0.8), ("danceability", 0.8)],
            Mood::Sad => &[("valence", 0.2), ("energy", 0.2), ("acousticness", 0.8)],
            Mood::Energetic => &[
                ("valence", 0.7),
                ("energy", 0.9),
                ("danceability", 0.85),
                ("tempo", 160.0),
            ],
            Mood::Chill => &[
                ("valence", 0.4),
                ("energy", 0.2),
                ("danceability", 0.5),
                ("acousticness", 0.9),
                ("tempo", 90.0),
            ],
            Mood::Party => &[("danceability", 0.9), ("energy", 0.85), ("valence", 0.8)],
            Mood::Workout => &[("energy", 0.9), ("tempo", 140.0), ("danceability", 0.75)],
            Mood::Focus => &[
                ("instrumentalness", 0.8),
                ("acousticness", 0.6),
                ("energy", 0.3),
            ],
            Mood::Romance => &[("valence", 0.6), ("energy", 0.4), ("acousticness", 0.7)],
        }
    }

    /// Closest mood name to a rejected label, if any is close enough.
    pub fn suggest(label: &str) -> Option<Mood> {
        let label = label.trim().to_lowercase();
        Mood::ALL
            .iter()
            .map(|m| (*m, strsim::jaro_winkler(&label, m.as_str())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(m, _)| m)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MOODS_BY_NAME
            .get(s)
            .copied()
            .ok_or_else(|| RecommendError::InvalidMood {
                mood: s.to_string(),
                suggestion: Mood::suggest(s),
            })
    }
}
