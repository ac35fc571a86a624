//! Listening moods and per-mood score storage.
//!
//! A [`Mood`] is the target listening experience a playlist is curated for.
//! Moods are a closed set; strings coming from the CLI or a config file are
//! validated through [`FromStr`] at the boundary.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target listening-experience category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Chill,
    Cafe,
    Study,
    Party,
}

impl Mood {
    /// Every mood, in display order.
    pub const ALL: [Mood; 4] = [Mood::Chill, Mood::Cafe, Mood::Study, Mood::Party];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Mood::Chill => "chill",
            Mood::Cafe => "cafe",
            Mood::Study => "study",
            Mood::Party => "party",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chill" => Ok(Mood::Chill),
            "cafe" | "café" => Ok(Mood::Cafe),
            "study" => Ok(Mood::Study),
            "party" => Ok(Mood::Party),
            other => bail!("Unknown mood: '{other}'. Use one of: chill, cafe, study, party"),
        }
    }
}

/// Affinity of a single track to every mood.
///
/// Values cluster in `[0, 1]`; the party score may overshoot slightly for
/// tempos above 200 BPM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodScores {
    pub chill: f64,
    pub cafe: f64,
    pub study: f64,
    pub party: f64,
}

impl MoodScores {
    #[must_use]
    pub const fn get(&self, mood: Mood) -> f64 {
        match mood {
            Mood::Chill => self.chill,
            Mood::Cafe => self.cafe,
            Mood::Study => self.study,
            Mood::Party => self.party,
        }
    }

    /// The mood this track fits best. Ties resolve in [`Mood::ALL`] order.
    #[must_use]
    pub fn dominant(&self) -> Mood {
        Mood::ALL
            .into_iter()
            .fold(Mood::Chill, |best, mood| {
                if self.get(mood) > self.get(best) { mood } else { best }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_parsing_is_case_insensitive() {
        assert_eq!("Party".parse::<Mood>().unwrap(), Mood::Party);
        assert_eq!(" chill ".parse::<Mood>().unwrap(), Mood::Chill);
        assert_eq!("CAFE".parse::<Mood>().unwrap(), Mood::Cafe);
    }

    #[test]
    fn test_unknown_mood_is_rejected() {
        let err = "jazz".parse::<Mood>().unwrap_err();
        assert!(err.to_string().contains("Unknown mood"));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for mood in Mood::ALL {
            assert_eq!(mood.to_string().parse::<Mood>().unwrap(), mood);
        }
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Mood::Study).unwrap();
        assert_eq!(json, "\"study\"");
        let back: Mood = serde_json::from_str("\"party\"").unwrap();
        assert_eq!(back, Mood::Party);
    }

    #[test]
    fn test_dominant_mood() {
        let scores = MoodScores { chill: 0.2, cafe: 0.5, study: 0.1, party: 0.7 };
        assert_eq!(scores.dominant(), Mood::Party);
        assert_eq!(scores.get(Mood::Cafe), 0.5);
    }
}
