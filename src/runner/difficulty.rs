use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical difficulty used for scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Easy => write!(f, "easy"),
            Tier::Medium => write!(f, "medium"),
            Tier::Hard => write!(f, "hard"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Tier::Easy),
            "medium" => Ok(Tier::Medium),
            "hard" => Ok(Tier::Hard),
            _ => Err(format!("Unknown difficulty tier: {}", s)),
        }
    }
}

impl Tier {
    /// Short steer appended to the prompt for canonical tiers
    pub fn hint(self) -> &'static str {
        match self {
            Tier::Easy => "Ask about a widely known fact that a casual player would likely recognize.",
            Tier::Medium => {
                "Ask about a fact a regular quiz player might know but that is not common knowledge."
            }
            Tier::Hard => "Ask about a specific, lesser-known fact that would challenge an enthusiast.",
        }
    }
}

/// Requested difficulty: a canonical tier or free-form guidance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difficulty {
    Tier(Tier),
    Custom(String),
}

impl Difficulty {
    /// Canonical names match case-insensitively. Anything else, with or without
    /// a leading `custom:`, is kept as free text. Blank input means medium.
    pub fn parse(raw: &str) -> Self {
        let (text, prefixed) = match strip_custom_prefix(raw) {
            Some(rest) => (rest.trim(), true),
            None => (raw.trim(), false),
        };
        if text.is_empty() {
            return Difficulty::Tier(Tier::default());
        }
        if !prefixed {
            if let Ok(tier) = text.parse::<Tier>() {
                return Difficulty::Tier(tier);
            }
        }
        Difficulty::Custom(text.to_string())
    }

    /// Tier stored for scoring; custom guidance counts as medium
    pub fn tier(&self) -> Tier {
        match self {
            Difficulty::Tier(tier) => *tier,
            Difficulty::Custom(_) => Tier::Medium,
        }
    }

    /// Difficulty text embedded in the prompt
    pub fn prompt_text(&self) -> String {
        match self {
            Difficulty::Tier(tier) => tier.to_string(),
            Difficulty::Custom(text) => text.clone(),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Difficulty::Tier(tier) => Some(tier.hint()),
            Difficulty::Custom(_) => None,
        }
    }

    pub fn custom_description(&self) -> Option<&str> {
        match self {
            Difficulty::Custom(text) => Some(text),
            Difficulty::Tier(_) => None,
        }
    }
}

fn strip_custom_prefix(raw: &str) -> Option<&str> {
    let re = Regex::new(r"(?i)^\s*custom\s*:").ok()?;
    let found = re.find(raw)?;
    Some(&raw[found.end()..])
}
