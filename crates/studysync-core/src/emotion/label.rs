use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Affect classes the mind mirror can report.
///
/// `Error` is never produced by the classifier itself; it marks a tick whose
/// classification failed or returned something outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmotionLabel {
    Focused,
    Confused,
    Bored,
    Frustrated,
    Error,
}

impl EmotionLabel {
    /// The four labels a classifier may legitimately return.
    pub const CLASSIFIABLE: [EmotionLabel; 4] = [
        EmotionLabel::Focused,
        EmotionLabel::Confused,
        EmotionLabel::Bored,
        EmotionLabel::Frustrated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Focused => "Focused",
            EmotionLabel::Confused => "Confused",
            EmotionLabel::Bored => "Bored",
            EmotionLabel::Frustrated => "Frustrated",
            EmotionLabel::Error => "Error",
        }
    }

    /// Labels that may trigger an adaptive intervention.
    pub fn is_disengaged(self) -> bool {
        matches!(
            self,
            EmotionLabel::Confused | EmotionLabel::Bored | EmotionLabel::Frustrated
        )
    }

    /// Interpret free text from the classifier.
    ///
    /// Surrounding whitespace and trailing punctuation are ignored; anything
    /// that is not one of the four classifiable labels becomes `Error`.
    pub fn from_model_text(text: &str) -> Self {
        let cleaned = text
            .trim()
            .trim_matches(|c: char| c == '"' || c == '.' || c == '*' || c == '\'');
        cleaned.parse().unwrap_or(EmotionLabel::Error)
    }
}

impl FromStr for EmotionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmotionLabel::CLASSIFIABLE
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown emotion label: {s}"))
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the mind mirror currently shows to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "label", rename_all = "snake_case")]
pub enum EmotionDisplay {
    /// Tracking disabled.
    NotTracking,
    /// Tracking enabled, no successful sample yet.
    Neutral,
    /// Waiting on the classifier.
    Analyzing,
    Label(EmotionLabel),
}

impl Default for EmotionDisplay {
    fn default() -> Self {
        EmotionDisplay::NotTracking
    }
}

impl fmt::Display for EmotionDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmotionDisplay::NotTracking => f.write_str("Not Tracking"),
            EmotionDisplay::Neutral => f.write_str("Neutral"),
            EmotionDisplay::Analyzing => f.write_str("Analyzing..."),
            EmotionDisplay::Label(label) => label.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_labels() {
        assert_eq!(EmotionLabel::from_model_text("Focused"), EmotionLabel::Focused);
        assert_eq!(EmotionLabel::from_model_text("  Bored\n"), EmotionLabel::Bored);
        assert_eq!(EmotionLabel::from_model_text("\"Confused\"."), EmotionLabel::Confused);
    }

    #[test]
    fn unknown_text_becomes_error() {
        assert_eq!(EmotionLabel::from_model_text("Happy"), EmotionLabel::Error);
        assert_eq!(EmotionLabel::from_model_text(""), EmotionLabel::Error);
        // The sentinel itself is not something a classifier may return.
        assert_eq!(EmotionLabel::from_model_text("Error"), EmotionLabel::Error);
        assert!("Error".parse::<EmotionLabel>().is_err());
    }

    #[test]
    fn disengaged_set() {
        assert!(!EmotionLabel::Focused.is_disengaged());
        assert!(!EmotionLabel::Error.is_disengaged());
        assert!(EmotionLabel::Confused.is_disengaged());
        assert!(EmotionLabel::Bored.is_disengaged());
        assert!(EmotionLabel::Frustrated.is_disengaged());
    }

    #[test]
    fn display_text() {
        assert_eq!(EmotionDisplay::default().to_string(), "Not Tracking");
        assert_eq!(EmotionDisplay::Label(EmotionLabel::Bored).to_string(), "Bored");
    }
}
