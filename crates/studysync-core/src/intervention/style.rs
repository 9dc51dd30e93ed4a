use serde::{Deserialize, Serialize};

use super::gate::InterventionKind;

/// Which kind of help a triggered intervention offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionStyle {
    /// Motivational message plus a simplified explanation from the model.
    #[default]
    Explanation,
    /// One practice question from the lecture.
    Quiz,
    /// Explanation first, then quiz, then explanation...
    Alternate,
}

impl InterventionStyle {
    /// `nth` is the 1-based trigger count. Quiz falls back to an explanation
    /// when the lecture has no practice questions.
    pub fn pick(self, nth: u32, has_questions: bool) -> InterventionKind {
        let wanted = match self {
            InterventionStyle::Explanation => InterventionKind::Explanation,
            InterventionStyle::Quiz => InterventionKind::Quiz,
            InterventionStyle::Alternate if nth % 2 == 0 => InterventionKind::Quiz,
            InterventionStyle::Alternate => InterventionKind::Explanation,
        };
        if wanted == InterventionKind::Quiz && !has_questions {
            InterventionKind::Explanation
        } else {
            wanted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_switches_kinds() {
        let style = InterventionStyle::Alternate;
        assert_eq!(style.pick(1, true), InterventionKind::Explanation);
        assert_eq!(style.pick(2, true), InterventionKind::Quiz);
        assert_eq!(style.pick(3, true), InterventionKind::Explanation);
    }

    #[test]
    fn quiz_without_questions_explains() {
        assert_eq!(InterventionStyle::Quiz.pick(1, false), InterventionKind::Explanation);
        assert_eq!(InterventionStyle::Quiz.pick(1, true), InterventionKind::Quiz);
    }
}
