use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::{EmotionDisplay, EmotionLabel};
use crate::focus::FocusKind;
use crate::intervention::{InterventionKind, InterventionPayload};
use crate::session::SessionSnapshot;

/// Every state change in a study session produces an Event.
/// The CLI prints them as JSON lines; a GUI would render from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ClockStarted {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ClockPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ClockReset {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    ClockTicked {
        remaining_secs: u64,
    },
    /// Emitted once, on the tick that reaches zero.
    ClockCompleted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    FocusChanged {
        kind: FocusKind,
        switch_score: u32,
        at: DateTime<Utc>,
    },
    BannerShown {
        message: String,
        visible_secs: u64,
        at: DateTime<Utc>,
    },
    BannerHidden {
        at: DateTime<Utc>,
    },
    TrackingEnabled {
        at: DateTime<Utc>,
    },
    TrackingDisabled {
        at: DateTime<Utc>,
    },
    /// The camera could not be used; tracking has been switched off.
    TrackingFailed {
        message: String,
        at: DateTime<Utc>,
    },
    EmotionSampled {
        label: EmotionLabel,
        stable: Option<EmotionLabel>,
        display: EmotionDisplay,
        at: DateTime<Utc>,
    },
    InterventionRequested {
        request_id: u64,
        emotion: EmotionLabel,
        kind: InterventionKind,
        at: DateTime<Utc>,
    },
    InterventionShown {
        request_id: u64,
        payload: InterventionPayload,
        at: DateTime<Utc>,
    },
    /// Remediation failed; nothing is shown and the clock resumes.
    InterventionFailed {
        request_id: u64,
        at: DateTime<Utc>,
    },
    InterventionDismissed {
        at: DateTime<Utc>,
    },
    Status {
        snapshot: SessionSnapshot,
    },
    SessionEnded {
        focused_secs: u64,
        switch_score: u32,
        focus_score: u32,
        interventions: u32,
        completed: bool,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::FocusChanged {
            kind: FocusKind::Unfocused,
            switch_score: 2,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FocusChanged");
        assert_eq!(json["kind"], "Unfocused");
        assert_eq!(json["switch_score"], 2);
    }

    #[test]
    fn emotion_display_nests_cleanly() {
        let event = Event::EmotionSampled {
            label: EmotionLabel::Bored,
            stable: Some(EmotionLabel::Bored),
            display: EmotionDisplay::Label(EmotionLabel::Bored),
            at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Event::EmotionSampled { stable: Some(EmotionLabel::Bored), .. }));
    }
}
