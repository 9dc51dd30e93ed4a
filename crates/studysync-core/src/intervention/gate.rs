//! Adaptive intervention gate.
//!
//! Decides when a disengaged learner gets interrupted with help. The gate
//! enforces two guards regardless of how often qualifying emotion samples
//! arrive:
//!
//! - **Single flight**: at most one intervention loading or on screen.
//! - **Cooldown**: a minimum wall-clock gap between triggers.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Loading -> Active -> Idle
//!            |                  ^
//!            +---- failure -----+
//! ```
//!
//! The gate does not own the session clock. Callers pause the clock when
//! [`GateDecision::Trigger`] comes back and resume it whenever a transition
//! reports `resume_clock`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::EmotionLabel;
use crate::lecture::QuizQuestion;

pub const DEFAULT_COOLDOWN_SECS: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionKind {
    Explanation,
    Quiz,
}

/// Content presented to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum InterventionPayload {
    Explanation(String),
    Quiz(QuizQuestion),
}

impl InterventionPayload {
    pub fn kind(&self) -> InterventionKind {
        match self {
            InterventionPayload::Explanation(_) => InterventionKind::Explanation,
            InterventionPayload::Quiz(_) => InterventionKind::Quiz,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum InterventionState {
    Idle,
    Loading {
        request_id: u64,
        emotion: EmotionLabel,
        requested_at: DateTime<Utc>,
    },
    Active {
        request_id: u64,
        payload: InterventionPayload,
        shown_at: DateTime<Utc>,
    },
}

/// Identifies one remediation round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterventionRequest {
    pub id: u64,
    pub emotion: EmotionLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    ClockNotRunning,
    /// Already loading or showing one.
    Busy,
    CoolingDown { remaining_ms: i64 },
    /// Label is `Focused` or `Error`.
    Engaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Trigger(InterventionRequest),
    Suppressed(SuppressReason),
}

/// Outcome of feeding a remediation result back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Content is on screen; the clock stays paused.
    Presented,
    /// Remediation failed; the clock must resume.
    FailedOpen,
    /// The request was cancelled or superseded; ignore it.
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionGate {
    state: InterventionState,
    #[serde(with = "cooldown_ms")]
    cooldown: Duration,
    last_triggered_at: Option<DateTime<Utc>>,
    next_request_id: u64,
    triggered_count: u32,
}

impl Default for InterventionGate {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

impl InterventionGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: InterventionState::Idle,
            cooldown,
            last_triggered_at: None,
            next_request_id: 1,
            triggered_count: 0,
        }
    }

    pub fn state(&self) -> &InterventionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == InterventionState::Idle
    }

    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    /// Number of interventions fired since the last reset.
    pub fn triggered_count(&self) -> u32 {
        self.triggered_count
    }

    /// Consider a new stable emotion label. On `Trigger` the gate is already
    /// `Loading` and the cooldown has restarted at `now`.
    pub fn evaluate(
        &mut self,
        emotion: EmotionLabel,
        clock_running: bool,
        now: DateTime<Utc>,
    ) -> GateDecision {
        if let Some(last) = self.last_triggered_at {
            let since = now - last;
            if since < self.cooldown {
                return GateDecision::Suppressed(SuppressReason::CoolingDown {
                    remaining_ms: (self.cooldown - since).num_milliseconds(),
                });
            }
        }
        if !clock_running {
            return GateDecision::Suppressed(SuppressReason::ClockNotRunning);
        }
        if !self.is_idle() {
            return GateDecision::Suppressed(SuppressReason::Busy);
        }
        if !emotion.is_disengaged() {
            return GateDecision::Suppressed(SuppressReason::Engaged);
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        self.last_triggered_at = Some(now);
        self.triggered_count += 1;
        self.state = InterventionState::Loading {
            request_id: id,
            emotion,
            requested_at: now,
        };
        GateDecision::Trigger(InterventionRequest { id, emotion })
    }

    /// Feed back the remediation result for `request_id`.
    pub fn resolve(
        &mut self,
        request_id: u64,
        result: Option<InterventionPayload>,
        now: DateTime<Utc>,
    ) -> Resolution {
        match &self.state {
            InterventionState::Loading { request_id: pending, .. } if *pending == request_id => {}
            _ => return Resolution::Stale,
        }

        match result {
            Some(payload) => {
                self.state = InterventionState::Active {
                    request_id,
                    payload,
                    shown_at: now,
                };
                Resolution::Presented
            }
            None => {
                self.state = InterventionState::Idle;
                Resolution::FailedOpen
            }
        }
    }

    /// Learner closed the intervention. Returns true if the clock should
    /// resume, which is the case whenever something was loading or shown.
    pub fn dismiss(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        self.state = InterventionState::Idle;
        true
    }

    /// Drop everything, including the cooldown.
    pub fn reset(&mut self) {
        self.state = InterventionState::Idle;
        self.last_triggered_at = None;
        self.triggered_count = 0;
    }
}

mod cooldown_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::milliseconds)
    }
}
