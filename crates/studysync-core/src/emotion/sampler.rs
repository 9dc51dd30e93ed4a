//! Mind-mirror sampling state.
//!
//! The sampler decides whether a capture tick may run and folds classifier
//! results into the stable label. It owns no timers or devices; the session
//! runner drives it from its 5-second interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::EmotionHistory;
use super::label::{EmotionDisplay, EmotionLabel};

/// A single classifier outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub label: EmotionLabel,
    pub at: DateTime<Utc>,
}

/// Handed out by [`EmotionSampler::begin_capture`]; must be returned with the
/// result. Results carrying a ticket from before the last toggle are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTicket {
    generation: u64,
}

/// Why a capture tick did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSkip {
    NotTracking,
    InFlight,
}

#[derive(Debug, Clone)]
pub struct EmotionSampler {
    tracking: bool,
    in_flight: bool,
    generation: u64,
    history: EmotionHistory,
    display: EmotionDisplay,
    last_sample: Option<EmotionSample>,
}

impl Default for EmotionSampler {
    fn default() -> Self {
        Self::new(super::history::DEFAULT_HISTORY_LEN)
    }
}

impl EmotionSampler {
    pub fn new(history_len: usize) -> Self {
        Self {
            tracking: false,
            in_flight: false,
            generation: 0,
            history: EmotionHistory::with_capacity(history_len),
            display: EmotionDisplay::NotTracking,
            last_sample: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn history(&self) -> &EmotionHistory {
        &self.history
    }

    pub fn last_sample(&self) -> Option<EmotionSample> {
        self.last_sample
    }

    /// Stable label from the vote, if any sample has succeeded.
    pub fn stable_label(&self) -> Option<EmotionLabel> {
        self.history.stable()
    }

    /// What the learner sees right now.
    pub fn display(&self) -> EmotionDisplay {
        if self.tracking && self.in_flight {
            EmotionDisplay::Analyzing
        } else {
            self.display
        }
    }

    /// Returns false if tracking was already on.
    pub fn enable(&mut self) -> bool {
        if self.tracking {
            return false;
        }
        self.tracking = true;
        self.generation += 1;
        self.in_flight = false;
        self.display = EmotionDisplay::Neutral;
        true
    }

    /// Stop sampling and forget everything seen so far.
    ///
    /// Any request still in flight is orphaned: its ticket no longer matches.
    pub fn disable(&mut self) -> bool {
        let was_tracking = self.tracking;
        self.tracking = false;
        self.generation += 1;
        self.in_flight = false;
        self.history.clear();
        self.display = EmotionDisplay::NotTracking;
        self.last_sample = None;
        was_tracking
    }

    /// Claim the single in-flight slot for this tick.
    pub fn begin_capture(&mut self) -> Result<CaptureTicket, CaptureSkip> {
        if !self.tracking {
            return Err(CaptureSkip::NotTracking);
        }
        if self.in_flight {
            return Err(CaptureSkip::InFlight);
        }
        self.in_flight = true;
        Ok(CaptureTicket {
            generation: self.generation,
        })
    }

    /// False once tracking has been toggled since the ticket was issued.
    pub fn is_current(&self, ticket: CaptureTicket) -> bool {
        self.tracking && ticket.generation == self.generation
    }

    /// Fold a classifier outcome in.
    ///
    /// `None` means the capture or classification failed. Returns the new
    /// stable label after a successful sample, `None` for failures and stale
    /// tickets.
    pub fn complete(
        &mut self,
        ticket: CaptureTicket,
        label: Option<EmotionLabel>,
        at: DateTime<Utc>,
    ) -> Option<EmotionLabel> {
        if !self.is_current(ticket) {
            return None;
        }
        self.in_flight = false;

        match label {
            Some(label) if label != EmotionLabel::Error => {
                self.last_sample = Some(EmotionSample { label, at });
                self.history.push(label);
                let stable = self.history.stable();
                self.display = stable
                    .map(EmotionDisplay::Label)
                    .unwrap_or(EmotionDisplay::Neutral);
                stable
            }
            _ => {
                self.last_sample = Some(EmotionSample {
                    label: EmotionLabel::Error,
                    at,
                });
                self.display = EmotionDisplay::Label(EmotionLabel::Error);
                None
            }
        }
    }
}
