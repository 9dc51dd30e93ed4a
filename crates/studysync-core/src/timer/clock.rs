//! Session countdown clock.
//!
//! The clock is a tick-driven state machine. It does not use internal
//! threads - the caller invokes `tick()` once per elapsed second while the
//! clock is running, which keeps remaining time exact to the second across
//! any number of pauses.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            v
//!        Complete  (terminal until reset)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    Idle,
    Running,
    Paused,
    /// Reached zero. Only `reset` leaves this state.
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClock {
    duration_secs: u64,
    remaining_secs: u64,
    state: ClockState,
}

impl SessionClock {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration_secs,
            remaining_secs: duration_secs,
            state: ClockState::Idle,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn is_complete(&self) -> bool {
        self.state == ClockState::Complete
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.duration_secs - self.remaining_secs
    }

    /// 0.0 .. 100.0 progress through the session.
    pub fn progress_pct(&self) -> f64 {
        if self.duration_secs == 0 {
            return 100.0;
        }
        self.elapsed_secs() as f64 / self.duration_secs as f64 * 100.0
    }

    /// `MM:SS` for display.
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// No-op while running or once the clock has hit zero.
    pub fn start(&mut self) -> Option<Event> {
        if self.state == ClockState::Running || self.remaining_secs == 0 {
            return None;
        }
        self.state = ClockState::Running;
        Some(Event::ClockStarted {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != ClockState::Running {
            return None;
        }
        self.state = ClockState::Paused;
        Some(Event::ClockPaused {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn reset(&mut self, duration_secs: u64) -> Event {
        self.duration_secs = duration_secs;
        self.remaining_secs = duration_secs;
        self.state = ClockState::Idle;
        Event::ClockReset {
            duration_secs,
            at: Utc::now(),
        }
    }

    /// Call once per elapsed second. Returns `ClockCompleted` exactly once,
    /// on the tick that reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != ClockState::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = ClockState::Complete;
            return Some(Event::ClockCompleted {
                duration_secs: self.duration_secs,
                at: Utc::now(),
            });
        }
        Some(Event::ClockTicked {
            remaining_secs: self.remaining_secs,
        })
    }
}
