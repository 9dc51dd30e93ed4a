//! Focus session composition.
//!
//! The controller wires the countdown clock, the focus monitor, the emotion
//! sampler and the intervention gate together. Every method is synchronous
//! and returns the events it produced; the async runner owns the timers,
//! the camera and the remote calls and feeds their results back in here.
//!
//! ## Control flow
//!
//! ```text
//! tick ───────────────> clock
//! visibility ─────────> monitor ── switch score, banner
//! capture result ─────> sampler ── stable label ──> gate ── pause clock
//! remediation result ─> gate ── Active, or Idle + resume clock
//! dismiss ────────────> gate ── resume clock
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::emotion::{
    CaptureSkip, CaptureTicket, EmotionDisplay, EmotionLabel, EmotionSample, EmotionSampler,
};
use crate::events::Event;
use crate::focus::{AlertSound, FocusMonitor, Visibility};
use crate::intervention::{
    GateDecision, InterventionGate, InterventionKind, InterventionPayload, InterventionState,
    InterventionStyle, Resolution,
};
use crate::lecture::{Lecture, QuizQuestion};
use crate::remote::LectureContext;
use crate::storage::FocusSessionRecord;
use crate::timer::{ClockState, SessionClock};

/// Tunables for one session, usually built from [`crate::Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub duration_secs: u64,
    pub tick_interval: Duration,
    pub banner_duration: Duration,
    pub alert_enabled: bool,
    pub penalty_per_switch: u32,
    pub capture_interval: Duration,
    pub capture_timeout: Duration,
    pub history_len: usize,
    pub cooldown: chrono::Duration,
    pub style: InterventionStyle,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: 25 * 60,
            tick_interval: Duration::from_secs(1),
            banner_duration: Duration::from_secs(crate::focus::DEFAULT_BANNER_SECS),
            alert_enabled: true,
            penalty_per_switch: crate::focus::DEFAULT_PENALTY_PER_SWITCH,
            capture_interval: Duration::from_secs(5),
            capture_timeout: Duration::from_secs(10),
            history_len: crate::emotion::DEFAULT_HISTORY_LEN,
            cooldown: chrono::Duration::seconds(crate::intervention::DEFAULT_COOLDOWN_SECS),
            style: InterventionStyle::default(),
        }
    }
}

/// A remediation call the runner must make on the gate's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationRequest {
    pub request_id: u64,
    pub context: LectureContext,
}

/// Point-in-time view of the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub clock_state: ClockState,
    pub remaining_secs: u64,
    pub remaining_display: String,
    pub switch_score: u32,
    pub focus_score: u32,
    pub banner_visible: bool,
    /// False until the clock has been started once.
    pub started: bool,
    pub tracking: bool,
    pub emotion: EmotionDisplay,
    pub last_sample: Option<EmotionSample>,
    pub stable_emotion: Option<EmotionLabel>,
    pub intervention: InterventionState,
    pub interventions: u32,
}

pub struct SessionController {
    settings: SessionSettings,
    clock: SessionClock,
    monitor: FocusMonitor,
    sampler: EmotionSampler,
    gate: InterventionGate,
    lecture_id: Option<String>,
    context: Option<LectureContext>,
    questions: Vec<QuizQuestion>,
    started_at: Option<DateTime<Utc>>,
    focused_secs: u64,
}

impl SessionController {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            clock: SessionClock::new(settings.duration_secs),
            monitor: FocusMonitor::new(settings.banner_duration, settings.penalty_per_switch)
                .with_alert(settings.alert_enabled),
            sampler: EmotionSampler::new(settings.history_len),
            gate: InterventionGate::new(settings.cooldown),
            settings,
            lecture_id: None,
            context: None,
            questions: Vec::new(),
            started_at: None,
            focused_secs: 0,
        }
    }

    /// Study this lecture. Interventions need a processed lecture to draw on.
    pub fn with_lecture(mut self, lecture: &Lecture) -> Self {
        self.lecture_id = Some(lecture.id.clone());
        self.context = LectureContext::from_lecture(lecture);
        self.questions = lecture.practice_questions().to_vec();
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn monitor(&self) -> &FocusMonitor {
        &self.monitor
    }

    pub fn sampler(&self) -> &EmotionSampler {
        &self.sampler
    }

    pub fn gate(&self) -> &InterventionGate {
        &self.gate
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn is_tracking(&self) -> bool {
        self.sampler.is_tracking()
    }

    pub fn banner_deadline(&self) -> Option<Instant> {
        self.monitor.banner_deadline()
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            clock_state: self.clock.state(),
            remaining_secs: self.clock.remaining_secs(),
            remaining_display: self.clock.display(),
            switch_score: self.monitor.switch_score(),
            focus_score: self.monitor.focus_score(),
            banner_visible: self.monitor.banner_visible(now),
            started: self.has_started(),
            tracking: self.sampler.is_tracking(),
            emotion: self.sampler.display(),
            last_sample: self.sampler.last_sample(),
            stable_emotion: self.sampler.stable_label(),
            intervention: self.gate.state().clone(),
            interventions: self.gate.triggered_count(),
        }
    }

    /// Summary row for the focus history.
    pub fn record(&self, ended_at: DateTime<Utc>) -> FocusSessionRecord {
        FocusSessionRecord {
            id: 0,
            lecture_id: self.lecture_id.clone(),
            planned_secs: self.clock.duration_secs(),
            focused_secs: self.focused_secs,
            switch_score: self.monitor.switch_score(),
            focus_score: self.monitor.focus_score(),
            interventions: self.gate.triggered_count(),
            completed: self.clock.is_complete(),
            started_at: self.started_at.unwrap_or(ended_at),
            ended_at,
        }
    }

    /// True once the clock has been started at least once.
    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    // ── Clock ────────────────────────────────────────────────────────

    /// Ignored while an intervention is loading or on screen; dismissing it
    /// resumes the clock.
    pub fn start(&mut self) -> Vec<Event> {
        if !self.gate.is_idle() {
            debug!("start ignored: intervention in progress");
            return Vec::new();
        }
        let event = self.clock.start();
        if event.is_some() && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        event.into_iter().collect()
    }

    pub fn pause(&mut self) -> Vec<Event> {
        self.clock.pause().into_iter().collect()
    }

    /// Back to a full, stopped clock. Clears the switch score, the banner,
    /// any intervention and its cooldown. Tracking is switched off, which
    /// also clears the emotion history.
    pub fn reset(&mut self) -> Vec<Event> {
        let mut events = vec![self.clock.reset(self.settings.duration_secs)];
        self.monitor.reset();
        if !self.gate.is_idle() {
            events.push(Event::InterventionDismissed { at: Utc::now() });
        }
        self.gate.reset();
        if self.sampler.disable() {
            events.push(Event::TrackingDisabled { at: Utc::now() });
        }
        self.started_at = None;
        self.focused_secs = 0;
        events
    }

    /// One elapsed second.
    pub fn tick(&mut self) -> Vec<Event> {
        let event = self.clock.tick();
        if event.is_some() {
            self.focused_secs += 1;
        }
        if let Some(Event::ClockCompleted { .. }) = &event {
            info!("session complete, focus score {}", self.monitor.focus_score());
        }
        event.into_iter().collect()
    }

    // ── Focus ────────────────────────────────────────────────────────

    pub fn set_visibility(
        &mut self,
        visibility: Visibility,
        now: Instant,
        alert: &mut dyn AlertSound,
    ) -> Vec<Event> {
        let running = self.clock.is_running();
        let (_, events) = self.monitor.observe(visibility, running, now, alert);
        events
    }

    pub fn expire_banner(&mut self, now: Instant) -> Vec<Event> {
        self.monitor.expire_banner(now).into_iter().collect()
    }

    // ── Emotion ──────────────────────────────────────────────────────

    pub fn enable_tracking(&mut self) -> Vec<Event> {
        if self.sampler.enable() {
            vec![Event::TrackingEnabled { at: Utc::now() }]
        } else {
            Vec::new()
        }
    }

    pub fn disable_tracking(&mut self) -> Vec<Event> {
        if self.sampler.disable() {
            vec![Event::TrackingDisabled { at: Utc::now() }]
        } else {
            Vec::new()
        }
    }

    /// The camera failed; switch tracking off and tell the learner.
    pub fn tracking_failed(&mut self, message: impl Into<String>) -> Vec<Event> {
        self.sampler.disable();
        vec![Event::TrackingFailed {
            message: message.into(),
            at: Utc::now(),
        }]
    }

    pub fn begin_capture(&mut self) -> Result<CaptureTicket, CaptureSkip> {
        self.sampler.begin_capture()
    }

    /// Fold a classification in and run the gate on the new stable label.
    ///
    /// `label` is `None` when capture or classification failed.
    pub fn complete_capture(
        &mut self,
        ticket: CaptureTicket,
        label: Option<EmotionLabel>,
        now: DateTime<Utc>,
    ) -> (Vec<Event>, Option<RemediationRequest>) {
        if !self.sampler.is_current(ticket) {
            debug!("dropping classification from a previous tracking run");
            return (Vec::new(), None);
        }
        let stable = self.sampler.complete(ticket, label, now);
        let sampled = match label {
            Some(label) => label,
            None => EmotionLabel::Error,
        };

        let mut events = vec![Event::EmotionSampled {
            label: sampled,
            stable,
            display: self.sampler.display(),
            at: now,
        }];

        let Some(stable) = stable else {
            return (events, None);
        };
        let request = self.evaluate_gate(stable, now, &mut events);
        (events, request)
    }

    fn evaluate_gate(
        &mut self,
        emotion: EmotionLabel,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Option<RemediationRequest> {
        // Nothing to explain without processed lecture material.
        let context = self.context.clone()?;

        let request = match self.gate.evaluate(emotion, self.clock.is_running(), now) {
            GateDecision::Trigger(request) => request,
            GateDecision::Suppressed(reason) => {
                debug!("intervention suppressed for {emotion}: {reason:?}");
                return None;
            }
        };

        events.extend(self.clock.pause());
        let nth = self.gate.triggered_count();
        let kind = self.settings.style.pick(nth, !self.questions.is_empty());
        info!("intervention #{nth} ({kind:?}) for {emotion}");
        events.push(Event::InterventionRequested {
            request_id: request.id,
            emotion,
            kind,
            at: now,
        });

        match kind {
            InterventionKind::Explanation => Some(RemediationRequest {
                request_id: request.id,
                context,
            }),
            InterventionKind::Quiz => {
                let index = (nth as usize).saturating_sub(1) % self.questions.len().max(1);
                let payload = self
                    .questions
                    .get(index)
                    .cloned()
                    .map(InterventionPayload::Quiz);
                events.extend(self.apply_resolution(request.id, payload, now));
                None
            }
        }
    }

    /// Feed back the remediation text for `request_id`; `None` on failure.
    pub fn resolve_remediation(
        &mut self,
        request_id: u64,
        text: Option<String>,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let payload = text
            .filter(|t| !t.trim().is_empty())
            .map(InterventionPayload::Explanation);
        self.apply_resolution(request_id, payload, now)
    }

    fn apply_resolution(
        &mut self,
        request_id: u64,
        payload: Option<InterventionPayload>,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let shown = payload.clone();
        match self.gate.resolve(request_id, payload, now) {
            Resolution::Presented => shown
                .map(|payload| Event::InterventionShown {
                    request_id,
                    payload,
                    at: now,
                })
                .into_iter()
                .collect(),
            Resolution::FailedOpen => {
                let mut events = vec![Event::InterventionFailed { request_id, at: now }];
                events.extend(self.clock.start());
                events
            }
            Resolution::Stale => {
                debug!("dropping stale remediation {request_id}");
                Vec::new()
            }
        }
    }

    /// Learner closed the intervention; the clock picks up where it stopped.
    pub fn dismiss(&mut self) -> Vec<Event> {
        if !self.gate.dismiss() {
            return Vec::new();
        }
        let mut events = vec![Event::InterventionDismissed { at: Utc::now() }];
        events.extend(self.clock.start());
        events
    }

    /// Final event for the event stream.
    pub fn end(&self, at: DateTime<Utc>) -> Event {
        Event::SessionEnded {
            focused_secs: self.focused_secs,
            switch_score: self.monitor.switch_score(),
            focus_score: self.monitor.focus_score(),
            interventions: self.gate.triggered_count(),
            completed: self.clock.is_complete(),
            at,
        }
    }
}
