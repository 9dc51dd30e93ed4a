//! Foreground/background tracking for a running session.
//!
//! Every transition to hidden while the clock runs counts as a context
//! switch: the switch score goes up, an alert plays and the "stay focused"
//! banner is (re)armed for a fixed period.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::alert::AlertSound;
use crate::events::Event;

pub const DEFAULT_BANNER_SECS: u64 = 15;
pub const DEFAULT_PENALTY_PER_SWITCH: u32 = 5;

/// Host page/window visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusKind {
    Unfocused,
    Focused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusEvent {
    pub kind: FocusKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct FocusMonitor {
    visibility: Visibility,
    switch_score: u32,
    banner_deadline: Option<Instant>,
    banner_duration: Duration,
    penalty_per_switch: u32,
    alert_enabled: bool,
}

impl Default for FocusMonitor {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_BANNER_SECS),
            DEFAULT_PENALTY_PER_SWITCH,
        )
    }
}

impl FocusMonitor {
    pub fn new(banner_duration: Duration, penalty_per_switch: u32) -> Self {
        Self {
            visibility: Visibility::Visible,
            switch_score: 0,
            banner_deadline: None,
            banner_duration,
            penalty_per_switch,
            alert_enabled: true,
        }
    }

    pub fn with_alert(mut self, enabled: bool) -> Self {
        self.alert_enabled = enabled;
        self
    }

    pub fn switch_score(&self) -> u32 {
        self.switch_score
    }

    /// 100 minus a fixed penalty per switch, floored at zero.
    pub fn focus_score(&self) -> u32 {
        100u32.saturating_sub(self.switch_score.saturating_mul(self.penalty_per_switch))
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn banner_deadline(&self) -> Option<Instant> {
        self.banner_deadline
    }

    pub fn banner_visible(&self, now: Instant) -> bool {
        self.banner_deadline.is_some_and(|deadline| now < deadline)
    }

    /// Feed a visibility change. Repeated reports of the same state are ignored.
    ///
    /// Returns the observed transition (if any) and the events it produced.
    pub fn observe(
        &mut self,
        visibility: Visibility,
        session_running: bool,
        now: Instant,
        alert: &mut dyn AlertSound,
    ) -> (Option<FocusEvent>, Vec<Event>) {
        if visibility == self.visibility {
            return (None, Vec::new());
        }
        self.visibility = visibility;
        let at = Utc::now();

        let kind = match visibility {
            Visibility::Hidden => FocusKind::Unfocused,
            Visibility::Visible => FocusKind::Focused,
        };
        let focus_event = FocusEvent { kind, at };

        if kind == FocusKind::Focused || !session_running {
            return (
                Some(focus_event),
                vec![Event::FocusChanged {
                    kind,
                    switch_score: self.switch_score,
                    at,
                }],
            );
        }

        self.switch_score += 1;
        if self.alert_enabled {
            if let Err(e) = alert.play() {
                debug!("focus alert could not be played: {e}");
            }
        }
        // Replaces any banner still pending.
        self.banner_deadline = Some(now + self.banner_duration);

        (
            Some(focus_event),
            vec![
                Event::FocusChanged {
                    kind,
                    switch_score: self.switch_score,
                    at,
                },
                Event::BannerShown {
                    message: "Stay Focused! You're doing great! Keep up the momentum.".into(),
                    visible_secs: self.banner_duration.as_secs(),
                    at,
                },
            ],
        )
    }

    /// Hide the banner once its deadline has passed.
    pub fn expire_banner(&mut self, now: Instant) -> Option<Event> {
        match self.banner_deadline {
            Some(deadline) if now >= deadline => {
                self.banner_deadline = None;
                Some(Event::BannerHidden { at: Utc::now() })
            }
            _ => None,
        }
    }

    /// Clear the score and any banner. Visibility is left as observed.
    pub fn reset(&mut self) {
        self.switch_score = 0;
        self.banner_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::alert::Silent;
    use std::io;

    struct CountingAlert(u32);

    impl AlertSound for CountingAlert {
        fn play(&mut self) -> io::Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    struct BrokenAlert;

    impl AlertSound for BrokenAlert {
        fn play(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "no audio device"))
        }
    }

    #[test]
    fn unfocus_while_running_counts() {
        let mut monitor = FocusMonitor::default();
        let mut alert = CountingAlert(0);
        let now = Instant::now();

        let (event, events) = monitor.observe(Visibility::Hidden, true, now, &mut alert);
        assert_eq!(event.map(|e| e.kind), Some(FocusKind::Unfocused));
        assert_eq!(events.len(), 2);
        assert_eq!(monitor.switch_score(), 1);
        assert_eq!(alert.0, 1);
        assert!(monitor.banner_visible(now));

        monitor.observe(Visibility::Visible, true, now, &mut alert);
        monitor.observe(Visibility::Hidden, true, now, &mut alert);
        assert_eq!(monitor.switch_score(), 2);
        assert_eq!(monitor.focus_score(), 90);
    }

    #[test]
    fn unfocus_while_paused_is_ignored() {
        let mut monitor = FocusMonitor::default();
        let now = Instant::now();
        let (event, _) = monitor.observe(Visibility::Hidden, false, now, &mut Silent);
        assert!(event.is_some());
        assert_eq!(monitor.switch_score(), 0);
        assert!(!monitor.banner_visible(now));
    }

    #[test]
    fn duplicate_reports_are_not_transitions() {
        let mut monitor = FocusMonitor::default();
        let now = Instant::now();
        monitor.observe(Visibility::Hidden, true, now, &mut Silent);
        let (event, events) = monitor.observe(Visibility::Hidden, true, now, &mut Silent);
        assert!(event.is_none());
        assert!(events.is_empty());
        assert_eq!(monitor.switch_score(), 1);
    }

    #[test]
    fn banner_is_rearmed_by_each_switch() {
        let mut monitor = FocusMonitor::default();
        let start = Instant::now();
        monitor.observe(Visibility::Hidden, true, start, &mut Silent);
        monitor.observe(Visibility::Visible, true, start, &mut Silent);

        let later = start + Duration::from_secs(10);
        monitor.observe(Visibility::Hidden, true, later, &mut Silent);

        // The first deadline would have been start+15s; the second replaces it.
        assert!(monitor.expire_banner(start + Duration::from_secs(16)).is_none());
        assert!(monitor.banner_visible(start + Duration::from_secs(16)));
        assert!(monitor.expire_banner(later + Duration::from_secs(15)).is_some());
        assert!(monitor.expire_banner(later + Duration::from_secs(20)).is_none());
    }

    #[test]
    fn alert_failure_is_swallowed() {
        let mut monitor = FocusMonitor::default();
        let (_, events) = monitor.observe(Visibility::Hidden, true, Instant::now(), &mut BrokenAlert);
        assert_eq!(monitor.switch_score(), 1);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn focus_score_floors_at_zero() {
        let mut monitor = FocusMonitor::default();
        let now = Instant::now();
        for _ in 0..30 {
            monitor.observe(Visibility::Hidden, true, now, &mut Silent);
            monitor.observe(Visibility::Visible, true, now, &mut Silent);
        }
        assert_eq!(monitor.switch_score(), 30);
        assert_eq!(monitor.focus_score(), 0);
    }

    #[test]
    fn reset_clears_score_and_banner() {
        let mut monitor = FocusMonitor::default();
        let now = Instant::now();
        monitor.observe(Visibility::Hidden, true, now, &mut Silent);
        monitor.reset();
        assert_eq!(monitor.switch_score(), 0);
        assert!(!monitor.banner_visible(now));
    }
}
