//! Async session driver.
//!
//! A single task multiplexes the three event sources of a study session
//! with `tokio::select!`: the per-second clock tick, the capture tick and
//! learner commands. Frame grabs run on the blocking pool; classification
//! and remediation calls run as spawned tasks. All of them report back over
//! an internal channel, so the loop itself never blocks on disk or network.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::{RemediationRequest, SessionController};
use crate::emotion::{CaptureTicket, EmotionLabel, FrameSource};
use crate::error::DeviceError;
use crate::events::Event;
use crate::focus::{AlertSound, Visibility};
use crate::remote::{EmotionClassifier, Remediator};
use crate::storage::FocusSessionRecord;

/// Learner input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Pause,
    Reset,
    Visibility(Visibility),
    Track(bool),
    Dismiss,
    Status,
    Stop,
}

enum Completion {
    Classified {
        ticket: CaptureTicket,
        label: Option<EmotionLabel>,
    },
    CameraFailed {
        ticket: CaptureTicket,
        error: DeviceError,
    },
    Remediated {
        request_id: u64,
        text: Option<String>,
    },
}

type SharedCamera = Arc<Mutex<Box<dyn FrameSource>>>;

fn lock_camera(camera: &Mutex<Box<dyn FrameSource>>) -> MutexGuard<'_, Box<dyn FrameSource>> {
    camera.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `None` while a frame grab holds the device.
fn try_lock_camera(
    camera: &Mutex<Box<dyn FrameSource>>,
) -> Option<MutexGuard<'_, Box<dyn FrameSource>>> {
    match camera.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

pub struct SessionRunner {
    controller: SessionController,
    camera: SharedCamera,
    alert: Box<dyn AlertSound>,
    classifier: Arc<dyn EmotionClassifier>,
    remediator: Arc<dyn Remediator>,
}

impl SessionRunner {
    pub fn new(
        controller: SessionController,
        camera: Box<dyn FrameSource>,
        alert: Box<dyn AlertSound>,
        classifier: Arc<dyn EmotionClassifier>,
        remediator: Arc<dyn Remediator>,
    ) -> Self {
        Self {
            controller,
            camera: Arc::new(Mutex::new(camera)),
            alert,
            classifier,
            remediator,
        }
    }

    /// Drive the session until `Stop`, the command channel closes or `cancel`
    /// fires. Ends with a `SessionEnded` event and returns the summary row.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::UnboundedSender<Event>,
        cancel: CancellationToken,
    ) -> FocusSessionRecord {
        let settings = self.controller.settings().clone();
        let mut ticker = interval(settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut capture = interval(settings.capture_interval);
        capture.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();

        let emit = |batch: Vec<Event>| {
            for event in batch {
                if events.send(event).is_err() {
                    debug!("event receiver dropped");
                }
            }
        };

        loop {
            let was_running = self.controller.is_running();
            let was_tracking = self.controller.is_tracking();
            let banner = self.controller.banner_deadline().map(Instant::from_std);

            tokio::select! {
                _ = cancel.cancelled() => break,

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if command == SessionCommand::Stop {
                        break;
                    }
                    emit(self.handle(command));
                }

                _ = ticker.tick(), if was_running => {
                    emit(self.controller.tick());
                }

                _ = capture.tick(), if was_tracking => {
                    self.capture(&done_tx, settings.capture_timeout);
                }

                _ = sleep_until(banner.unwrap_or_else(Instant::now)), if banner.is_some() => {
                    emit(self.controller.expire_banner(Instant::now().into_std()));
                }

                Some(done) = done_rx.recv() => {
                    match done {
                        Completion::Classified { ticket, label } => {
                            let (batch, request) =
                                self.controller.complete_capture(ticket, label, Utc::now());
                            emit(batch);
                            if let Some(request) = request {
                                self.remediate(request, &done_tx);
                            }
                        }
                        Completion::CameraFailed { ticket, error } => {
                            if self.controller.sampler().is_current(ticket) {
                                warn!("camera failed, disabling tracking: {error}");
                                lock_camera(&self.camera).release();
                                emit(self.controller.tracking_failed(error.to_string()));
                            } else {
                                debug!("late camera failure ignored: {error}");
                            }
                        }
                        Completion::Remediated { request_id, text } => {
                            emit(self.controller.resolve_remediation(request_id, text, Utc::now()));
                        }
                    }
                }
            }

            // Ticks restart a full period after every resume, so a second is
            // never cut short and none are owed for the paused stretch.
            if !was_running && self.controller.is_running() {
                ticker.reset();
            }
            if !was_tracking && self.controller.is_tracking() {
                capture.reset();
            }
            // A grab in progress keeps the lock; its completion wakes the
            // loop again and the release happens then.
            if !self.controller.is_tracking() {
                if let Some(mut camera) = try_lock_camera(&self.camera) {
                    if camera.is_open() {
                        camera.release();
                        debug!("camera released");
                    }
                }
            }
        }

        {
            let mut camera = lock_camera(&self.camera);
            if camera.is_open() {
                camera.release();
            }
        }
        let ended_at = Utc::now();
        emit(vec![self.controller.end(ended_at)]);
        self.controller.record(ended_at)
    }

    fn handle(&mut self, command: SessionCommand) -> Vec<Event> {
        match command {
            SessionCommand::Start => self.controller.start(),
            SessionCommand::Pause => self.controller.pause(),
            SessionCommand::Reset => self.controller.reset(),
            SessionCommand::Visibility(v) => {
                self.controller
                    .set_visibility(v, Instant::now().into_std(), self.alert.as_mut())
            }
            SessionCommand::Track(true) => {
                if self.controller.is_tracking() {
                    return Vec::new();
                }
                let opened = lock_camera(&self.camera).open();
                match opened {
                    Ok(()) => self.controller.enable_tracking(),
                    Err(e) => {
                        warn!("camera unavailable: {e}");
                        self.controller.tracking_failed(e.to_string())
                    }
                }
            }
            SessionCommand::Track(false) => self.controller.disable_tracking(),
            SessionCommand::Dismiss => self.controller.dismiss(),
            SessionCommand::Status => vec![Event::Status {
                snapshot: self.controller.snapshot(Instant::now().into_std()),
            }],
            SessionCommand::Stop => Vec::new(),
        }
    }

    /// One capture tick. The frame is grabbed on the blocking pool, then
    /// classified with `timeout`; the outcome arrives as a [`Completion`].
    fn capture(&mut self, done: &mpsc::UnboundedSender<Completion>, timeout: Duration) {
        let ticket = match self.controller.begin_capture() {
            Ok(ticket) => ticket,
            Err(skip) => {
                debug!("capture tick skipped: {skip:?}");
                return;
            }
        };

        let camera = Arc::clone(&self.camera);
        let classifier = Arc::clone(&self.classifier);
        let done = done.clone();
        tokio::spawn(async move {
            let grabbed = tokio::task::spawn_blocking(move || lock_camera(&camera).capture()).await;
            let frame = match grabbed {
                Ok(Ok(frame)) => frame,
                Ok(Err(e @ DeviceError::CaptureFailed(_))) => {
                    // A missing frame is a failed sample, not a dead camera.
                    debug!("no frame this tick: {e}");
                    let _ = done.send(Completion::Classified { ticket, label: None });
                    return;
                }
                Ok(Err(error)) => {
                    let _ = done.send(Completion::CameraFailed { ticket, error });
                    return;
                }
                Err(e) => {
                    warn!("frame grab did not finish: {e}");
                    let _ = done.send(Completion::Classified { ticket, label: None });
                    return;
                }
            };

            let label = match tokio::time::timeout(timeout, classifier.classify_frame(&frame)).await {
                Ok(Ok(label)) => Some(label),
                Ok(Err(e)) => {
                    warn!("emotion classification failed: {e}");
                    None
                }
                Err(_) => {
                    warn!("emotion classification timed out after {}s", timeout.as_secs());
                    None
                }
            };
            let _ = done.send(Completion::Classified { ticket, label });
        });
    }

    fn remediate(&self, request: RemediationRequest, done: &mpsc::UnboundedSender<Completion>) {
        let remediator = Arc::clone(&self.remediator);
        let done = done.clone();
        tokio::spawn(async move {
            let text = match remediator.remediation(&request.context).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("remediation failed, resuming session: {e}");
                    None
                }
            };
            let _ = done.send(Completion::Remediated {
                request_id: request.request_id,
                text,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::Frame;
    use crate::error::RemoteError;
    use crate::focus::Silent;
    use crate::lecture::{Lecture, ProcessedLectureData};
    use crate::remote::LectureContext;
    use crate::session::SessionSettings;
    use crate::timer::ClockState;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread::ThreadId;

    #[derive(Clone, Default)]
    struct FakeCamera {
        open: Arc<AtomicBool>,
        deny: bool,
        unplug: bool,
        grabbed_on: Arc<Mutex<Option<ThreadId>>>,
    }

    impl FrameSource for FakeCamera {
        fn open(&mut self) -> Result<(), DeviceError> {
            if self.deny {
                return Err(DeviceError::PermissionDenied("denied".into()));
            }
            self.open.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn capture(&mut self) -> Result<Frame, DeviceError> {
            *self.grabbed_on.lock().unwrap() = Some(std::thread::current().id());
            if self.unplug {
                return Err(DeviceError::Unavailable("unplugged".into()));
            }
            Ok(Frame {
                bytes: vec![1, 2, 3],
                mime_type: "image/jpeg",
                captured_at: Utc::now(),
            })
        }

        fn release(&mut self) {
            self.open.store(false, Ordering::SeqCst);
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    struct FixedClassifier {
        label: EmotionLabel,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmotionClassifier for FixedClassifier {
        async fn classify_frame(&self, _frame: &Frame) -> Result<EmotionLabel, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.label)
        }
    }

    struct FailingRemediator;

    #[async_trait]
    impl Remediator for FailingRemediator {
        async fn remediation(&self, _context: &LectureContext) -> Result<String, RemoteError> {
            Err(RemoteError::Status {
                status: 503,
                message: "unavailable".into(),
            })
        }
    }

    fn lecture() -> Lecture {
        let mut l = Lecture::new("Cell Biology", NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), None);
        l.mark_processed(ProcessedLectureData {
            summary: "Cells.".into(),
            key_concepts: vec!["ATP".into()],
            ..Default::default()
        });
        l
    }

    struct Harness {
        commands: mpsc::Sender<SessionCommand>,
        events: mpsc::UnboundedReceiver<Event>,
        handle: tokio::task::JoinHandle<FocusSessionRecord>,
        camera_open: Arc<AtomicBool>,
    }

    fn spawn(settings: SessionSettings, camera: FakeCamera, classifier: Arc<FixedClassifier>) -> Harness {
        let camera_open = Arc::clone(&camera.open);
        let controller = SessionController::new(settings).with_lecture(&lecture());
        let runner = SessionRunner::new(
            controller,
            Box::new(camera),
            Box::new(Silent),
            classifier,
            Arc::new(FailingRemediator),
        );
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(runner.run(cmd_rx, ev_tx, CancellationToken::new()));
        Harness {
            commands: cmd_tx,
            events: ev_rx,
            handle,
            camera_open,
        }
    }

    fn classifier(label: EmotionLabel, delay: Duration) -> Arc<FixedClassifier> {
        Arc::new(FixedClassifier {
            label,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_and_none_while_paused() {
        let mut h = spawn(
            SessionSettings { duration_secs: 10, ..Default::default() },
            FakeCamera::default(),
            classifier(EmotionLabel::Focused, Duration::ZERO),
        );
        h.commands.send(SessionCommand::Start).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        h.commands.send(SessionCommand::Pause).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        h.commands.send(SessionCommand::Stop).await.unwrap();

        let record = h.handle.await.unwrap();
        assert_eq!(record.focused_secs, 3);
        let ticks = drain(&mut h.events)
            .into_iter()
            .filter(|e| matches!(e, Event::ClockTicked { .. }))
            .count();
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_once_and_stays_complete() {
        let mut h = spawn(
            SessionSettings { duration_secs: 2, ..Default::default() },
            FakeCamera::default(),
            classifier(EmotionLabel::Focused, Duration::ZERO),
        );
        h.commands.send(SessionCommand::Start).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        h.commands.send(SessionCommand::Stop).await.unwrap();

        let record = h.handle.await.unwrap();
        assert!(record.completed);
        assert_eq!(record.focused_secs, 2);
        let completions = drain(&mut h.events)
            .into_iter()
            .filter(|e| matches!(e, Event::ClockCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_skips_ticks_while_classifying() {
        // Classification takes 12 s, spanning two further capture ticks.
        let slow = classifier(EmotionLabel::Focused, Duration::from_secs(12));
        let h = spawn(SessionSettings::default(), FakeCamera::default(), Arc::clone(&slow));
        h.commands.send(SessionCommand::Track(true)).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(14_500)).await;
        h.commands.send(SessionCommand::Stop).await.unwrap();
        h.handle.await.unwrap();

        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remediation_failure_resumes_clock() {
        let mut h = spawn(
            SessionSettings::default(),
            FakeCamera::default(),
            classifier(EmotionLabel::Frustrated, Duration::ZERO),
        );
        h.commands.send(SessionCommand::Track(true)).await.unwrap();
        h.commands.send(SessionCommand::Start).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(5500)).await;
        settle().await;

        let events = drain(&mut h.events);
        assert!(events.iter().any(|e| matches!(e, Event::InterventionRequested { .. })));
        assert!(events.iter().any(|e| matches!(e, Event::InterventionFailed { .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::InterventionShown { .. })));

        h.commands.send(SessionCommand::Status).await.unwrap();
        settle().await;
        let status = drain(&mut h.events)
            .into_iter()
            .find_map(|e| match e {
                Event::Status { snapshot } => Some(snapshot),
                _ => None,
            })
            .unwrap();
        assert_eq!(status.clock_state, ClockState::Running);

        h.commands.send(SessionCommand::Stop).await.unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_tracking_mid_capture_releases_camera() {
        let mut h = spawn(
            SessionSettings::default(),
            FakeCamera::default(),
            classifier(EmotionLabel::Bored, Duration::from_secs(3)),
        );
        h.commands.send(SessionCommand::Track(true)).await.unwrap();
        settle().await;
        assert!(h.camera_open.load(Ordering::SeqCst));

        // First capture at 5 s; disable while the classifier is still busy.
        tokio::time::sleep(Duration::from_millis(6000)).await;
        h.commands.send(SessionCommand::Track(false)).await.unwrap();
        settle().await;
        assert!(!h.camera_open.load(Ordering::SeqCst));

        h.commands.send(SessionCommand::Status).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let events = drain(&mut h.events);
        assert!(!events.iter().any(|e| matches!(e, Event::EmotionSampled { .. })));
        let status = events
            .into_iter()
            .find_map(|e| match e {
                Event::Status { snapshot } => Some(snapshot),
                _ => None,
            })
            .unwrap();
        assert_eq!(status.emotion.to_string(), "Not Tracking");

        h.commands.send(SessionCommand::Stop).await.unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn camera_permission_denied_disables_tracking() {
        let mut h = spawn(
            SessionSettings::default(),
            FakeCamera { deny: true, ..Default::default() },
            classifier(EmotionLabel::Focused, Duration::ZERO),
        );
        h.commands.send(SessionCommand::Track(true)).await.unwrap();
        h.commands.send(SessionCommand::Stop).await.unwrap();
        h.handle.await.unwrap();

        let events = drain(&mut h.events);
        assert!(matches!(events.first(), Some(Event::TrackingFailed { .. })));
        assert!(matches!(events.last(), Some(Event::SessionEnded { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn banner_hides_after_its_duration() {
        let mut h = spawn(
            SessionSettings::default(),
            FakeCamera::default(),
            classifier(EmotionLabel::Focused, Duration::ZERO),
        );
        h.commands.send(SessionCommand::Start).await.unwrap();
        h.commands.send(SessionCommand::Visibility(Visibility::Hidden)).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(14)).await;
        assert!(!drain(&mut h.events).iter().any(|e| matches!(e, Event::BannerHidden { .. })));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(drain(&mut h.events).iter().any(|e| matches!(e, Event::BannerHidden { .. })));

        h.commands.send(SessionCommand::Stop).await.unwrap();
        let record = h.handle.await.unwrap();
        assert_eq!(record.switch_score, 1);
        assert_eq!(record.focus_score, 95);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_are_grabbed_off_the_session_thread() {
        let camera = FakeCamera::default();
        let grabbed_on = Arc::clone(&camera.grabbed_on);
        let h = spawn(
            SessionSettings::default(),
            camera,
            classifier(EmotionLabel::Focused, Duration::ZERO),
        );
        h.commands.send(SessionCommand::Track(true)).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(5500)).await;
        h.commands.send(SessionCommand::Stop).await.unwrap();
        h.handle.await.unwrap();

        let grabbed = *grabbed_on.lock().unwrap();
        let grabbed = grabbed.expect("a frame was grabbed");
        assert_ne!(grabbed, std::thread::current().id());
    }

    #[tokio::test(start_paused = true)]
    async fn unplugged_camera_mid_session_disables_tracking() {
        let mut h = spawn(
            SessionSettings::default(),
            FakeCamera { unplug: true, ..Default::default() },
            classifier(EmotionLabel::Focused, Duration::ZERO),
        );
        h.commands.send(SessionCommand::Track(true)).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_millis(5500)).await;
        settle().await;

        let events = drain(&mut h.events);
        assert!(events.iter().any(|e| matches!(e, Event::TrackingFailed { .. })));
        assert!(!h.camera_open.load(Ordering::SeqCst));

        h.commands.send(SessionCommand::Stop).await.unwrap();
        h.handle.await.unwrap();
    }
}
