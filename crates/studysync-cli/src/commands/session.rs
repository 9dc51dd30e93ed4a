use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use log::info;
use studysync_core::emotion::Frame;
use studysync_core::remote::{EmotionClassifier, Remediator};
use studysync_core::storage::Database;
use studysync_core::{
    AlertSound, Config, DeviceError, DirectoryCamera, FrameSource, SessionCommand,
    SessionController, SessionRunner, Silent, TerminalBell, ValidationError, Visibility,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{optional_gemini_client, CmdResult, Offline};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run an interactive focus session.
    ///
    /// Reads commands from stdin, one per line: start, pause, reset, hide,
    /// show, track on, track off, dismiss, status, quit. Events are printed
    /// to stdout as JSON lines.
    Run {
        /// Lecture to study (enables interventions)
        #[arg(long)]
        lecture: Option<String>,
        /// Session length in minutes (overrides config)
        #[arg(long)]
        minutes: Option<u32>,
        /// Directory of webcam snapshots for the mind mirror
        #[arg(long)]
        frames: Option<PathBuf>,
    },
    /// List recorded focus sessions
    History {
        /// Maximum number of sessions to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

/// Used when no snapshot directory is configured: tracking fails immediately.
struct NoCamera;

impl FrameSource for NoCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable(
            "no frames directory configured (use --frames or mind_mirror.frames_dir)".into(),
        ))
    }

    fn capture(&mut self) -> Result<Frame, DeviceError> {
        Err(DeviceError::Unavailable("camera not open".into()))
    }

    fn release(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        ["start"] => SessionCommand::Start,
        ["pause"] => SessionCommand::Pause,
        ["reset"] => SessionCommand::Reset,
        ["hide"] => SessionCommand::Visibility(Visibility::Hidden),
        ["show"] => SessionCommand::Visibility(Visibility::Visible),
        ["track", "on"] => SessionCommand::Track(true),
        ["track", "off"] => SessionCommand::Track(false),
        ["dismiss"] => SessionCommand::Dismiss,
        ["status"] => SessionCommand::Status,
        ["quit"] | ["exit"] => SessionCommand::Stop,
        _ => return None,
    };
    Some(command)
}

pub async fn run(action: SessionAction) -> CmdResult {
    match action {
        SessionAction::Run {
            lecture,
            minutes,
            frames,
        } => run_session(lecture, minutes, frames).await,
        SessionAction::History { limit } => {
            let db = Database::open()?;
            let sessions = db.focus_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
            Ok(())
        }
    }
}

async fn run_session(
    lecture_id: Option<String>,
    minutes: Option<u32>,
    frames: Option<PathBuf>,
) -> CmdResult {
    let config = Config::load()?;
    let db = Database::open()?;

    let mut settings = config.session_settings()?;
    if let Some(minutes) = minutes {
        if minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "minutes".into(),
                message: "must be at least 1".into(),
            }
            .into());
        }
        settings.duration_secs = u64::from(minutes) * 60;
    }

    let mut controller = SessionController::new(settings);
    if let Some(id) = lecture_id.as_deref() {
        let lecture = db.lecture(id)?;
        match &lecture.processed {
            Some(processed) if lecture.is_ready() => {
                info!("studying '{}': {}", lecture.title, processed.headline())
            }
            _ => info!("'{}' is not processed; interventions are disabled", lecture.title),
        }
        controller = controller.with_lecture(&lecture);
    }

    let frames = frames.or_else(|| config.mind_mirror.frames_dir.as_ref().map(PathBuf::from));
    let camera: Box<dyn FrameSource> = match frames {
        Some(dir) => Box::new(DirectoryCamera::new(dir)),
        None => Box::new(NoCamera),
    };
    let alert: Box<dyn AlertSound> = if config.focus.alert_enabled {
        Box::new(TerminalBell)
    } else {
        Box::new(Silent)
    };
    let (classifier, remediator): (Arc<dyn EmotionClassifier>, Arc<dyn Remediator>) =
        match optional_gemini_client(&config) {
            Some(client) => {
                let client = Arc::new(client);
                (
                    client.clone() as Arc<dyn EmotionClassifier>,
                    client as Arc<dyn Remediator>,
                )
            }
            None => (Arc::new(Offline), Arc::new(Offline)),
        };

    let runner = SessionRunner::new(controller, camera, alert, classifier, remediator);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let printer = tokio::spawn(async move {
        while let Some(event) = ev_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("failed to encode event: {e}"),
            }
        }
    });

    // Stdin is read on a plain thread so a pending read never holds up
    // runtime shutdown. EOF stops the session.
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_command(line) {
                Some(command) => {
                    let stop = command == SessionCommand::Stop;
                    if cmd_tx.blocking_send(command).is_err() || stop {
                        return;
                    }
                }
                None => eprintln!("unknown command: {line}"),
            }
        }
        let _ = cmd_tx.blocking_send(SessionCommand::Stop);
    });

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let record = runner.run(cmd_rx, ev_tx, cancel).await;
    let _ = printer.await;

    if record.focused_secs == 0 && !record.completed {
        info!("session never started; nothing recorded");
        return Ok(());
    }
    let id = db.record_focus_session(&record)?;
    info!(
        "recorded session #{id}: {} min focused, focus score {}",
        record.focused_secs / 60,
        record.focus_score
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("start"), Some(SessionCommand::Start));
        assert_eq!(
            parse_command("  hide "),
            Some(SessionCommand::Visibility(Visibility::Hidden))
        );
        assert_eq!(parse_command("track on"), Some(SessionCommand::Track(true)));
        assert_eq!(parse_command("track off"), Some(SessionCommand::Track(false)));
        assert_eq!(parse_command("quit"), Some(SessionCommand::Stop));
        assert_eq!(parse_command("track"), None);
        assert_eq!(parse_command("launch"), None);
    }
}
