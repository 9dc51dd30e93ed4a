//! # StudySync Core Library
//!
//! This library provides the core logic for StudySync, a study assistant that
//! turns lecture media into study material and keeps the learner engaged
//! while they work through it. Everything is available through the
//! standalone `studysync` CLI binary built on top of this crate.
//!
//! ## Architecture
//!
//! - **Session**: a tick-driven countdown composed with a focus monitor, an
//!   emotion sampler and a cooldown-gated intervention gate. The caller (or
//!   the async [`SessionRunner`]) drives it; nothing here spawns threads.
//! - **Remote**: traits for every hosted-model call, implemented by
//!   [`GeminiClient`]. Failures fall back locally or fail open.
//! - **Retention**: spaced-repetition scheduling after each quiz.
//! - **Storage**: SQLite persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionController`]: focus session state machine
//! - [`InterventionGate`]: single-flight, cooldown-guarded interventions
//! - [`RetentionScheduler`]: review dates with a local fallback
//! - [`TutorChat`]: per-lecture tutoring conversation
//! - [`Database`]: lecture, session and quiz persistence
//! - [`Config`]: application configuration management

pub mod chat;
pub mod emotion;
pub mod error;
pub mod events;
pub mod focus;
pub mod intervention;
pub mod lecture;
pub mod library;
pub mod quiz;
pub mod remote;
pub mod retention;
pub mod session;
pub mod storage;
pub mod timer;

pub use chat::{TutorChat, TutorReply};
pub use emotion::{DirectoryCamera, EmotionDisplay, EmotionLabel, EmotionSampler, FrameSource};
pub use error::{ConfigError, CoreError, DatabaseError, DeviceError, RemoteError, ValidationError};
pub use events::Event;
pub use focus::{AlertSound, FocusMonitor, Silent, TerminalBell, Visibility};
pub use intervention::{InterventionGate, InterventionPayload, InterventionState, InterventionStyle};
pub use lecture::{CornellNotes, Lecture, LectureStatus, ProcessedLectureData, QuizQuestion};
pub use quiz::QuizRun;
pub use remote::{GeminiClient, GeminiSettings, LectureContext, MediaFile};
pub use retention::{ReviewOutcome, RetentionScheduler};
pub use session::{SessionCommand, SessionController, SessionRunner, SessionSettings, SessionSnapshot};
pub use storage::{Config, Database, StudyStats};
pub use timer::{ClockState, SessionClock};
