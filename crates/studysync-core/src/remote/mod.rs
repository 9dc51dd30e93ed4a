//! Hosted-model collaborators.
//!
//! Every piece of "intelligence" in StudySync is a remote call. The session
//! and scheduling code only sees these traits, so any failure here can be
//! answered with a local fallback instead of a crash.

pub mod gemini;
pub(crate) mod prompts;

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::emotion::{EmotionLabel, Frame};
use crate::error::RemoteError;
use crate::lecture::{CornellNotes, Lecture, ProcessedLectureData, QuizQuestion};
use crate::retention::RetentionUpdate;

pub use gemini::{GeminiClient, GeminiSettings};

/// Lecture media handed to the model for extraction.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// Read a file and guess its MIME type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("lecture")
            .to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    /// File name without its extension, used as the default lecture title.
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(&self.name)
    }
}

/// What the model is told about the lecture being studied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LectureContext {
    pub title: String,
    pub summary: String,
    pub key_concepts: Vec<String>,
}

impl LectureContext {
    /// `None` until the lecture has been processed.
    pub fn from_lecture(lecture: &Lecture) -> Option<Self> {
        let processed = lecture.processed.as_ref()?;
        Some(Self::from_processed(&lecture.title, processed))
    }

    pub fn from_processed(title: &str, processed: &ProcessedLectureData) -> Self {
        Self {
            title: title.to_string(),
            summary: processed.summary.clone(),
            key_concepts: processed.key_concepts.clone(),
        }
    }
}

/// One turn of a tutoring conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Labels outside the known set come back as `EmotionLabel::Error`.
    async fn classify_frame(&self, frame: &Frame) -> Result<EmotionLabel, RemoteError>;
}

#[async_trait]
pub trait Remediator: Send + Sync {
    /// A short motivational message plus a one-paragraph simplified explanation.
    async fn remediation(&self, context: &LectureContext) -> Result<String, RemoteError>;
}

#[async_trait]
pub trait RetentionScorer: Send + Sync {
    async fn score_retention(
        &self,
        lecture: &Lecture,
        quiz_score_percent: f64,
        today: NaiveDate,
    ) -> Result<RetentionUpdate, RemoteError>;
}

#[async_trait]
pub trait LectureProcessor: Send + Sync {
    async fn process_media(&self, media: &MediaFile) -> Result<ProcessedLectureData, RemoteError>;
}

#[async_trait]
pub trait StudyMaterialGenerator: Send + Sync {
    async fn generate_notes(&self, context: &LectureContext) -> Result<CornellNotes, RemoteError>;

    /// Questions come back numbered "1".."n".
    async fn generate_quiz(&self, topic: &str) -> Result<Vec<QuizQuestion>, RemoteError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, system: &str, turns: &[ChatTurn]) -> Result<String, RemoteError>;
}
