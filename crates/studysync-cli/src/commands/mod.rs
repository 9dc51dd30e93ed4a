pub mod auth;
pub mod chat;
pub mod config;
pub mod lecture;
pub mod quiz;
pub mod session;
pub mod stats;

use std::error::Error;
use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use studysync_core::emotion::Frame;
use studysync_core::remote::{EmotionClassifier, LectureContext, Remediator, RetentionScorer};
use studysync_core::retention::RetentionUpdate;
use studysync_core::{storage, Config, EmotionLabel, GeminiClient, Lecture, RemoteError};

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Gemini client built from the stored API key and the `[gemini]` config section.
pub fn gemini_client(config: &Config) -> Result<GeminiClient, Box<dyn Error>> {
    let (key, source) = storage::api_key()?;
    debug!("using Gemini API key from {source:?}");
    Ok(GeminiClient::new(key, config.gemini_settings())?)
}

/// Like [`gemini_client`], but `None` (with a warning) when no key is set, so
/// commands with a local fallback can keep going.
pub fn optional_gemini_client(config: &Config) -> Option<GeminiClient> {
    match gemini_client(config) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("running offline: {e}");
            None
        }
    }
}

/// Stand-in for the hosted model when no API key is configured. Every call
/// fails, which the callers answer with their local fallback.
pub struct Offline;

#[async_trait]
impl EmotionClassifier for Offline {
    async fn classify_frame(&self, _frame: &Frame) -> Result<EmotionLabel, RemoteError> {
        Err(RemoteError::MissingApiKey)
    }
}

#[async_trait]
impl Remediator for Offline {
    async fn remediation(&self, _context: &LectureContext) -> Result<String, RemoteError> {
        Err(RemoteError::MissingApiKey)
    }
}

#[async_trait]
impl RetentionScorer for Offline {
    async fn score_retention(
        &self,
        _lecture: &Lecture,
        _score: f64,
        _today: NaiveDate,
    ) -> Result<RetentionUpdate, RemoteError> {
        Err(RemoteError::MissingApiKey)
    }
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Print `label` and read one trimmed line from stdin. `None` on EOF.
pub fn prompt(label: &str) -> io::Result<Option<String>> {
    let mut out = io::stdout().lock();
    write!(out, "{label}")?;
    out.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
