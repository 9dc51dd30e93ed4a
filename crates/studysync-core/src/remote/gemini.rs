//! Gemini `generateContent` client.
//!
//! One HTTP client implements every remote trait. Quick calls (frame
//! classification, remediation, chat) go to the fast model; media extraction
//! and structured generation go to the media model.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::prompts;
use super::{
    ChatModel, ChatRole, ChatTurn, EmotionClassifier, LectureContext, LectureProcessor, MediaFile,
    Remediator, RetentionScorer, StudyMaterialGenerator,
};
use crate::emotion::{EmotionLabel, Frame};
use crate::error::RemoteError;
use crate::lecture::{CornellNotes, Lecture, ProcessedLectureData, QuizQuestion};
use crate::retention::{ForgettingPoint, RetentionUpdate};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MEDIA_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiSettings {
    pub base_url: String,
    pub fast_model: String,
    pub media_model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            fast_model: DEFAULT_FAST_MODEL.into(),
            media_model: DEFAULT_MEDIA_MODEL.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetentionReply {
    retention_score: f64,
    next_review_date: String,
    #[serde(default)]
    forgetting_curve: Vec<ForgettingPoint>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    fn inline(mime_type: &str, bytes: &[u8]) -> Self {
        Part::Inline {
            inline_data: InlineData {
                mime_type: mime_type.to_string(),
                data: BASE64.encode(bytes),
            },
        }
    }
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user"),
            parts,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct GeminiClient {
    http: Client,
    api_key: String,
    settings: GeminiSettings,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, settings: GeminiSettings) -> Result<Self, RemoteError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RemoteError::MissingApiKey);
        }
        let http = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self {
            http,
            api_key,
            settings,
        })
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn endpoint(&self, model: &str) -> Result<Url, RemoteError> {
        let base = Url::parse(&self.settings.base_url)
            .map_err(|e| RemoteError::MalformedResponse(format!("invalid base url: {e}")))?;
        base.join(&format!("v1beta/models/{model}:generateContent"))
            .map_err(|e| RemoteError::MalformedResponse(format!("invalid model path: {e}")))
    }

    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, RemoteError> {
        let url = self.endpoint(model)?;
        debug!("POST {url}");

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport(e))?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(RemoteError::MalformedResponse("empty candidate text".into()));
        }
        Ok(text)
    }

    async fn generate_json<T: DeserializeOwned>(
        &self,
        model: &str,
        parts: Vec<Part>,
    ) -> Result<T, RemoteError> {
        let request = GenerateRequest {
            contents: vec![Content::user(parts)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };
        let text = self.generate(model, &request).await?;
        serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))
    }

    async fn generate_text(&self, model: &str, parts: Vec<Part>) -> Result<String, RemoteError> {
        let request = GenerateRequest {
            contents: vec![Content::user(parts)],
            system_instruction: None,
            generation_config: None,
        };
        self.generate(model, &request).await
    }

    fn map_transport(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout {
                secs: self.settings.request_timeout.as_secs(),
            }
        } else {
            RemoteError::Transport(err)
        }
    }
}

/// Models sometimes wrap JSON in a markdown fence even when asked not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl EmotionClassifier for GeminiClient {
    async fn classify_frame(&self, frame: &Frame) -> Result<EmotionLabel, RemoteError> {
        let parts = vec![
            Part::inline(frame.mime_type, &frame.bytes),
            Part::text(prompts::CLASSIFY_FRAME),
        ];
        let text = self.generate_text(&self.settings.fast_model, parts).await?;
        let label = EmotionLabel::from_model_text(&text);
        if label == EmotionLabel::Error {
            warn!("classifier returned unexpected label {:?}", text.trim());
        }
        Ok(label)
    }
}

#[async_trait]
impl Remediator for GeminiClient {
    async fn remediation(&self, context: &LectureContext) -> Result<String, RemoteError> {
        let parts = vec![Part::text(prompts::remediation(context))];
        let text = self.generate_text(&self.settings.fast_model, parts).await?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl RetentionScorer for GeminiClient {
    async fn score_retention(
        &self,
        lecture: &Lecture,
        quiz_score_percent: f64,
        today: NaiveDate,
    ) -> Result<RetentionUpdate, RemoteError> {
        let parts = vec![Part::text(prompts::retention(lecture, quiz_score_percent, today))];
        let reply: RetentionReply = self.generate_json(&self.settings.media_model, parts).await?;

        let next_review_date = NaiveDate::parse_from_str(reply.next_review_date.trim(), "%Y-%m-%d")
            .map_err(|e| {
                RemoteError::MalformedResponse(format!(
                    "nextReviewDate {:?}: {e}",
                    reply.next_review_date
                ))
            })?;
        if !reply.retention_score.is_finite() {
            return Err(RemoteError::MalformedResponse("retentionScore is not a number".into()));
        }

        Ok(RetentionUpdate {
            retention_score: reply.retention_score,
            next_review_date,
            forgetting_curve: reply.forgetting_curve,
        })
    }
}

#[async_trait]
impl LectureProcessor for GeminiClient {
    async fn process_media(&self, media: &MediaFile) -> Result<ProcessedLectureData, RemoteError> {
        let parts = vec![
            Part::inline(&media.mime_type, &media.bytes),
            Part::text(prompts::PROCESS_MEDIA),
        ];
        let mut data: ProcessedLectureData =
            self.generate_json(&self.settings.media_model, parts).await?;
        data.number_questions();
        Ok(data)
    }
}

#[async_trait]
impl StudyMaterialGenerator for GeminiClient {
    async fn generate_notes(&self, context: &LectureContext) -> Result<CornellNotes, RemoteError> {
        let parts = vec![Part::text(prompts::cornell_notes(context))];
        self.generate_json(&self.settings.media_model, parts).await
    }

    async fn generate_quiz(&self, topic: &str) -> Result<Vec<QuizQuestion>, RemoteError> {
        let parts = vec![Part::text(prompts::quiz(topic))];
        let mut questions: Vec<QuizQuestion> =
            self.generate_json(&self.settings.media_model, parts).await?;
        for (i, q) in questions.iter_mut().enumerate() {
            q.id = (i + 1).to_string();
        }
        Ok(questions)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn chat(&self, system: &str, turns: &[ChatTurn]) -> Result<String, RemoteError> {
        let contents = turns
            .iter()
            .map(|turn| Content {
                role: Some(match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "model",
                }),
                parts: vec![Part::text(turn.text.clone())],
            })
            .collect();
        let request = GenerateRequest {
            contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(system)],
            }),
            generation_config: None,
        };
        let text = self.generate(&self.settings.fast_model, &request).await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> GeminiClient {
        GeminiClient::new(
            "test-key",
            GeminiSettings {
                base_url: server.url(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn reply(text: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        })
        .to_string()
    }

    fn frame() -> Frame {
        Frame {
            bytes: vec![0xff, 0xd8, 0xff],
            mime_type: "image/jpeg",
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  ", GeminiSettings::default()),
            Err(RemoteError::MissingApiKey)
        ));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  [1] "), "[1]");
    }

    #[tokio::test]
    async fn classify_sends_inline_image_and_parses_label() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "inlineData": { "mimeType": "image/jpeg", "data": "/9j/" } }] }]
            })))
            .with_status(200)
            .with_body(reply("Bored.\n"))
            .create_async()
            .await;

        let label = client(&server).classify_frame(&frame()).await.unwrap();
        assert_eq!(label, EmotionLabel::Bored);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_label_becomes_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(reply("Happy"))
            .create_async()
            .await;

        let label = client(&server).classify_frame(&frame()).await.unwrap();
        assert_eq!(label, EmotionLabel::Error);
    }

    #[tokio::test]
    async fn http_error_surfaces_status_and_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error":{"code":429,"message":"quota exceeded"}}"#)
            .create_async()
            .await;

        let err = client(&server).classify_frame(&frame()).await.unwrap_err();
        match err {
            RemoteError::Status { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn retention_reply_is_parsed() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({
            "retentionScore": 91.4,
            "nextReviewDate": "2024-08-15",
            "forgettingCurve": [{ "day": 1, "retention": 90.0 }]
        })
        .to_string();
        server
            .mock("POST", "/v1beta/models/gemini-2.5-pro:generateContent")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .with_status(200)
            .with_body(reply(&body))
            .create_async()
            .await;

        let lecture = Lecture::new("Bio", NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), None);
        let today = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let update = client(&server).score_retention(&lecture, 90.0, today).await.unwrap();
        assert_eq!(update.retention_score, 91.4);
        assert_eq!(update.next_review_date, NaiveDate::from_ymd_opt(2024, 8, 15).unwrap());
        assert_eq!(update.forgetting_curve.len(), 1);
    }

    #[tokio::test]
    async fn bad_review_date_is_malformed() {
        let mut server = Server::new_async().await;
        let body = r#"{"retentionScore": 50, "nextReviewDate": "next week"}"#;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(reply(body))
            .create_async()
            .await;

        let lecture = Lecture::new("Bio", NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), None);
        let today = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let err = client(&server).score_retention(&lecture, 50.0, today).await.unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn generated_quiz_is_numbered() {
        let mut server = Server::new_async().await;
        let body = r#"[
            {"question": "Q1", "options": ["a","b"], "correctAnswer": "a"},
            {"question": "Q2", "options": ["a","b"], "correctAnswer": "b"}
        ]"#;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(reply(body))
            .create_async()
            .await;

        let questions = client(&server).generate_quiz("Rust lifetimes").await.unwrap();
        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn chat_sends_system_instruction_and_roles() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "be brief" }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] },
                    { "role": "user", "parts": [{ "text": "what is ATP?" }] }
                ]
            })))
            .with_status(200)
            .with_body(reply(" Energy currency. "))
            .create_async()
            .await;

        let turns = vec![
            ChatTurn { role: ChatRole::User, text: "hi".into() },
            ChatTurn { role: ChatRole::Model, text: "hello".into() },
            ChatTurn { role: ChatRole::User, text: "what is ATP?".into() },
        ];
        let text = client(&server).chat("be brief", &turns).await.unwrap();
        assert_eq!(text, "Energy currency.");
        mock.assert_async().await;
    }
}
