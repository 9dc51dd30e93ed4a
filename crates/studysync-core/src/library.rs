//! Lecture library workflows that need the hosted model.
//!
//! Registering media always yields a lecture: `Ready` when extraction
//! succeeded, `Error` when it did not. Notes and quizzes are generated on
//! demand from the processed material.

use chrono::NaiveDate;
use log::{info, warn};

use crate::error::{CoreError, ValidationError};
use crate::lecture::{CornellNotes, Lecture, QuizQuestion};
use crate::remote::{LectureContext, LectureProcessor, MediaFile, StudyMaterialGenerator};

/// Register `media` as a new lecture and run extraction on it.
pub async fn ingest(
    processor: &dyn LectureProcessor,
    title: Option<&str>,
    date: NaiveDate,
    media: &MediaFile,
) -> Lecture {
    let title = title.map(str::to_string).unwrap_or_else(|| media.stem().to_string());
    let mut lecture = Lecture::new(title, date, Some(media.mime_type.clone()));

    match processor.process_media(media).await {
        Ok(data) => {
            info!(
                "processed '{}': {} concepts, {} questions",
                lecture.title,
                data.key_concepts.len(),
                data.practice_questions.len()
            );
            lecture.mark_processed(data);
        }
        Err(e) => {
            warn!("processing '{}' failed: {e}", lecture.title);
            lecture.mark_failed();
        }
    }
    lecture
}

fn context_for(lecture: &Lecture) -> Result<LectureContext, CoreError> {
    LectureContext::from_lecture(lecture).ok_or_else(|| {
        ValidationError::InvalidValue {
            field: "lecture".into(),
            message: format!("'{}' has not been processed", lecture.title),
        }
        .into()
    })
}

/// Generate Cornell notes and store them on the lecture.
///
/// When the model call fails the lecture gets a blank sheet to fill in by
/// hand. Only an unprocessed lecture is an error.
pub async fn generate_notes(
    generator: &dyn StudyMaterialGenerator,
    lecture: &mut Lecture,
) -> Result<CornellNotes, CoreError> {
    let context = context_for(lecture)?;
    let notes = match generator.generate_notes(&context).await {
        Ok(notes) => notes,
        Err(e) => {
            warn!("note generation for '{}' failed, starting blank: {e}", lecture.title);
            CornellNotes::default()
        }
    };
    lecture.user_notes = Some(notes.clone());
    Ok(notes)
}

/// Questions for a quiz on `lecture`: its practice questions, or freshly
/// generated ones when it has none.
pub async fn quiz_questions(
    generator: &dyn StudyMaterialGenerator,
    lecture: &Lecture,
) -> Result<Vec<QuizQuestion>, CoreError> {
    let existing = lecture.practice_questions();
    if !existing.is_empty() {
        return Ok(existing.to_vec());
    }
    let context = context_for(lecture)?;
    let topic = format!("{}: {}", context.title, context.key_concepts.join(", "));
    Ok(generator.generate_quiz(&topic).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::lecture::{CornellNotePair, LectureStatus, ProcessedLectureData};
    use async_trait::async_trait;

    struct Stub {
        fail: bool,
    }

    #[async_trait]
    impl LectureProcessor for Stub {
        async fn process_media(&self, _media: &MediaFile) -> Result<ProcessedLectureData, RemoteError> {
            if self.fail {
                return Err(RemoteError::MalformedResponse("not json".into()));
            }
            Ok(ProcessedLectureData {
                summary: "Photosynthesis turns light into sugar.".into(),
                key_concepts: vec!["Chlorophyll".into()],
                practice_questions: vec![QuizQuestion {
                    id: String::new(),
                    question: "Pigment?".into(),
                    options: vec!["Chlorophyll".into(), "Keratin".into()],
                    correct_answer: "Chlorophyll".into(),
                }],
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl StudyMaterialGenerator for Stub {
        async fn generate_notes(&self, context: &LectureContext) -> Result<CornellNotes, RemoteError> {
            if self.fail {
                return Err(RemoteError::Timeout { secs: 60 });
            }
            Ok(CornellNotes {
                pairs: vec![CornellNotePair {
                    cue: context.key_concepts[0].clone(),
                    note: "green pigment".into(),
                }],
                summary: context.summary.clone(),
            })
        }

        async fn generate_quiz(&self, topic: &str) -> Result<Vec<QuizQuestion>, RemoteError> {
            Ok(vec![QuizQuestion {
                id: "1".into(),
                question: topic.to_string(),
                options: vec!["x".into()],
                correct_answer: "x".into(),
            }])
        }
    }

    fn media() -> MediaFile {
        MediaFile {
            name: "biology-week3.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF".to_vec(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
    }

    #[tokio::test]
    async fn ingest_success_is_ready_with_numbered_questions() {
        let lecture = ingest(&Stub { fail: false }, None, today(), &media()).await;
        assert_eq!(lecture.title, "biology-week3");
        assert_eq!(lecture.status, LectureStatus::Ready);
        assert_eq!(lecture.file_type.as_deref(), Some("application/pdf"));
        assert_eq!(lecture.practice_questions()[0].id, "1");
    }

    #[tokio::test]
    async fn ingest_failure_marks_error() {
        let lecture = ingest(&Stub { fail: true }, Some("Week 3"), today(), &media()).await;
        assert_eq!(lecture.title, "Week 3");
        assert_eq!(lecture.status, LectureStatus::Error);
        assert!(lecture.processed.is_none());
    }

    #[tokio::test]
    async fn notes_are_stored_on_lecture() {
        let mut lecture = ingest(&Stub { fail: false }, None, today(), &media()).await;
        let notes = generate_notes(&Stub { fail: false }, &mut lecture).await.unwrap();
        assert_eq!(notes.pairs[0].cue, "Chlorophyll");
        assert_eq!(lecture.user_notes, Some(notes));
    }

    #[tokio::test]
    async fn failed_generation_leaves_blank_notes() {
        let mut lecture = ingest(&Stub { fail: false }, None, today(), &media()).await;
        let notes = generate_notes(&Stub { fail: true }, &mut lecture).await.unwrap();
        assert_eq!(notes, CornellNotes::default());
        assert_eq!(lecture.user_notes, Some(CornellNotes::default()));
    }

    #[tokio::test]
    async fn unprocessed_lecture_cannot_get_notes() {
        let mut lecture = Lecture::new("Raw", today(), None);
        let err = generate_notes(&Stub { fail: false }, &mut lecture).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn quiz_prefers_practice_questions() {
        let lecture = ingest(&Stub { fail: false }, None, today(), &media()).await;
        let questions = quiz_questions(&Stub { fail: false }, &lecture).await.unwrap();
        assert_eq!(questions[0].question, "Pigment?");

        let mut bare = lecture.clone();
        if let Some(p) = bare.processed.as_mut() {
            p.practice_questions.clear();
        }
        let generated = quiz_questions(&Stub { fail: false }, &bare).await.unwrap();
        assert_eq!(generated[0].question, "biology-week3: Chlorophyll");
    }
}
