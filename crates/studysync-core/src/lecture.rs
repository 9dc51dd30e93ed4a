//! Lecture library types.
//!
//! A lecture starts out `Processing` when media is registered, becomes
//! `Ready` once the model has extracted study material, or `Error` if that
//! failed. Review scheduling fields are filled in by the retention scheduler.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LectureStatus {
    Processing,
    Ready,
    Error,
}

impl LectureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LectureStatus::Processing => "processing",
            LectureStatus::Ready => "ready",
            LectureStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    #[serde(default)]
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornellNotePair {
    pub cue: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CornellNotes {
    pub pairs: Vec<CornellNotePair>,
    pub summary: String,
}

impl CornellNotes {
    /// Replace the note filed under `cue`, or append a new pair.
    pub fn upsert(&mut self, cue: &str, note: &str) {
        match self.pairs.iter_mut().find(|p| p.cue == cue) {
            Some(pair) => pair.note = note.to_string(),
            None => self.pairs.push(CornellNotePair {
                cue: cue.to_string(),
                note: note.to_string(),
            }),
        }
    }

    /// False when no pair has that cue.
    pub fn remove(&mut self, cue: &str) -> bool {
        let before = self.pairs.len();
        self.pairs.retain(|p| p.cue != cue);
        self.pairs.len() != before
    }
}

/// Study material extracted from one piece of lecture media.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedLectureData {
    pub summary: String,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub practice_questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
    #[serde(default)]
    pub youtube_links: Vec<String>,
    #[serde(default)]
    pub transcription: String,
}

impl ProcessedLectureData {
    /// Give every practice question a stable 1-based id.
    pub fn number_questions(&mut self) {
        for (i, q) in self.practice_questions.iter_mut().enumerate() {
            if q.id.is_empty() {
                q.id = (i + 1).to_string();
            }
        }
    }

    /// First key concept, used as the session headline.
    pub fn headline(&self) -> &str {
        self.key_concepts
            .first()
            .map(String::as_str)
            .unwrap_or("Focus on the key concepts.")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub duration: String,
    pub status: LectureStatus,
    #[serde(default)]
    pub processed: Option<ProcessedLectureData>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub user_notes: Option<CornellNotes>,
    #[serde(default)]
    pub retention_score: Option<u8>,
    #[serde(default)]
    pub last_reviewed: Option<NaiveDate>,
    #[serde(default)]
    pub next_review_date: Option<NaiveDate>,
}

impl Lecture {
    /// A freshly registered lecture awaiting processing.
    pub fn new(title: impl Into<String>, date: NaiveDate, file_type: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            date,
            duration: "N/A".into(),
            status: LectureStatus::Processing,
            processed: None,
            file_type,
            user_notes: None,
            retention_score: None,
            last_reviewed: None,
            next_review_date: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == LectureStatus::Ready && self.processed.is_some()
    }

    pub fn mark_processed(&mut self, mut data: ProcessedLectureData) {
        data.number_questions();
        self.processed = Some(data);
        self.status = LectureStatus::Ready;
    }

    pub fn mark_failed(&mut self) {
        self.status = LectureStatus::Error;
    }

    pub fn practice_questions(&self) -> &[QuizQuestion] {
        self.processed
            .as_ref()
            .map(|p| p.practice_questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn flashcards(&self) -> &[Flashcard] {
        self.processed
            .as_ref()
            .map(|p| p.flashcards.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_review_due(&self, today: NaiveDate) -> bool {
        self.status == LectureStatus::Ready
            && self.next_review_date.is_some_and(|due| due <= today)
    }
}

/// Ready lectures whose next review date is today or earlier, most overdue first.
pub fn reviews_due(lectures: &[Lecture], today: NaiveDate) -> Vec<&Lecture> {
    let mut due: Vec<&Lecture> = lectures.iter().filter(|l| l.is_review_due(today)).collect();
    due.sort_by_key(|l| l.next_review_date);
    due
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn ready(title: &str, next: Option<&str>) -> Lecture {
        let mut l = Lecture::new(title, date("2024-07-01"), None);
        l.mark_processed(ProcessedLectureData {
            summary: "s".into(),
            ..Default::default()
        });
        l.next_review_date = next.map(date);
        l
    }

    #[test]
    fn new_lecture_is_processing() {
        let l = Lecture::new("Quantum Physics", date("2024-07-28"), Some("video/mp4".into()));
        assert_eq!(l.status, LectureStatus::Processing);
        assert!(!l.is_ready());
        assert!(l.practice_questions().is_empty());
    }

    #[test]
    fn processed_questions_get_ids() {
        let mut l = Lecture::new("Bio", date("2024-07-28"), None);
        l.mark_processed(ProcessedLectureData {
            summary: "cells".into(),
            practice_questions: vec![
                QuizQuestion {
                    id: String::new(),
                    question: "Powerhouse?".into(),
                    options: vec!["Mitochondria".into(), "Nucleus".into()],
                    correct_answer: "Mitochondria".into(),
                },
                QuizQuestion {
                    id: String::new(),
                    question: "Barrier?".into(),
                    options: vec!["Membrane".into()],
                    correct_answer: "Membrane".into(),
                },
            ],
            ..Default::default()
        });
        let ids: Vec<_> = l.practice_questions().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(l.is_ready());
    }

    #[test]
    fn due_reviews_are_sorted_and_filtered() {
        let today = date("2024-08-01");
        let mut failed = ready("failed", Some("2024-07-01"));
        failed.mark_failed();
        let lectures = vec![
            ready("later", Some("2024-08-05")),
            ready("today", Some("2024-08-01")),
            ready("overdue", Some("2024-07-20")),
            ready("never", None),
            failed,
        ];
        let due: Vec<_> = reviews_due(&lectures, today).iter().map(|l| l.title.clone()).collect();
        assert_eq!(due, vec!["overdue", "today"]);
    }

    #[test]
    fn processed_data_parses_model_json() {
        let json = r#"{
            "summary": "Entanglement basics",
            "keyConcepts": ["Superposition", "Entanglement"],
            "practiceQuestions": [{"question": "Q?", "options": ["a","b"], "correctAnswer": "a"}],
            "flashcards": [{"front": "f", "back": "b"}],
            "youtubeLinks": [],
            "transcription": "..."
        }"#;
        let data: ProcessedLectureData = serde_json::from_str(json).unwrap();
        assert_eq!(data.headline(), "Superposition");
        assert_eq!(data.practice_questions[0].correct_answer, "a");
        assert!(data.practice_questions[0].id.is_empty());
    }

    #[test]
    fn notes_upsert_replaces_by_cue() {
        let mut notes = CornellNotes::default();
        notes.upsert("Osmosis", "water moves");
        notes.upsert("Diffusion", "particles spread");
        notes.upsert("Osmosis", "water crosses a membrane");

        assert_eq!(notes.pairs.len(), 2);
        assert_eq!(notes.pairs[0].note, "water crosses a membrane");
        assert!(notes.remove("Diffusion"));
        assert!(!notes.remove("Diffusion"));
        assert_eq!(notes.pairs.len(), 1);
    }
}
