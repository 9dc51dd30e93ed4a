//! Quiz runner.
//!
//! Each question may be answered once; a correct answer is worth
//! [`POINTS_PER_QUESTION`]. The final score is reported as a percentage.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::lecture::QuizQuestion;

pub const POINTS_PER_QUESTION: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRun {
    questions: Vec<QuizQuestion>,
    index: usize,
    selected: Option<String>,
    score: u32,
}

impl QuizRun {
    pub fn new(questions: Vec<QuizQuestion>) -> Result<Self, ValidationError> {
        if questions.is_empty() {
            return Err(ValidationError::EmptyCollection("quiz questions".into()));
        }
        Ok(Self {
            questions,
            index: 0,
            selected: None,
            score: 0,
        })
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.index)
    }

    pub fn position(&self) -> (usize, usize) {
        (self.index + 1, self.questions.len())
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.questions.len()
    }

    /// Lock in an answer for the current question.
    pub fn answer(&mut self, option: &str) -> Result<AnswerOutcome, ValidationError> {
        let question = self.current().ok_or_else(|| ValidationError::OutOfBounds {
            collection: "quiz questions".into(),
            index: self.index,
            len: self.questions.len(),
        })?;
        if self.selected.is_some() {
            return Err(ValidationError::InvalidValue {
                field: "answer".into(),
                message: "question already answered".into(),
            });
        }

        let correct = option == question.correct_answer;
        let points_awarded = if correct { POINTS_PER_QUESTION } else { 0 };
        self.score += points_awarded;
        self.selected = Some(option.to_string());
        Ok(AnswerOutcome {
            correct,
            points_awarded,
        })
    }

    /// Move on. Unanswered questions score nothing.
    pub fn advance(&mut self) {
        if !self.is_finished() {
            self.index += 1;
            self.selected = None;
        }
    }

    /// 0.0 ..= 100.0
    pub fn score_percent(&self) -> f64 {
        let max = self.questions.len() as u32 * POINTS_PER_QUESTION;
        self.score as f64 / max as f64 * 100.0
    }
}
