//! Spaced-repetition scheduling.
//!
//! After each quiz the remote scorer predicts a new retention score and the
//! next review date. If it cannot be reached, a fixed interval ladder keyed on
//! the quiz score is used instead so a review date is always produced.

use chrono::{Days, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::lecture::Lecture;
use crate::remote::RetentionScorer;

/// Days in a forgetting curve.
pub const CURVE_DAYS: u32 = 30;

/// Per-day decay of the locally generated curve.
const LOCAL_DECAY_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForgettingPoint {
    pub day: u32,
    pub retention: f64,
}

/// What a scorer returns. The score is unclamped model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionUpdate {
    pub retention_score: f64,
    pub next_review_date: NaiveDate,
    #[serde(default)]
    pub forgetting_curve: Vec<ForgettingPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionSource {
    Remote,
    Fallback,
}

/// The review schedule applied to a lecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub retention_score: u8,
    pub next_review_date: NaiveDate,
    pub forgetting_curve: Vec<ForgettingPoint>,
    pub source: RetentionSource,
}

/// 14 days above 80 %, 7 above 50 %, otherwise 3.
pub fn fallback_interval_days(score_percent: f64) -> u64 {
    if score_percent > 80.0 {
        14
    } else if score_percent > 50.0 {
        7
    } else {
        3
    }
}

fn clamp_score(score: f64) -> u8 {
    score.round().clamp(0.0, 100.0) as u8
}

/// Exponential decay from `retention`, one point per day.
pub fn local_forgetting_curve(retention: u8) -> Vec<ForgettingPoint> {
    (1..=CURVE_DAYS)
        .map(|day| ForgettingPoint {
            day,
            retention: f64::from(retention) * (-LOCAL_DECAY_RATE * f64::from(day)).exp(),
        })
        .collect()
}

/// Local schedule used when the scorer is unavailable.
pub fn fallback_outcome(score_percent: f64, today: NaiveDate) -> ReviewOutcome {
    let retention_score = clamp_score(score_percent);
    let days = fallback_interval_days(score_percent);
    ReviewOutcome {
        retention_score,
        next_review_date: today + Days::new(days),
        forgetting_curve: local_forgetting_curve(retention_score),
        source: RetentionSource::Fallback,
    }
}

pub struct RetentionScheduler<'a> {
    scorer: &'a dyn RetentionScorer,
}

impl<'a> RetentionScheduler<'a> {
    pub fn new(scorer: &'a dyn RetentionScorer) -> Self {
        Self { scorer }
    }

    /// Score a finished quiz and write the new schedule onto the lecture.
    pub async fn record_quiz(
        &self,
        lecture: &mut Lecture,
        score_percent: f64,
        today: NaiveDate,
    ) -> ReviewOutcome {
        let outcome = match self.scorer.score_retention(lecture, score_percent, today).await {
            Ok(update) => {
                let retention_score = clamp_score(update.retention_score);
                let forgetting_curve = if update.forgetting_curve.is_empty() {
                    local_forgetting_curve(retention_score)
                } else {
                    update.forgetting_curve
                };
                ReviewOutcome {
                    retention_score,
                    next_review_date: update.next_review_date,
                    forgetting_curve,
                    source: RetentionSource::Remote,
                }
            }
            Err(e) => {
                warn!("retention scoring failed for '{}', using fallback: {e}", lecture.title);
                fallback_outcome(score_percent, today)
            }
        };

        lecture.retention_score = Some(outcome.retention_score);
        lecture.last_reviewed = Some(today);
        lecture.next_review_date = Some(outcome.next_review_date);
        info!(
            "lecture '{}' retention {} next review {}",
            lecture.title, outcome.retention_score, outcome.next_review_date
        );
        outcome
    }
}
