use chrono::Utc;
use clap::Subcommand;
use log::info;
use studysync_core::remote::RetentionScorer;
use studysync_core::retention::{ForgettingPoint, RetentionSource};
use studysync_core::storage::Database;
use studysync_core::{
    library, Config, Lecture, QuizRun, RetentionScheduler, ReviewOutcome, ValidationError,
};

use super::{gemini_client, optional_gemini_client, prompt, today, CmdResult, Offline};

#[derive(Subcommand)]
pub enum QuizAction {
    /// Take a quiz on a lecture interactively
    Take {
        /// Lecture ID
        id: String,
        /// Print the review schedule as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a quiz score taken elsewhere and reschedule the review
    Complete {
        /// Lecture ID
        id: String,
        /// Score in percent (0-100)
        #[arg(long)]
        score: f64,
        /// Print the review schedule as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show past quiz results for a lecture
    History {
        /// Lecture ID
        id: String,
    },
}

/// Accepts an option number (1-based) or the option text itself.
fn resolve_answer<'a>(input: &str, options: &'a [String]) -> Option<&'a str> {
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).map(String::as_str);
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(input))
        .map(String::as_str)
}

async fn finish(
    db: &Database,
    config: &Config,
    lecture: &mut Lecture,
    score_percent: f64,
) -> Result<ReviewOutcome, Box<dyn std::error::Error>> {
    let client = optional_gemini_client(config);
    let scorer: &dyn RetentionScorer = match &client {
        Some(client) => client,
        None => &Offline,
    };
    let outcome = RetentionScheduler::new(scorer)
        .record_quiz(lecture, score_percent, today())
        .await;
    db.save_lecture(lecture)?;
    db.record_quiz_result(&lecture.id, score_percent, Utc::now())?;
    if outcome.source == RetentionSource::Fallback {
        info!("retention estimated locally");
    }
    Ok(outcome)
}

/// Day 1 and every fifth day, one bar character per 5 %.
fn curve_lines(curve: &[ForgettingPoint]) -> Vec<String> {
    curve
        .iter()
        .filter(|p| p.day == 1 || p.day % 5 == 0)
        .map(|p| {
            let retention = p.retention.clamp(0.0, 100.0);
            let bar = "#".repeat((retention / 5.0).round() as usize);
            format!("  day {:>2}  {retention:>5.1}%  {bar}", p.day)
        })
        .collect()
}

fn print_outcome(outcome: &ReviewOutcome, json: bool) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    println!(
        "Retention: {}%  next review: {}",
        outcome.retention_score, outcome.next_review_date
    );
    if !outcome.forgetting_curve.is_empty() {
        println!("Forgetting curve:");
        for line in curve_lines(&outcome.forgetting_curve) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run(action: QuizAction) -> CmdResult {
    let db = Database::open()?;
    let config = Config::load()?;

    match action {
        QuizAction::Take { id, json } => {
            let mut lecture = db.lecture(&id)?;
            let questions = if lecture.practice_questions().is_empty() {
                library::quiz_questions(&gemini_client(&config)?, &lecture).await?
            } else {
                lecture.practice_questions().to_vec()
            };
            let mut quiz = QuizRun::new(questions)?;

            while let Some(question) = quiz.current().cloned() {
                let (n, total) = quiz.position();
                println!("\nQuestion {n}/{total}: {}", question.question);
                for (i, option) in question.options.iter().enumerate() {
                    println!("  {}. {option}", i + 1);
                }

                let choice = loop {
                    let Some(input) = prompt("> ")? else {
                        println!("\nQuiz abandoned.");
                        return Ok(());
                    };
                    match resolve_answer(&input, &question.options) {
                        Some(choice) => break choice.to_string(),
                        None => println!("Pick 1-{}", question.options.len()),
                    }
                };

                let outcome = quiz.answer(&choice)?;
                if outcome.correct {
                    println!("Correct! +{}", outcome.points_awarded);
                } else {
                    println!("Incorrect. Answer: {}", question.correct_answer);
                }
                quiz.advance();
            }

            let score_percent = quiz.score_percent();
            println!("\nScore: {} ({score_percent:.0}%)", quiz.score());
            let outcome = finish(&db, &config, &mut lecture, score_percent).await?;
            print_outcome(&outcome, json)?;
        }
        QuizAction::Complete { id, score, json } => {
            if !(0.0..=100.0).contains(&score) {
                return Err(ValidationError::InvalidValue {
                    field: "score".into(),
                    message: format!("{score} is outside 0-100"),
                }
                .into());
            }
            let mut lecture = db.lecture(&id)?;
            let outcome = finish(&db, &config, &mut lecture, score).await?;
            print_outcome(&outcome, json)?;
        }
        QuizAction::History { id } => {
            let results = db.quiz_results(&id)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_by_number_or_text() {
        let options = vec!["Mitochondria".to_string(), "Ribosome".to_string()];
        assert_eq!(resolve_answer("2", &options), Some("Ribosome"));
        assert_eq!(resolve_answer("mitochondria", &options), Some("Mitochondria"));
        assert_eq!(resolve_answer("0", &options), None);
        assert_eq!(resolve_answer("3", &options), None);
        assert_eq!(resolve_answer("nucleus", &options), None);
    }

    #[test]
    fn curve_shows_day_one_and_every_fifth_day() {
        let curve = studysync_core::retention::local_forgetting_curve(100);
        let lines = curve_lines(&curve);
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("  day  1   90.5%"));
        assert!(lines[0].ends_with(&"#".repeat(18)));
        assert!(lines[6].starts_with("  day 30"));
    }
}
