use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Subcommand;
use log::warn;
use studysync_core::lecture::{reviews_due, CornellNotes};
use studysync_core::remote::MediaFile;
use studysync_core::storage::Database;
use studysync_core::{library, Config, Lecture};

use super::{gemini_client, prompt, today, CmdResult};

#[derive(Subcommand)]
pub enum LectureAction {
    /// Register lecture media (audio, video, PDF, image) and extract study material
    Add {
        /// Path to the media file
        path: PathBuf,
        /// Title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Lecture date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List lectures
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a lecture with its study material
    Show {
        /// Lecture ID
        id: String,
    },
    /// Delete a lecture and its quiz history
    Delete {
        /// Lecture ID
        id: String,
    },
    /// Show Cornell notes, generating them on first use, or edit them
    Notes {
        /// Lecture ID
        id: String,
        /// Generate fresh notes even if some are saved
        #[arg(long, conflicts_with_all = ["summary", "cue", "remove_cue"])]
        regenerate: bool,
        /// Replace the summary
        #[arg(long)]
        summary: Option<String>,
        /// Cue to add or rewrite (needs --note)
        #[arg(long, requires = "note")]
        cue: Option<String>,
        /// Note text for --cue
        #[arg(long, requires = "cue")]
        note: Option<String>,
        /// Remove the pair filed under this cue
        #[arg(long)]
        remove_cue: Option<String>,
    },
    /// Step through a lecture's flashcards; Enter flips, `q` stops
    Flashcards {
        /// Lecture ID
        id: String,
    },
    /// Lectures due for review
    Due {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_row(lecture: &Lecture) {
    let retention = lecture
        .retention_score
        .map(|r| format!("{r}%"))
        .unwrap_or_else(|| "-".into());
    let next = lecture
        .next_review_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".into());
    println!(
        "{}  {}  {:<10}  {:>4}  next {}  {}",
        lecture.id,
        lecture.date,
        lecture.status.as_str(),
        retention,
        next,
        lecture.title
    );
}

/// Hand edits to a lecture's notes, applied as removal, then cue, then summary.
#[derive(Debug, Default)]
struct NoteEdit {
    summary: Option<String>,
    cue: Option<(String, String)>,
    remove_cue: Option<String>,
}

impl NoteEdit {
    fn is_empty(&self) -> bool {
        self.summary.is_none() && self.cue.is_none() && self.remove_cue.is_none()
    }

    fn apply(self, notes: &mut CornellNotes) {
        if let Some(cue) = self.remove_cue {
            if !notes.remove(&cue) {
                warn!("no note filed under '{cue}'");
            }
        }
        if let Some((cue, note)) = self.cue {
            notes.upsert(&cue, &note);
        }
        if let Some(summary) = self.summary {
            notes.summary = summary;
        }
    }
}

fn print_notes(notes: &CornellNotes) {
    for pair in &notes.pairs {
        println!("{}\n    {}\n", pair.cue, pair.note);
    }
    println!("Summary: {}", notes.summary);
}

fn review_flashcards(lecture: &Lecture) -> CmdResult {
    let cards = lecture.flashcards();
    if cards.is_empty() {
        println!("No flashcards for '{}'.", lecture.title);
        return Ok(());
    }
    if let Some(processed) = &lecture.processed {
        println!("{}: {}", lecture.title, processed.headline());
    }

    let mut reviewed = 0;
    for (i, card) in cards.iter().enumerate() {
        println!("\nCard {}/{}: {}", i + 1, cards.len(), card.front);
        match prompt("(Enter to flip) ")? {
            Some(input) if input != "q" => {}
            _ => break,
        }
        println!("  {}", card.back);
        reviewed += 1;
    }
    println!("\nReviewed {reviewed} of {} cards.", cards.len());
    Ok(())
}

pub async fn run(action: LectureAction) -> CmdResult {
    let db = Database::open()?;

    match action {
        LectureAction::Add { path, title, date } => {
            let config = Config::load()?;
            let client = gemini_client(&config)?;
            let media = MediaFile::from_path(&path)?;
            println!("Processing {} ({})...", media.name, media.mime_type);

            let lecture =
                library::ingest(&client, title.as_deref(), date.unwrap_or_else(today), &media)
                    .await;
            db.save_lecture(&lecture)?;
            print_row(&lecture);
            if let Some(processed) = &lecture.processed {
                println!("Summary: {}", processed.summary);
                println!("Key concepts: {}", processed.key_concepts.join(", "));
                println!("Practice questions: {}", processed.practice_questions.len());
            }
        }
        LectureAction::List { json } => {
            let lectures = db.lectures()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&lectures)?);
            } else if lectures.is_empty() {
                println!("No lectures yet. Add one with `studysync lecture add <file>`.");
            } else {
                lectures.iter().for_each(print_row);
            }
        }
        LectureAction::Show { id } => {
            let lecture = db.lecture(&id)?;
            println!("{}", serde_json::to_string_pretty(&lecture)?);
        }
        LectureAction::Delete { id } => {
            if db.delete_lecture(&id)? {
                println!("Lecture deleted: {id}");
            } else {
                eprintln!("lecture not found: {id}");
                std::process::exit(1);
            }
        }
        LectureAction::Notes {
            id,
            regenerate,
            summary,
            cue,
            note,
            remove_cue,
        } => {
            let mut lecture = db.lecture(&id)?;
            let edit = NoteEdit {
                summary,
                cue: cue.zip(note),
                remove_cue,
            };
            let notes = if !edit.is_empty() {
                let mut notes = lecture.user_notes.take().unwrap_or_default();
                edit.apply(&mut notes);
                lecture.user_notes = Some(notes.clone());
                db.save_lecture(&lecture)?;
                notes
            } else {
                match (&lecture.user_notes, regenerate) {
                    (Some(notes), false) => notes.clone(),
                    _ => {
                        let config = Config::load()?;
                        let client = gemini_client(&config)?;
                        let notes = library::generate_notes(&client, &mut lecture).await?;
                        db.save_lecture(&lecture)?;
                        notes
                    }
                }
            };
            print_notes(&notes);
        }
        LectureAction::Flashcards { id } => {
            let lecture = db.lecture(&id)?;
            review_flashcards(&lecture)?;
        }
        LectureAction::Due { json } => {
            let lectures = db.lectures()?;
            let due = reviews_due(&lectures, today());
            if json {
                println!("{}", serde_json::to_string_pretty(&due)?);
            } else if due.is_empty() {
                println!("Nothing due for review.");
            } else {
                due.into_iter().for_each(print_row);
            }
        }
    }
    Ok(())
}
