use std::path::Path;

use studysync_core::remote::{ChatTurn, LectureContext};
use studysync_core::storage::Database;
use studysync_core::{Config, TutorChat, ValidationError};

use super::{gemini_client, prompt, CmdResult};

pub async fn run(id: &str, transcript: Option<&Path>) -> CmdResult {
    let db = Database::open()?;
    let lecture = db.lecture(id)?;
    let context = LectureContext::from_lecture(&lecture).ok_or_else(|| ValidationError::InvalidValue {
        field: "lecture".into(),
        message: format!("'{}' has not been processed", lecture.title),
    })?;

    let config = Config::load()?;
    let client = gemini_client(&config)?;
    let mut chat = TutorChat::new(&client, context);

    println!("Tutor for '{}'. Ask anything; `quit` to leave.", lecture.title);
    loop {
        let Some(message) = prompt("you> ")? else {
            break;
        };
        if message.is_empty() {
            continue;
        }
        if message == "quit" || message == "exit" {
            break;
        }
        let reply = chat.send(&message).await;
        println!("tutor> {}\n", reply.text);
    }

    if let Some(path) = transcript {
        write_transcript(path, chat.turns())?;
        println!("Saved {} turns to {}", chat.turns().len(), path.display());
    }
    Ok(())
}

/// Only the turns since the last failure survive; a failed call resets the
/// conversation.
fn write_transcript(path: &Path, turns: &[ChatTurn]) -> CmdResult {
    std::fs::write(path, serde_json::to_string_pretty(turns)?)?;
    Ok(())
}
