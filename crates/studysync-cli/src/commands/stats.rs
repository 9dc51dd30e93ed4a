use chrono::Utc;
use studysync_core::storage::Database;

use super::CmdResult;

pub fn run(recent: Option<usize>) -> CmdResult {
    let db = Database::open()?;

    let stats = db.stats(Utc::now().date_naive())?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if let Some(limit) = recent {
        let sessions = db.focus_sessions(limit)?;
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    }
    Ok(())
}
