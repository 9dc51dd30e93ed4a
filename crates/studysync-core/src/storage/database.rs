//! SQLite-based storage for lectures, focus sessions and quiz results.
//!
//! Provides persistent storage for:
//! - The lecture library (full record kept as JSON, schedule fields indexed)
//! - Finished focus sessions and their focus scores
//! - Quiz results

use std::path::Path;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError};
use crate::lecture::{reviews_due, Lecture};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSessionRecord {
    pub id: i64,
    pub lecture_id: Option<String>,
    pub planned_secs: u64,
    pub focused_secs: u64,
    pub switch_score: u32,
    pub focus_score: u32,
    pub interventions: u32,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResultRecord {
    pub id: i64,
    pub lecture_id: String,
    pub score_percent: f64,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StudyStats {
    pub total_sessions: u64,
    pub total_focused_min: u64,
    pub today_sessions: u64,
    pub today_focused_min: u64,
    pub average_focus_score: Option<f64>,
    pub streak_days: u32,
    pub quizzes_taken: u64,
    pub average_quiz_score: Option<f64>,
    pub lectures: u64,
    pub reviews_due: u64,
}

/// SQLite database for StudySync.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/studysync/studysync.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("studysync.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS lectures (
                id               TEXT PRIMARY KEY,
                title            TEXT NOT NULL,
                status           TEXT NOT NULL,
                lecture_date     TEXT NOT NULL,
                retention_score  INTEGER,
                last_reviewed    TEXT,
                next_review_date TEXT,
                payload          TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS focus_sessions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                lecture_id    TEXT,
                planned_secs  INTEGER NOT NULL,
                focused_secs  INTEGER NOT NULL,
                switch_score  INTEGER NOT NULL,
                focus_score   INTEGER NOT NULL,
                interventions INTEGER NOT NULL DEFAULT 0,
                completed     INTEGER NOT NULL DEFAULT 0,
                started_at    TEXT NOT NULL,
                ended_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quiz_results (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                lecture_id    TEXT NOT NULL,
                score_percent REAL NOT NULL,
                taken_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_lectures_next_review ON lectures(next_review_date);
            CREATE INDEX IF NOT EXISTS idx_focus_sessions_started_at ON focus_sessions(started_at);
            CREATE INDEX IF NOT EXISTS idx_quiz_results_lecture ON quiz_results(lecture_id);",
        )?;
        Ok(())
    }

    // ── Lectures ─────────────────────────────────────────────────────

    /// Insert or replace a lecture.
    pub fn save_lecture(&self, lecture: &Lecture) -> Result<(), CoreError> {
        let payload = serde_json::to_string(lecture)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO lectures
                (id, title, status, lecture_date, retention_score, last_reviewed, next_review_date, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                lecture.id,
                lecture.title,
                lecture.status.as_str(),
                lecture.date.to_string(),
                lecture.retention_score,
                lecture.last_reviewed.map(|d| d.to_string()),
                lecture.next_review_date.map(|d| d.to_string()),
                payload,
            ],
        )?;
        Ok(())
    }

    pub fn lecture(&self, id: &str) -> Result<Lecture, CoreError> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM lectures WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        let payload = payload.ok_or_else(|| DatabaseError::NotFound {
            entity: "lecture",
            id: id.to_string(),
        })?;
        Ok(serde_json::from_str(&payload)?)
    }

    /// Newest lecture first.
    pub fn lectures(&self) -> Result<Vec<Lecture>, CoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM lectures ORDER BY lecture_date DESC, title ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut lectures = Vec::new();
        for row in rows {
            lectures.push(serde_json::from_str(&row?)?);
        }
        Ok(lectures)
    }

    /// Returns false if there was nothing to delete.
    pub fn delete_lecture(&self, id: &str) -> Result<bool, CoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM lectures WHERE id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM quiz_results WHERE lecture_id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // ── Focus sessions ───────────────────────────────────────────────

    /// Record a finished or stopped focus session. `record.id` is ignored.
    pub fn record_focus_session(&self, record: &FocusSessionRecord) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO focus_sessions
                (lecture_id, planned_secs, focused_secs, switch_score, focus_score, interventions, completed, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.lecture_id,
                record.planned_secs,
                record.focused_secs,
                record.switch_score,
                record.focus_score,
                record.interventions,
                record.completed,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent first.
    pub fn focus_sessions(&self, limit: usize) -> Result<Vec<FocusSessionRecord>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lecture_id, planned_secs, focused_secs, switch_score, focus_score,
                    interventions, completed, started_at, ended_at
             FROM focus_sessions
             ORDER BY started_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                FocusSessionRecord {
                    id: row.get(0)?,
                    lecture_id: row.get(1)?,
                    planned_secs: row.get(2)?,
                    focused_secs: row.get(3)?,
                    switch_score: row.get(4)?,
                    focus_score: row.get(5)?,
                    interventions: row.get(6)?,
                    completed: row.get(7)?,
                    started_at: Utc::now(),
                    ended_at: Utc::now(),
                },
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (mut record, started, ended) = row?;
            record.started_at = parse_timestamp(&started)?;
            record.ended_at = parse_timestamp(&ended)?;
            out.push(record);
        }
        Ok(out)
    }

    // ── Quizzes ──────────────────────────────────────────────────────

    pub fn record_quiz_result(
        &self,
        lecture_id: &str,
        score_percent: f64,
        taken_at: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO quiz_results (lecture_id, score_percent, taken_at) VALUES (?1, ?2, ?3)",
            params![lecture_id, score_percent, taken_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn quiz_results(&self, lecture_id: &str) -> Result<Vec<QuizResultRecord>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lecture_id, score_percent, taken_at
             FROM quiz_results WHERE lecture_id = ?1 ORDER BY taken_at ASC",
        )?;
        let rows = stmt.query_map(params![lecture_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, lecture_id, score_percent, taken_at) = row?;
            out.push(QuizResultRecord {
                id,
                lecture_id,
                score_percent,
                taken_at: parse_timestamp(&taken_at)?,
            });
        }
        Ok(out)
    }

    // ── Stats ────────────────────────────────────────────────────────

    /// Aggregate focus and quiz statistics as of `today` (UTC dates).
    pub fn stats(&self, today: NaiveDate) -> Result<StudyStats, CoreError> {
        let mut stats = StudyStats::default();

        let (count, focused, avg): (u64, u64, Option<f64>) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(focused_secs), 0), AVG(focus_score) FROM focus_sessions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        stats.total_sessions = count;
        stats.total_focused_min = focused / 60;
        stats.average_focus_score = avg;

        let (today_count, today_focused): (u64, u64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(focused_secs), 0)
             FROM focus_sessions WHERE substr(started_at, 1, 10) = ?1",
            params![today.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        stats.today_sessions = today_count;
        stats.today_focused_min = today_focused / 60;

        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT substr(started_at, 1, 10) FROM focus_sessions ORDER BY 1 DESC",
        )?;
        let days = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|d| d.ok())
            .filter_map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            .collect::<Vec<_>>();
        stats.streak_days = streak_days(&days, today);

        let (quizzes, quiz_avg): (u64, Option<f64>) = self.conn.query_row(
            "SELECT COUNT(*), AVG(score_percent) FROM quiz_results",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        stats.quizzes_taken = quizzes;
        stats.average_quiz_score = quiz_avg;

        let lectures = self.lectures()?;
        stats.lectures = lectures.len() as u64;
        stats.reviews_due = reviews_due(&lectures, today).len() as u64;

        Ok(stats)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp {s:?}: {e}")).into())
}

/// Consecutive study days ending today, or yesterday if nothing has been
/// recorded yet today. `days` must be distinct and sorted newest first.
fn streak_days(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut expected = match days.first() {
        Some(&d) if d == today => today,
        Some(&d) if Some(d) == today.checked_sub_days(Days::new(1)) => d,
        _ => return 0,
    };

    let mut streak = 0;
    for &day in days {
        if day != expected {
            break;
        }
        streak += 1;
        match expected.checked_sub_days(Days::new(1)) {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lecture::ProcessedLectureData;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn session(started: DateTime<Utc>, focused_secs: u64, focus_score: u32) -> FocusSessionRecord {
        FocusSessionRecord {
            id: 0,
            lecture_id: None,
            planned_secs: 1500,
            focused_secs,
            switch_score: (100 - focus_score) / 5,
            focus_score,
            interventions: 0,
            completed: true,
            started_at: started,
            ended_at: started,
        }
    }

    #[test]
    fn schema_holds_only_study_tables() {
        let db = Database::open_memory().unwrap();
        let mut stmt = db
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, ["focus_sessions", "lectures", "quiz_results"]);
    }

    #[test]
    fn lecture_roundtrip_and_delete() {
        let db = Database::open_memory().unwrap();
        let mut lecture = Lecture::new("Quantum Physics", date("2024-07-28"), Some("video/mp4".into()));
        db.save_lecture(&lecture).unwrap();

        lecture.mark_processed(ProcessedLectureData {
            summary: "Entanglement".into(),
            ..Default::default()
        });
        db.save_lecture(&lecture).unwrap();

        let loaded = db.lecture(&lecture.id).unwrap();
        assert_eq!(loaded, lecture);
        assert_eq!(db.lectures().unwrap().len(), 1);

        assert!(db.delete_lecture(&lecture.id).unwrap());
        assert!(!db.delete_lecture(&lecture.id).unwrap());
        assert!(matches!(
            db.lecture(&lecture.id),
            Err(CoreError::Database(DatabaseError::NotFound { .. }))
        ));
    }

    #[test]
    fn focus_sessions_roundtrip() {
        let db = Database::open_memory().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 8, 1, 9, 0, 0).unwrap();
        let mut record = session(start, 1200, 85);
        record.lecture_id = Some("abc".into());
        record.interventions = 2;
        let id = db.record_focus_session(&record).unwrap();

        let loaded = db.focus_sessions(10).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, id);
        assert_eq!(loaded[0].lecture_id.as_deref(), Some("abc"));
        assert_eq!(loaded[0].started_at, start);
        assert_eq!(loaded[0].interventions, 2);
    }

    #[test]
    fn stats_aggregate_sessions_and_quizzes() {
        let db = Database::open_memory().unwrap();
        let today = date("2024-08-03");
        for (day, secs, score) in [(1, 600, 100), (2, 1200, 90), (3, 1500, 80), (3, 300, 70)] {
            let at = Utc.with_ymd_and_hms(2024, 8, day, 10, 0, 0).unwrap();
            db.record_focus_session(&session(at, secs, score)).unwrap();
        }
        db.record_quiz_result("l1", 80.0, Utc::now()).unwrap();
        db.record_quiz_result("l1", 60.0, Utc::now()).unwrap();

        let stats = db.stats(today).unwrap();
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.total_focused_min, 60);
        assert_eq!(stats.today_sessions, 2);
        assert_eq!(stats.today_focused_min, 30);
        assert_eq!(stats.average_focus_score, Some(85.0));
        assert_eq!(stats.streak_days, 3);
        assert_eq!(stats.quizzes_taken, 2);
        assert_eq!(stats.average_quiz_score, Some(70.0));
        assert_eq!(db.quiz_results("l1").unwrap().len(), 2);
    }

    #[test]
    fn empty_stats() {
        let db = Database::open_memory().unwrap();
        let stats = db.stats(date("2024-08-03")).unwrap();
        assert_eq!(stats, StudyStats::default());
    }

    #[test]
    fn streak_counts_from_yesterday_and_stops_at_gap() {
        let today = date("2024-08-10");
        assert_eq!(streak_days(&[], today), 0);
        assert_eq!(streak_days(&[date("2024-08-10")], today), 1);
        assert_eq!(
            streak_days(&[date("2024-08-09"), date("2024-08-08"), date("2024-08-06")], today),
            2
        );
        assert_eq!(streak_days(&[date("2024-08-07")], today), 0);
    }
}
