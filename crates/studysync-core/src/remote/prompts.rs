use chrono::NaiveDate;
use indoc::{formatdoc, indoc};

use super::LectureContext;
use crate::lecture::Lecture;

pub const CLASSIFY_FRAME: &str = indoc! {r#"
    Analyze the user's emotional state in this image from a webcam during a study session. Your primary determination should be if the user is "Focused" or not.

    - Focused: the user is looking straight ahead at the screen, eyes open, without significant head movement.
    - Otherwise classify the state as one of:
      - "Frustrated": shaking their head horizontally or showing clear signs of frustration.
      - "Bored": eyes closed, yawning, or looking away disinterestedly.
      - "Confused": tilted head, furrowed brow, or puzzled expression.

    Provide only the single word for the detected state as your response.
"#};

pub const PROCESS_MEDIA: &str = indoc! {r#"
    Based on the content of this file, please do the following:
    1. Transcribe the entire lecture if it's audio or video. If it's a document, extract the text.
    2. Provide a concise summary of the main topics.
    3. List the key concepts discussed.
    4. Generate 5 multiple-choice practice questions, each with 4 options, and clearly indicate the correct answer.
    5. Create a set of flashcards for the key concepts (front and back).
    6. Find 3 relevant YouTube video links that could supplement this material.

    Structure the entire output as a single JSON object with the following keys: "transcription", "summary", "keyConcepts", "practiceQuestions", "flashcards", "youtubeLinks".
"#};

fn lecture_block(context: &LectureContext) -> String {
    formatdoc! {"
        Lecture Summary:
        {summary}

        Key Concepts:
        {concepts}
        ",
        summary = context.summary,
        concepts = context.key_concepts.join(", "),
    }
}

pub fn remediation(context: &LectureContext) -> String {
    formatdoc! {"
        A student studying a lecture appears to be struggling (they might be confused, frustrated, or bored). First, provide a short, uplifting motivational message (1-2 sentences) to encourage them. Then, based on the following summary and key concepts from the lecture, provide a very simple, concise, one-paragraph explanation of the core idea to help them understand and re-engage.

        {block}",
        block = lecture_block(context),
    }
}

pub fn cornell_notes(context: &LectureContext) -> String {
    formatdoc! {r#"
        Based on the following lecture summary and key concepts, generate notes in the Cornell Note-taking format. The output must be a single, valid JSON object with two keys: "pairs" and "summary".
        - "pairs": An array of objects, each with string keys "cue" (a concise question or keyword) and "note" (the detailed point-form explanation for that cue).
        - "summary": A concise 2-3 sentence summary of the key information from the notes.

        {block}"#,
        block = lecture_block(context),
    }
}

pub fn quiz(topic: &str) -> String {
    format!(
        "Generate 10 unique multiple-choice questions about {topic}. For each question, provide 4 options and indicate the correct answer. Format the output as a JSON array of objects with keys \"question\", \"options\" and \"correctAnswer\"."
    )
}

pub fn retention(lecture: &Lecture, quiz_score_percent: f64, today: NaiveDate) -> String {
    let previous = lecture
        .retention_score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "N/A".into());
    let last_reviewed = lecture
        .last_reviewed
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Never".into());

    formatdoc! {r#"
        You are a learning expert specializing in spaced repetition based on the Ebbinghaus forgetting curve. A student is studying a lecture titled "{title}".

        Current state:
        - Previous Retention Score: {previous}
        - Last Reviewed: {last_reviewed}
        - Just completed a quiz with a score of: {score:.0}%

        Based on this new quiz score:
        1. Calculate the new Retention Score, a value between 0 and 100. A higher quiz score should significantly boost retention.
        2. Predict the next optimal review date, counting from today ({today}). The higher the retention, the longer the interval. Use YYYY-MM-DD.
        3. Generate a forgetting curve: 30 points showing predicted retention over the next 30 days, starting from the new retention score.

        Return a single JSON object with keys "retentionScore" (number), "nextReviewDate" (string, YYYY-MM-DD) and "forgettingCurve" (array of 30 objects with "day" from 1 to 30 and "retention" from 0 to 100)."#,
        title = lecture.title,
        score = quiz_score_percent,
    }
}

pub fn tutor_system(context: &LectureContext) -> String {
    formatdoc! {"
        You are 'Sync', a friendly and helpful AI tutor. Your goal is to help the user understand the provided lecture material. Keep your answers concise and easy to understand.
        Here is the context for the current lecture:
        - Title: {title}
        - Summary: {summary}
        - Key Concepts: {concepts}",
        title = context.title,
        summary = context.summary,
        concepts = context.key_concepts.join(", "),
    }
}
