//! Per-lecture tutor conversation.

use log::warn;

use crate::remote::prompts;
use crate::remote::{ChatModel, ChatRole, ChatTurn, LectureContext};

pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Owns the conversation for one lecture. A failed call throws the history
/// away; the next message starts a fresh conversation.
pub struct TutorChat<'a> {
    model: &'a dyn ChatModel,
    context: LectureContext,
    system: Option<String>,
    turns: Vec<ChatTurn>,
}

/// What the learner sees for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorReply {
    pub text: String,
    pub failed: bool,
}

impl<'a> TutorChat<'a> {
    pub fn new(model: &'a dyn ChatModel, context: LectureContext) -> Self {
        Self {
            model,
            context,
            system: None,
            turns: Vec::new(),
        }
    }

    pub fn context(&self) -> &LectureContext {
        &self.context
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_seeded(&self) -> bool {
        self.system.is_some()
    }

    pub async fn send(&mut self, message: &str) -> TutorReply {
        let system = self
            .system
            .get_or_insert_with(|| prompts::tutor_system(&self.context))
            .clone();
        self.turns.push(ChatTurn {
            role: ChatRole::User,
            text: message.to_string(),
        });

        match self.model.chat(&system, &self.turns).await {
            Ok(text) => {
                self.turns.push(ChatTurn {
                    role: ChatRole::Model,
                    text: text.clone(),
                });
                TutorReply { text, failed: false }
            }
            Err(e) => {
                warn!("tutor chat for '{}' failed: {e}", self.context.title);
                self.invalidate();
                TutorReply {
                    text: APOLOGY.to_string(),
                    failed: true,
                }
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.system = None;
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with the number of turns it was given; fails when told to.
    struct Scripted {
        fail_next: Mutex<bool>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                fail_next: Mutex::new(false),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn chat(&self, system: &str, turns: &[ChatTurn]) -> Result<String, RemoteError> {
            self.seen.lock().unwrap().push((system.to_string(), turns.len()));
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(RemoteError::MalformedResponse("boom".into()));
            }
            Ok(format!("reply to {} turns", turns.len()))
        }
    }

    fn context() -> LectureContext {
        LectureContext {
            title: "Cell Biology".into(),
            summary: "Cells.".into(),
            key_concepts: vec!["ATP".into()],
        }
    }

    #[tokio::test]
    async fn history_accumulates() {
        let model = Scripted::new();
        let mut chat = TutorChat::new(&model, context());
        assert_eq!(chat.send("hi").await.text, "reply to 1 turns");
        assert_eq!(chat.send("more").await.text, "reply to 3 turns");
        assert_eq!(chat.turns().len(), 4);

        let seen = model.seen.lock().unwrap();
        assert!(seen[0].0.contains("Summary: Cells."));
        assert!(seen[0].0.contains("Key Concepts: ATP"));
    }

    #[tokio::test]
    async fn failure_apologises_and_reseeds() {
        let model = Scripted::new();
        let mut chat = TutorChat::new(&model, context());
        chat.send("hi").await;

        *model.fail_next.lock().unwrap() = true;
        let reply = chat.send("again").await;
        assert!(reply.failed);
        assert_eq!(reply.text, APOLOGY);
        assert!(!chat.is_seeded());
        assert!(chat.turns().is_empty());

        // Next message starts over with a single turn.
        assert_eq!(chat.send("fresh").await.text, "reply to 1 turns");
        assert!(chat.is_seeded());
    }
}
