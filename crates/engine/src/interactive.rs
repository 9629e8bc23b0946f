//! Delegation of interactive questions to a secondary presentation
//! context.
//!
//! The secondary context is an independently navigable surface (a popup
//! viewer in the reference deployment). The engine owns at most one at
//! a time and resumes via an asynchronous completion message rather
//! than a direct response.

use serde::Deserialize;
use thiserror::Error;

use drill_core::model::{Question, QuestionId};

/// Message type tag used on the completion channel.
pub const COMPLETION_MESSAGE_TYPE: &str = "dragDropComplete";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MessageError {
    #[error("unexpected message type {0:?}")]
    WrongType(String),

    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// Completion report from the secondary context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMessage {
    pub question_id: QuestionId,
    pub completed: bool,
    pub correct: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionWire {
    r#type: String,
    question_id: String,
    #[serde(default = "default_completed")]
    completed: bool,
    #[serde(default)]
    correct: bool,
}

fn default_completed() -> bool {
    true
}

impl CompletionMessage {
    #[must_use]
    pub fn new(question_id: QuestionId, completed: bool, correct: bool) -> Self {
        Self {
            question_id,
            completed,
            correct,
        }
    }

    /// Parse a channel message, rejecting foreign message types.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::WrongType` for a tag other than
    /// [`COMPLETION_MESSAGE_TYPE`] and `MessageError::Parse` for
    /// malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, MessageError> {
        let wire: CompletionWire = serde_json::from_str(raw)?;
        if wire.r#type != COMPLETION_MESSAGE_TYPE {
            return Err(MessageError::WrongType(wire.r#type));
        }
        Ok(Self {
            question_id: QuestionId::new(wire.question_id),
            completed: wire.completed,
            correct: wire.correct,
        })
    }
}

/// Failure opening or driving the secondary context.
#[derive(Debug, Error)]
#[error("interactive surface error: {0}")]
pub struct SurfaceError(String);

impl SurfaceError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The secondary presentation context.
///
/// Implementations size and center the context for the content and
/// replace any prior context rather than stacking windows; `open` on a
/// surface that is already showing something must supersede it.
pub trait InteractiveSurface {
    /// Show the question in the secondary context.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceError` if the context cannot be opened.
    fn open(&mut self, question: &Question) -> Result<(), SurfaceError>;

    /// Close the context if one is showing.
    fn close(&mut self);
}

/// Engine-side record of an outstanding delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    opens: u32,
}

impl Delegation {
    pub(crate) fn first_open() -> Self {
        Self { opens: 1 }
    }

    pub(crate) fn reopened(&self) -> Self {
        Self {
            opens: self.opens + 1,
        }
    }

    /// How many times the context has been opened for this question.
    #[must_use]
    pub fn opens(&self) -> u32 {
        self.opens
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_completion_message() {
        let msg = CompletionMessage::from_json(
            r#"{"type": "dragDropComplete", "questionId": "dd_4", "correct": true}"#,
        )
        .unwrap();
        assert_eq!(msg.question_id, QuestionId::new("dd_4"));
        assert!(msg.completed);
        assert!(msg.correct);
    }

    #[test]
    fn rejects_foreign_message_types() {
        let err = CompletionMessage::from_json(
            r#"{"type": "resize", "questionId": "dd_4", "correct": false}"#,
        )
        .unwrap_err();
        assert!(matches!(err, MessageError::WrongType(t) if t == "resize"));
    }

    #[test]
    fn explicit_incomplete_is_preserved() {
        let msg = CompletionMessage::from_json(
            r#"{"type": "dragDropComplete", "questionId": "dd_4", "completed": false, "correct": false}"#,
        )
        .unwrap();
        assert!(!msg.completed);
        assert!(!msg.correct);
    }
}
