use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use thiserror::Error;

use crate::model::QuestionId;

/// A single answer-choice letter, normalized to lowercase.
///
/// Ordering is the lowercase letter ordering, which makes displays and
/// canonical answers case-insensitive by construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceLetter(char);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("choice letter must be a single ascii letter, got {got:?}")]
pub struct ChoiceLetterError {
    pub got: String,
}

impl ChoiceLetter {
    /// Creates a choice letter from a single ASCII letter.
    ///
    /// # Errors
    ///
    /// Returns `ChoiceLetterError` if `ch` is not an ASCII letter.
    pub fn new(ch: char) -> Result<Self, ChoiceLetterError> {
        if ch.is_ascii_alphabetic() {
            Ok(Self(ch.to_ascii_lowercase()))
        } else {
            Err(ChoiceLetterError { got: ch.to_string() })
        }
    }

    /// Returns the lowercase letter.
    #[must_use]
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Debug for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChoiceLetter({})", self.0)
    }
}

impl fmt::Display for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChoiceLetter {
    type Err = ChoiceLetterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Self::new(ch),
            _ => Err(ChoiceLetterError {
                got: trimmed.to_string(),
            }),
        }
    }
}

/// How a question is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Exactly one choice must be selected.
    Single,
    /// Several choices must be selected.
    ///
    /// `required` is the collaborator-supplied selection count. When it
    /// is absent the count gate is deferred to the grader.
    Multi { required: Option<NonZeroUsize> },
    /// Rendered in a separate presentation context; no inline choices.
    Interactive,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("a choice question needs at least two choices, got {count}")]
    TooFewChoices { count: usize },
}

/// An exam-style question as presented to the student.
///
/// Display text is verbatim, never paraphrased. Immutable once fetched;
/// owned by a session for its display lifetime only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    choices: BTreeMap<ChoiceLetter, String>,
    kind: QuestionKind,
    number: u32,
    topic_tags: Vec<String>,
}

impl Question {
    /// Build a question, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` for blank display text and
    /// `QuestionError::TooFewChoices` when a non-interactive question
    /// carries fewer than two choices.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        choices: BTreeMap<ChoiceLetter, String>,
        kind: QuestionKind,
        number: u32,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if kind != QuestionKind::Interactive && choices.len() < 2 {
            return Err(QuestionError::TooFewChoices {
                count: choices.len(),
            });
        }

        Ok(Self {
            id,
            text,
            choices,
            kind,
            number,
            topic_tags: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_topic_tags(mut self, tags: Vec<String>) -> Self {
        self.topic_tags = tags;
        self
    }

    /// Same question re-numbered for its position within a session.
    #[must_use]
    pub fn with_number(mut self, number: u32) -> Self {
        self.number = number;
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Choices in display order (sorted by letter, case-insensitive).
    #[must_use]
    pub fn choices(&self) -> &BTreeMap<ChoiceLetter, String> {
        &self.choices
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn topic_tags(&self) -> &[String] {
        &self.topic_tags
    }

    #[must_use]
    pub fn is_multi_answer(&self) -> bool {
        matches!(self.kind, QuestionKind::Multi { .. })
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.kind == QuestionKind::Interactive
    }

    /// Collaborator-supplied selection count for multi-answer questions.
    #[must_use]
    pub fn required_selections(&self) -> Option<usize> {
        match self.kind {
            QuestionKind::Multi { required } => required.map(NonZeroUsize::get),
            _ => None,
        }
    }
}

/// Catalog entry for an interactive (drag-and-drop) question.
///
/// The engine never inspects its content; it only hands the entry to
/// the secondary presentation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveQuestion {
    pub id: QuestionId,
    pub title: String,
    pub instructions: String,
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn letters(s: &str) -> BTreeMap<ChoiceLetter, String> {
        s.chars()
            .map(|ch| (ChoiceLetter::new(ch).unwrap(), format!("choice {ch}")))
            .collect()
    }

    #[test]
    fn choice_letter_normalizes_case() {
        assert_eq!(ChoiceLetter::new('B').unwrap(), ChoiceLetter::new('b').unwrap());
        assert_eq!(ChoiceLetter::new('B').unwrap().to_string(), "b");
    }

    #[test]
    fn choice_letter_rejects_non_letters() {
        assert!(ChoiceLetter::new('3').is_err());
        assert!("ab".parse::<ChoiceLetter>().is_err());
        assert_eq!(" C ".parse::<ChoiceLetter>().unwrap().as_char(), 'c');
    }

    #[test]
    fn choices_are_ordered_by_letter() {
        let mut choices = BTreeMap::new();
        for ch in ['D', 'a', 'C', 'b'] {
            choices.insert(ChoiceLetter::new(ch).unwrap(), String::from("x"));
        }
        let q = Question::new(
            QuestionId::new("q1"),
            "Which?",
            choices,
            QuestionKind::Single,
            1,
        )
        .unwrap();
        let order: String = q.choices().keys().map(ChoiceLetter::as_char).collect();
        assert_eq!(order, "abcd");
    }

    #[test]
    fn non_interactive_needs_two_choices() {
        let err = Question::new(
            QuestionId::new("q1"),
            "Which?",
            letters("a"),
            QuestionKind::Single,
            1,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::TooFewChoices { count: 1 });
    }

    #[test]
    fn interactive_question_carries_no_choices() {
        let q = Question::new(
            QuestionId::new("dd1"),
            "Match the layers",
            BTreeMap::new(),
            QuestionKind::Interactive,
            1,
        )
        .unwrap();
        assert!(q.is_interactive());
        assert!(q.choices().is_empty());
    }

    #[test]
    fn required_selections_comes_from_kind() {
        let q = Question::new(
            QuestionId::new("q1"),
            "Pick two",
            letters("abcd"),
            QuestionKind::Multi {
                required: NonZeroUsize::new(2),
            },
            1,
        )
        .unwrap();
        assert_eq!(q.required_selections(), Some(2));
        assert!(q.is_multi_answer());
    }
}
