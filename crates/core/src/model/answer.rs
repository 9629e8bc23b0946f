use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::model::{ChoiceLetter, Question, QuestionKind};

/// The student's current choice selection, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Radio-style selection for single-answer questions.
    Single(Option<ChoiceLetter>),
    /// Checkbox-style selection for multi-answer questions.
    Multi(BTreeSet<ChoiceLetter>),
}

impl Selection {
    #[must_use]
    pub fn none_for(question: &Question) -> Self {
        if question.is_multi_answer() {
            Self::Multi(BTreeSet::new())
        } else {
            Self::Single(None)
        }
    }

    #[must_use]
    pub fn single(letter: ChoiceLetter) -> Self {
        Self::Single(Some(letter))
    }

    #[must_use]
    pub fn multi<I: IntoIterator<Item = ChoiceLetter>>(letters: I) -> Self {
        Self::Multi(letters.into_iter().collect())
    }

    /// Flip one checkbox; selecting an already selected letter clears it.
    pub fn toggle(&mut self, letter: ChoiceLetter) {
        match self {
            Self::Single(current) => {
                if *current == Some(letter) {
                    *current = None;
                } else {
                    *current = Some(letter);
                }
            }
            Self::Multi(set) => {
                if !set.remove(&letter) {
                    set.insert(letter);
                }
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(current) => current.is_none(),
            Self::Multi(set) => set.is_empty(),
        }
    }
}

/// Validation failures that never reach the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("select an answer first")]
    NothingSelected,

    #[error("select exactly {expected} answers ({actual} selected)")]
    CountMismatch { expected: usize, actual: usize },

    #[error("choice {letter} is not part of this question")]
    UnknownChoice { letter: ChoiceLetter },

    #[error("selection shape does not match the question type")]
    ShapeMismatch,

    #[error("interactive questions are not answered by choice selection")]
    NotAnswerable,
}

/// Canonical answer value sent to the grading collaborator.
///
/// Single answers are one lowercase letter; multi answers are the
/// selected letters sorted lexicographically and comma-joined, so the
/// value is independent of click order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer(String);

impl SubmittedAnswer {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmittedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Selection {
    /// Normalize the selection against a question, gating submission.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError` when nothing is selected, the selected
    /// count does not match a known required count, a letter is not one
    /// of the question's choices, or the selection shape does not fit
    /// the question kind.
    pub fn normalize(&self, question: &Question) -> Result<SubmittedAnswer, SelectionError> {
        if question.is_interactive() {
            return Err(SelectionError::NotAnswerable);
        }

        match (self, question.kind()) {
            (Self::Single(current), QuestionKind::Single) => {
                let letter = (*current).ok_or(SelectionError::NothingSelected)?;
                if !question.choices().contains_key(&letter) {
                    return Err(SelectionError::UnknownChoice { letter });
                }
                Ok(SubmittedAnswer(letter.to_string()))
            }
            (Self::Multi(set), QuestionKind::Multi { .. }) => {
                if set.is_empty() {
                    return Err(SelectionError::NothingSelected);
                }
                if let Some(&letter) = set.iter().find(|l| !question.choices().contains_key(l)) {
                    return Err(SelectionError::UnknownChoice { letter });
                }
                // Required count is collaborator-supplied; without it the
                // count gate falls to the grader.
                if let Some(expected) = question.required_selections() {
                    if set.len() != expected {
                        return Err(SelectionError::CountMismatch {
                            expected,
                            actual: set.len(),
                        });
                    }
                }
                let joined = set
                    .iter()
                    .map(ChoiceLetter::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                Ok(SubmittedAnswer(joined))
            }
            _ => Err(SelectionError::ShapeMismatch),
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionId;
    use std::collections::BTreeMap;
    use std::num::NonZeroUsize;

    fn letter(ch: char) -> ChoiceLetter {
        ChoiceLetter::new(ch).unwrap()
    }

    fn choices(s: &str) -> BTreeMap<ChoiceLetter, String> {
        s.chars()
            .map(|ch| (letter(ch), format!("choice {ch}")))
            .collect()
    }

    fn single_question() -> Question {
        Question::new(
            QuestionId::new("q1"),
            "Which protocol uses DUAL?",
            choices("abcd"),
            QuestionKind::Single,
            1,
        )
        .unwrap()
    }

    fn multi_question(required: usize) -> Question {
        Question::new(
            QuestionId::new("q2"),
            "Pick the matching pair",
            choices("abcd"),
            QuestionKind::Multi {
                required: NonZeroUsize::new(required),
            },
            2,
        )
        .unwrap()
    }

    #[test]
    fn single_selection_normalizes_to_letter() {
        let q = single_question();
        let answer = Selection::single(letter('B')).normalize(&q).unwrap();
        assert_eq!(answer.as_str(), "b");
    }

    #[test]
    fn empty_selection_is_rejected() {
        let q = single_question();
        assert_eq!(
            Selection::Single(None).normalize(&q).unwrap_err(),
            SelectionError::NothingSelected
        );
        let m = multi_question(2);
        assert_eq!(
            Selection::Multi(BTreeSet::new()).normalize(&m).unwrap_err(),
            SelectionError::NothingSelected
        );
    }

    #[test]
    fn multi_selection_count_must_match_required() {
        let q = multi_question(2);
        let err = Selection::multi([letter('a')]).normalize(&q).unwrap_err();
        assert_eq!(
            err,
            SelectionError::CountMismatch {
                expected: 2,
                actual: 1
            }
        );
        let err = Selection::multi([letter('a'), letter('b'), letter('c')])
            .normalize(&q)
            .unwrap_err();
        assert_eq!(
            err,
            SelectionError::CountMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn multi_answer_is_canonical_regardless_of_click_order() {
        let q = multi_question(2);
        let mut selection = Selection::none_for(&q);
        selection.toggle(letter('c'));
        selection.toggle(letter('a'));
        assert_eq!(selection.normalize(&q).unwrap().as_str(), "a,c");
    }

    #[test]
    fn unknown_required_count_defers_to_grader() {
        let q = multi_question(0); // NonZeroUsize::new(0) == None
        let answer = Selection::multi([letter('d'), letter('b'), letter('a')])
            .normalize(&q)
            .unwrap();
        assert_eq!(answer.as_str(), "a,b,d");
    }

    #[test]
    fn letters_outside_the_question_are_rejected() {
        let q = single_question();
        let err = Selection::single(letter('z')).normalize(&q).unwrap_err();
        assert_eq!(err, SelectionError::UnknownChoice { letter: letter('z') });
    }

    #[test]
    fn toggle_clears_a_repeated_single_choice() {
        let q = single_question();
        let mut selection = Selection::none_for(&q);
        selection.toggle(letter('a'));
        selection.toggle(letter('a'));
        assert!(selection.is_empty());
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let q = multi_question(2);
        let err = Selection::single(letter('a')).normalize(&q).unwrap_err();
        assert_eq!(err, SelectionError::ShapeMismatch);
    }
}
