use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::{GroupId, Question, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GroupError {
    #[error("question {id} was already shown in this group")]
    AlreadySeen { id: QuestionId },
}

/// A cluster of differently-worded questions testing one fact.
///
/// Holds the current representative question plus the ids already
/// shown this session, so "more on this concept" never repeats. The
/// seen set only grows; the whole group is discarded with the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptGroup {
    id: GroupId,
    concept: String,
    question: Question,
    group_size: usize,
    seen: BTreeSet<QuestionId>,
}

impl ConceptGroup {
    #[must_use]
    pub fn new(
        id: GroupId,
        concept: impl Into<String>,
        question: Question,
        group_size: usize,
    ) -> Self {
        let mut seen = BTreeSet::new();
        seen.insert(question.id().clone());
        Self {
            id,
            concept: concept.into(),
            question,
            group_size: group_size.max(1),
            seen,
        }
    }

    #[must_use]
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    #[must_use]
    pub fn concept(&self) -> &str {
        &self.concept
    }

    /// The representative question currently on display.
    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Total alternative questions in the group, representative included.
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Question ids already shown this session.
    #[must_use]
    pub fn seen(&self) -> &BTreeSet<QuestionId> {
        &self.seen
    }

    /// Alternatives not yet shown.
    #[must_use]
    pub fn unseen_remaining(&self) -> usize {
        self.group_size.saturating_sub(self.seen.len())
    }

    /// Install a freshly fetched alternative as the representative.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::AlreadySeen` if the question was shown
    /// before; the collaborator is expected to honor the exclusion
    /// list, so a repeat is a contract violation, not user error.
    pub fn replace_question(&mut self, question: Question) -> Result<(), GroupError> {
        if !self.seen.insert(question.id().clone()) {
            return Err(GroupError::AlreadySeen {
                id: question.id().clone(),
            });
        }
        self.question = question;
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
