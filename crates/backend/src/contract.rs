//! Request/response contract with the grading and content collaborators.
//!
//! The engine treats everything behind these traits as opaque: grading,
//! hint/explanation generation and the concept-group source of truth
//! all live on the other side of this boundary.

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

use drill_core::model::{
    ChoiceLetter, ConceptGroup, GroupId, InteractiveQuestion, MissedQuestion, Question,
    QuestionId, SessionToken, SubmittedAnswer,
};

/// Errors surfaced by collaborator adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    #[error("no active session")]
    SessionExpired,

    /// Soft signal: the group has no unseen questions left.
    #[error("no more questions in this group")]
    GroupExhausted,

    #[error("collaborator rejected the request: {0}")]
    Rejected(String),

    #[error("malformed collaborator payload: {0}")]
    Payload(String),

    #[error("request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// First response of a linear practice session.
#[derive(Debug, Clone)]
pub struct PracticeStart {
    pub topic_name: String,
    pub total_questions: usize,
    pub first_question: Question,
}

/// Grading response for a linear practice submission.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub correct: bool,
    /// Explanation when correct, hint when incorrect.
    pub feedback: String,
    pub attempt: u32,
    pub can_reveal: bool,
    pub disabled_choices: Vec<ChoiceLetter>,
    pub correct_answer: Option<String>,
}

/// Disclosure response after exhausted retries.
#[derive(Debug, Clone)]
pub struct RevealedAnswer {
    /// Correct letter(s), canonical comma-joined form.
    pub correct_answer: String,
    /// Display text, e.g. "B. 224.0.0.5".
    pub correct_answer_text: String,
    pub feedback: String,
}

/// Either the next question or the end of the sequence.
#[derive(Debug, Clone)]
pub enum Advance {
    Next(Question),
    Done,
}

/// Aggregates reported by the collaborator for a linear session.
#[derive(Debug, Clone)]
pub struct PracticeSummaryData {
    pub total_questions: u32,
    pub answered: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub skipped: u32,
    pub missed: Vec<MissedQuestion>,
}

/// Collaborator boundary for linear practice sessions.
#[async_trait]
pub trait PracticeBackend: Send + Sync {
    /// Start a session for a topic, returning the first question.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for an unknown topic or a topic
    /// without questions.
    async fn start(&self, topic: &str) -> Result<PracticeStart, BackendError>;

    /// Grade a normalized answer for the given question.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` for transport failures or an expired session.
    async fn check_answer(
        &self,
        question_id: &QuestionId,
        answer: &SubmittedAnswer,
        attempt: u32,
    ) -> Result<Verdict, BackendError>;

    /// Disclose the correct answer with a full explanation.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` for transport failures or an unknown question.
    async fn reveal(&self, question_id: &QuestionId) -> Result<RevealedAnswer, BackendError>;

    /// Skip the given question and fetch the next one.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` for transport failures or an expired session.
    async fn skip(&self, question_id: &QuestionId) -> Result<Advance, BackendError>;

    /// Fetch the next question after a correct answer or reveal.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` for transport failures or an expired session.
    async fn next(&self) -> Result<Advance, BackendError>;

    /// Fetch the collaborator-side aggregates for the session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` for transport failures or an expired session.
    async fn summary(&self) -> Result<PracticeSummaryData, BackendError>;
}

/// First response of a concept-group session.
#[derive(Debug, Clone)]
pub struct QuizStart {
    pub token: SessionToken,
    pub topic: String,
    pub groups: Vec<ConceptGroup>,
}

/// Group-scoped submission payload.
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub token: &'a SessionToken,
    pub question_id: &'a QuestionId,
    pub answer: &'a SubmittedAnswer,
    pub attempt: u32,
    pub group_id: &'a GroupId,
}

/// Grading response for a group-scoped submission.
#[derive(Debug, Clone)]
pub enum QuizVerdict {
    Correct {
        explanation: String,
        attempts_needed: u32,
        /// Unseen alternatives left in the group after this answer.
        more_in_group: usize,
    },
    Incorrect {
        hint: String,
        attempt: u32,
    },
}

/// Another question from the same group.
#[derive(Debug, Clone)]
pub struct GroupQuestion {
    pub question: Question,
    pub remaining_in_group: usize,
}

/// Collaborator boundary for concept-group sessions.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Start a session: one representative question per concept group.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the topic has no groups.
    async fn start(&self, topic: &str) -> Result<QuizStart, BackendError>;

    /// Grade a group-scoped submission.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::SessionExpired` for an unknown token and
    /// `BackendError` for transport failures.
    async fn submit(&self, request: SubmitRequest<'_>) -> Result<QuizVerdict, BackendError>;

    /// Disclose the correct answer within a group session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` for transport failures or an unknown question.
    async fn reveal(
        &self,
        token: &SessionToken,
        question_id: &QuestionId,
    ) -> Result<RevealedAnswer, BackendError>;

    /// Fetch another question from the group, excluding seen ids.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::GroupExhausted` when nothing unseen
    /// remains — a soft signal, not a failure.
    async fn group_question(
        &self,
        group_id: &GroupId,
        token: &SessionToken,
        exclude: &BTreeSet<QuestionId>,
    ) -> Result<GroupQuestion, BackendError>;

    /// Fetch the static catalog of interactive questions.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` for transport failures.
    async fn interactive_catalog(&self) -> Result<Vec<InteractiveQuestion>, BackendError>;
}
