use chrono::{DateTime, Utc};
use std::fmt;

use drill_core::model::{
    AttemptState, MissedQuestion, PracticeSummary, Question,
};

use crate::view::Notice;

/// Where the linear session stands as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticePhase {
    InQuestion,
    Summary,
}

#[derive(Debug, Clone)]
pub(crate) struct CurrentQuestion {
    pub(crate) question: Question,
    pub(crate) attempt: AttemptState,
}

/// Snapshot of linear session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeProgress {
    pub total: usize,
    pub position: usize,
    pub correct: u32,
    pub incorrect: u32,
    pub skipped: u32,
    pub is_complete: bool,
}

/// In-memory state of one linear drill.
///
/// The single mutable root for the drill: created at start, discarded
/// at the end or on restart. Counters are only ever derived from what
/// happened here.
pub struct PracticeSession {
    topic_name: String,
    total_questions: usize,
    current: Option<CurrentQuestion>,
    cursor: usize,
    correct: u32,
    incorrect: u32,
    skipped: u32,
    missed: Vec<MissedQuestion>,
    notice: Option<Notice>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl PracticeSession {
    pub(crate) fn new(
        topic_name: String,
        total_questions: usize,
        first_question: Question,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            topic_name,
            total_questions,
            current: Some(CurrentQuestion {
                question: first_question,
                attempt: AttemptState::new(),
            }),
            cursor: 1,
            correct: 0,
            incorrect: 0,
            skipped: 0,
            missed: Vec::new(),
            notice: None,
            started_at,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    /// 1-based position of the current question; monotonic.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn phase(&self) -> PracticePhase {
        if self.current.is_some() {
            PracticePhase::InQuestion
        } else {
            PracticePhase::Summary
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref().map(|c| &c.question)
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&AttemptState> {
        self.current.as_ref().map(|c| &c.attempt)
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn progress(&self) -> PracticeProgress {
        PracticeProgress {
            total: self.total_questions,
            position: self.cursor,
            correct: self.correct,
            incorrect: self.incorrect,
            skipped: self.skipped,
            is_complete: self.is_complete(),
        }
    }

    /// End-of-drill aggregate, derived from this session's counters.
    #[must_use]
    pub fn summary(&self) -> PracticeSummary {
        PracticeSummary::from_results(
            u32::try_from(self.total_questions).unwrap_or(u32::MAX),
            self.correct,
            self.incorrect,
            self.skipped,
            self.missed.clone(),
        )
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut CurrentQuestion> {
        self.current.as_mut()
    }

    /// Display a new question; per-question attempt state resets here.
    pub(crate) fn present(&mut self, question: Question) {
        self.cursor += 1;
        self.notice = None;
        self.current = Some(CurrentQuestion {
            question,
            attempt: AttemptState::new(),
        });
    }

    pub(crate) fn finish(&mut self, at: DateTime<Utc>) {
        self.current = None;
        self.notice = None;
        self.completed_at = Some(at);
    }

    pub(crate) fn record_correct(&mut self) {
        self.correct += 1;
    }

    pub(crate) fn record_missed(&mut self, entry: MissedQuestion) {
        self.incorrect += 1;
        self.missed.push(entry);
    }

    pub(crate) fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub(crate) fn clear_notice(&mut self) {
        self.notice = None;
    }
}

impl fmt::Debug for PracticeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PracticeSession")
            .field("topic_name", &self.topic_name)
            .field("total_questions", &self.total_questions)
            .field("cursor", &self.cursor)
            .field("correct", &self.correct)
            .field("incorrect", &self.incorrect)
            .field("skipped", &self.skipped)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}
