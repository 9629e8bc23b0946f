use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use drill_core::model::{
    AttemptState, ConceptGroup, GroupId, GroupOutcome, QuizReport, SessionToken,
};

use crate::interactive::Delegation;
use crate::view::Notice;

/// Where the concept-group session stands as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    InGroup,
    Finished,
}

/// In-memory state of one concept-group session.
///
/// Groups are visited in order, one attempt cycle per displayed
/// question. Outcomes are keyed by group and written once, at the
/// group's first resolution; later questions from the same group never
/// rewrite them.
pub struct QuizSession {
    token: SessionToken,
    topic: String,
    groups: Vec<ConceptGroup>,
    cursor: usize,
    attempt: AttemptState,
    outcomes: HashMap<GroupId, GroupOutcome>,
    notice: Option<Notice>,
    delegation: Option<Delegation>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    pub(crate) fn new(
        token: SessionToken,
        topic: String,
        groups: Vec<ConceptGroup>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            topic,
            groups,
            cursor: 0,
            attempt: AttemptState::new(),
            outcomes: HashMap::new(),
            notice: None,
            delegation: None,
            started_at,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        if self.cursor < self.groups.len() {
            QuizPhase::InGroup
        } else {
            QuizPhase::Finished
        }
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// 1-based position of the current group.
    #[must_use]
    pub fn position(&self) -> usize {
        (self.cursor + 1).min(self.groups.len().max(1))
    }

    #[must_use]
    pub fn current_group(&self) -> Option<&ConceptGroup> {
        self.groups.get(self.cursor)
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&AttemptState> {
        if self.phase() == QuizPhase::InGroup {
            Some(&self.attempt)
        } else {
            None
        }
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Outstanding secondary-context delegation, if any.
    #[must_use]
    pub fn delegation(&self) -> Option<&Delegation> {
        self.delegation.as_ref()
    }

    #[must_use]
    pub fn outcome(&self, group_id: &GroupId) -> Option<&GroupOutcome> {
        self.outcomes.get(group_id)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Mastery breakdown over the outcomes recorded so far.
    #[must_use]
    pub fn report(&self) -> QuizReport {
        QuizReport::from_outcomes(
            u32::try_from(self.groups.len()).unwrap_or(u32::MAX),
            self.outcomes.iter(),
        )
    }

    pub(crate) fn current_group_mut(&mut self) -> Option<&mut ConceptGroup> {
        self.groups.get_mut(self.cursor)
    }

    pub(crate) fn attempt_mut(&mut self) -> &mut AttemptState {
        &mut self.attempt
    }

    /// First resolution wins; later questions from the group are
    /// bonus material and never rewrite the outcome.
    pub(crate) fn record_outcome(&mut self, group_id: GroupId, outcome: GroupOutcome) {
        self.outcomes.entry(group_id).or_insert(outcome);
    }

    /// Move to the next group; finishes the session past the last one.
    pub(crate) fn advance(&mut self, now: DateTime<Utc>) {
        self.cursor += 1;
        self.attempt = AttemptState::new();
        self.delegation = None;
        self.notice = None;
        if self.cursor >= self.groups.len() {
            self.completed_at = Some(now);
        }
    }

    /// Swap in a fresh question from the same group.
    pub(crate) fn present_replacement(&mut self) {
        self.attempt = AttemptState::new();
        self.delegation = None;
        self.notice = None;
    }

    pub(crate) fn set_delegation(&mut self, delegation: Delegation) {
        self.delegation = Some(delegation);
    }

    pub(crate) fn clear_delegation(&mut self) {
        self.delegation = None;
    }

    pub(crate) fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub(crate) fn clear_notice(&mut self) {
        self.notice = None;
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("token", &self.token)
            .field("topic", &self.topic)
            .field("groups", &self.groups.len())
            .field("cursor", &self.cursor)
            .field("resolved", &self.outcomes.len())
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}
