use std::sync::Arc;

use log::{debug, warn};

use backend::{BackendError, QuizBackend, QuizVerdict, SubmitRequest};
use drill_core::Clock;
use drill_core::model::{
    AttemptEvent, GroupOutcome, InteractiveQuestion, QuizReport, Selection,
};

use crate::error::EngineError;
use crate::interactive::{CompletionMessage, Delegation, InteractiveSurface};
use crate::quiz::session::QuizSession;
use crate::view::{Notice, QuizView, quiz_view};

/// What became of a "more from this group" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreOutcome {
    /// A fresh alternative replaced the current question.
    Replaced,
    /// Nothing unseen remained; the session moved to the next group.
    Exhausted,
}

/// What the engine did with a completion message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDisposition {
    /// Stale or foreign message; state untouched.
    Ignored,
    /// The current question resolved as correct.
    Resolved,
    /// The attempt failed; retry and advance stay available.
    RetryOffered,
}

/// Driver for a concept-group session.
///
/// Owns the session, the collaborator handle and the interactive
/// catalog cache. The cache outlives individual sessions, so a restart
/// costs no extra catalog fetch.
pub struct QuizFlow {
    backend: Arc<dyn QuizBackend>,
    clock: Clock,
    session: Option<QuizSession>,
    catalog: Option<Vec<InteractiveQuestion>>,
}

impl QuizFlow {
    #[must_use]
    pub fn new(backend: Arc<dyn QuizBackend>) -> Self {
        Self {
            backend,
            clock: Clock::default(),
            session: None,
            catalog: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    /// Render model for the current state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Empty` before the first successful start.
    pub fn view(&self) -> Result<QuizView, EngineError> {
        let session = self.session.as_ref().ok_or(EngineError::Empty)?;
        Ok(quiz_view(session))
    }

    /// Begin a session for the topic, discarding any previous one.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` (wrapped) when the topic has no
    /// concept groups; any previous session survives the failure.
    pub async fn start(&mut self, topic: &str) -> Result<(), EngineError> {
        let start = self.backend.start(topic).await?;
        if start.groups.is_empty() {
            return Err(EngineError::Empty);
        }
        debug!(
            "quiz started: topic={} groups={} token={}",
            start.topic, start.groups.len(), start.token
        );
        self.session = Some(QuizSession::new(
            start.token,
            start.topic,
            start.groups,
            self.clock.now(),
        ));
        Ok(())
    }

    /// Start over on the same topic.
    ///
    /// Cursor and outcomes reset with the new session; the interactive
    /// catalog cache is retained.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Empty` before the first start, and start
    /// errors as [`QuizFlow::start`] does.
    pub async fn restart(&mut self) -> Result<(), EngineError> {
        let topic = self
            .session
            .as_ref()
            .ok_or(EngineError::Empty)?
            .topic()
            .to_string();
        self.start(&topic).await
    }

    /// Submit the student's selection for the current group's question.
    ///
    /// A correct verdict records the group outcome if this was the
    /// group's first resolution; when it reports no unseen alternatives
    /// left, an informational notice marks the group as fully covered.
    /// A wrong single-letter submission is struck locally, since group
    /// grading reports no disabled set.
    ///
    /// # Errors
    ///
    /// Returns selection/attempt errors without touching the
    /// collaborator, and `EngineError::Backend` after a failed
    /// round-trip (the attempt is not consumed).
    pub async fn submit(&mut self, selection: &Selection) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let group = session.current_group().ok_or(EngineError::Completed)?;
        let question = group.question();

        let answer = selection.normalize(question)?;
        let struck = match selection {
            Selection::Single(Some(letter)) => vec![*letter],
            _ => Vec::new(),
        };
        let question_id = question.id().clone();
        let group_id = group.id().clone();
        let concept = group.concept().to_string();
        let token = session.token().clone();

        session.attempt_mut().apply(AttemptEvent::SubmitStarted)?;
        let attempt_no = session.attempt_mut().attempt();
        session.clear_notice();

        let result = self
            .backend
            .submit(SubmitRequest {
                token: &token,
                question_id: &question_id,
                answer: &answer,
                attempt: attempt_no,
                group_id: &group_id,
            })
            .await;

        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        match result {
            Ok(QuizVerdict::Correct {
                explanation,
                more_in_group,
                ..
            }) => {
                session
                    .attempt_mut()
                    .apply(AttemptEvent::CorrectVerdict { explanation })?;
                session.record_outcome(
                    group_id,
                    GroupOutcome {
                        first_attempt_correct: attempt_no == 1,
                        attempts: attempt_no,
                        concept,
                    },
                );
                if more_in_group == 0 {
                    session.set_notice(Notice::Info(
                        "You've covered every question on this concept.".to_string(),
                    ));
                }
                Ok(())
            }
            Ok(QuizVerdict::Incorrect { hint, .. }) => {
                session.attempt_mut().apply(AttemptEvent::IncorrectVerdict {
                    hint,
                    disabled: struck,
                })?;
                Ok(())
            }
            Err(err) => {
                warn!("quiz submit failed for {question_id}: {err}");
                session.attempt_mut().apply(AttemptEvent::FetchFailed)?;
                session.set_notice(Notice::Danger(
                    "Could not check your answer. Please try again.".to_string(),
                ));
                Err(err.into())
            }
        }
    }

    /// Re-enable inputs for another try after a wrong answer.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` (wrapped) outside the
    /// incorrect-feedback phase.
    pub fn retry(&mut self) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        session.attempt_mut().apply(AttemptEvent::RetryRequested)?;
        session.clear_notice();
        Ok(())
    }

    /// Disclose the correct answer; resolves the group as incorrect.
    ///
    /// The recorded attempt count includes the reveal itself, so two
    /// wrong submissions plus a reveal record three attempts.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::RevealLocked` (wrapped) before two wrong
    /// attempts, and `EngineError::Backend` if the disclosure fetch
    /// fails with the feedback state untouched.
    pub async fn reveal(&mut self) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let group = session.current_group().ok_or(EngineError::Completed)?;
        let attempt = session.attempt().ok_or(EngineError::Completed)?;
        if !attempt.can_reveal() {
            return Err(drill_core::model::AttemptError::RevealLocked.into());
        }
        let question_id = group.question().id().clone();
        let group_id = group.id().clone();
        let concept = group.concept().to_string();
        let token = session.token().clone();

        let revealed = match self.backend.reveal(&token, &question_id).await {
            Ok(revealed) => revealed,
            Err(err) => {
                warn!("quiz reveal failed for {question_id}: {err}");
                let session = self.session.as_mut().ok_or(EngineError::Empty)?;
                session.set_notice(Notice::Danger(
                    "Could not fetch the answer. Please try again.".to_string(),
                ));
                return Err(err.into());
            }
        };

        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        session.attempt_mut().apply(AttemptEvent::RevealTaken {
            answer_text: revealed.correct_answer_text,
            explanation: revealed.feedback,
        })?;
        let attempts = session
            .attempt()
            .map_or(0, |a| a.wrong_attempts())
            .saturating_add(1);
        session.record_outcome(
            group_id,
            GroupOutcome {
                first_attempt_correct: false,
                attempts,
                concept,
            },
        );
        session.clear_notice();
        Ok(())
    }

    /// Fetch another question from the current group.
    ///
    /// Only offered once the group is resolved; its outcome is already
    /// on record, so further questions are bonus material. Exhaustion
    /// is a soft signal that advances to the next group.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Unresolved` before the group resolves,
    /// `GroupError::AlreadySeen` (wrapped) if the collaborator repeats
    /// a question, and `EngineError::Backend` on transport failure.
    pub async fn more_from_group(&mut self) -> Result<MoreOutcome, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let group = session.current_group().ok_or(EngineError::Completed)?;
        let attempt = session.attempt().ok_or(EngineError::Completed)?;
        if !attempt.is_resolved() {
            return Err(EngineError::Unresolved);
        }
        let group_id = group.id().clone();
        let exclude = group.seen().clone();
        let token = session.token().clone();

        let result = self
            .backend
            .group_question(&group_id, &token, &exclude)
            .await;

        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        match result {
            Ok(fetched) => {
                let group = session.current_group_mut().ok_or(EngineError::Completed)?;
                group.replace_question(fetched.question)?;
                session.present_replacement();
                Ok(MoreOutcome::Replaced)
            }
            Err(BackendError::GroupExhausted) => {
                debug!("group {group_id} exhausted, advancing");
                session.advance(self.clock.now());
                session.set_notice(Notice::Info(
                    "You've covered every question on that concept.".to_string(),
                ));
                Ok(MoreOutcome::Exhausted)
            }
            Err(err) => {
                warn!("group question fetch failed for {group_id}: {err}");
                session.set_notice(Notice::Danger(
                    "Could not load another question. Please try again.".to_string(),
                ));
                Err(err.into())
            }
        }
    }

    /// Move on to the next concept group.
    ///
    /// Allowed at any point in the attempt cycle; a group left
    /// unresolved simply records no outcome.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Empty` before the first start.
    pub fn next_group(&mut self) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        if session.current_group().is_none() {
            return Err(EngineError::Completed);
        }
        session.advance(self.clock.now());
        Ok(())
    }

    /// Mastery breakdown over the groups resolved so far.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Empty` before the first start.
    pub fn report(&self) -> Result<QuizReport, EngineError> {
        let session = self.session.as_ref().ok_or(EngineError::Empty)?;
        Ok(session.report())
    }

    /// The static interactive-question catalog, fetched once and cached
    /// across sessions.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Backend` on transport failure; the cache
    /// stays empty and the next call retries.
    pub async fn interactive_catalog(&mut self) -> Result<&[InteractiveQuestion], EngineError> {
        if self.catalog.is_none() {
            let fetched = self.backend.interactive_catalog().await?;
            debug!("interactive catalog loaded: {} entries", fetched.len());
            self.catalog = Some(fetched);
        }
        Ok(self.catalog.as_deref().unwrap_or_default())
    }

    /// Hand the current interactive question to the secondary context.
    ///
    /// Any prior context is closed first; reopening the same question
    /// keeps one delegation record and bumps its open count.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotInteractive` for an inline question and
    /// `SurfaceError` (wrapped) if the context cannot be opened.
    pub fn open_interactive(
        &mut self,
        surface: &mut dyn InteractiveSurface,
    ) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let group = session.current_group().ok_or(EngineError::Completed)?;
        let question = group.question();
        if !question.is_interactive() {
            return Err(EngineError::NotInteractive);
        }
        let question = question.clone();

        surface.close();
        surface.open(&question)?;
        let delegation = match session.delegation() {
            Some(existing) => existing.reopened(),
            None => Delegation::first_open(),
        };
        session.set_delegation(delegation);
        Ok(())
    }

    /// Apply a completion message from the secondary context.
    ///
    /// Messages for a question other than the one currently delegated
    /// are stale and ignored without touching session state.
    ///
    /// # Errors
    ///
    /// Returns attempt errors only if the session state was corrupted;
    /// a well-formed stale message never errors.
    pub fn handle_completion(
        &mut self,
        message: &CompletionMessage,
        surface: &mut dyn InteractiveSurface,
    ) -> Result<CompletionDisposition, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let Some(group) = session.current_group() else {
            debug!("completion for {} after session end, ignored", message.question_id);
            return Ok(CompletionDisposition::Ignored);
        };
        if session.delegation().is_none() || group.question().id() != &message.question_id {
            debug!(
                "stale completion for {}, current is {}, ignored",
                message.question_id,
                group.question().id()
            );
            return Ok(CompletionDisposition::Ignored);
        }
        let group_id = group.id().clone();
        let concept = group.concept().to_string();
        let unseen_remaining = group.unseen_remaining();

        surface.close();
        if message.completed && message.correct {
            session.clear_delegation();
            session.attempt_mut().apply(AttemptEvent::InteractiveCompleted {
                note: "Nicely done.".to_string(),
            })?;
            let attempts = session.attempt().map_or(1, |a| a.attempt());
            session.record_outcome(
                group_id,
                GroupOutcome {
                    first_attempt_correct: attempts == 1,
                    attempts,
                    concept,
                },
            );
            if unseen_remaining == 0 {
                session.set_notice(Notice::Info(
                    "You've covered every question on this concept.".to_string(),
                ));
            }
            Ok(CompletionDisposition::Resolved)
        } else {
            // Delegation kept: reopening counts against the same record.
            session.attempt_mut().apply(AttemptEvent::InteractiveFailed)?;
            session.set_notice(Notice::Info(
                "Not quite. Open the activity to try again, or move on.".to_string(),
            ));
            Ok(CompletionDisposition::RetryOffered)
        }
    }
}
