use std::sync::Arc;

use log::{debug, warn};

use backend::{Advance, PracticeBackend};
use drill_core::Clock;
use drill_core::model::{AttemptEvent, MissedQuestion, PracticeSummary, Selection};

use crate::error::EngineError;
use crate::practice::session::PracticeSession;
use crate::view::{Notice, PracticeView, practice_view};

/// Driver for a linear practice session.
///
/// Owns the session state and the collaborator handle; front ends call
/// its methods from student actions and render [`PracticeFlow::view`]
/// after each one. One flow drives at most one session at a time;
/// starting again discards the previous session.
pub struct PracticeFlow {
    backend: Arc<dyn PracticeBackend>,
    clock: Clock,
    session: Option<PracticeSession>,
}

impl PracticeFlow {
    #[must_use]
    pub fn new(backend: Arc<dyn PracticeBackend>) -> Self {
        Self {
            backend,
            clock: Clock::default(),
            session: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<&PracticeSession> {
        self.session.as_ref()
    }

    /// Render model for the current state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Empty` before the first successful start.
    pub fn view(&self) -> Result<PracticeView, EngineError> {
        let session = self.session.as_ref().ok_or(EngineError::Empty)?;
        Ok(practice_view(session))
    }

    /// Begin a session for the topic, discarding any previous one.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` (wrapped) for an unknown or
    /// empty topic; any previous session survives the failure.
    pub async fn start(&mut self, topic: &str) -> Result<(), EngineError> {
        let start = self.backend.start(topic).await?;
        debug!(
            "practice started: topic={} questions={}",
            start.topic_name, start.total_questions
        );
        self.session = Some(PracticeSession::new(
            start.topic_name,
            start.total_questions,
            start.first_question,
            self.clock.now(),
        ));
        Ok(())
    }

    /// Submit the student's selection for grading.
    ///
    /// On a transport failure the attempt is not consumed: the question
    /// returns to its presented state with a danger notice, and the
    /// student may retry the submission or skip.
    ///
    /// # Errors
    ///
    /// Returns selection/attempt errors without touching the
    /// collaborator, and `EngineError::Backend` after a failed
    /// round-trip.
    pub async fn submit(&mut self, selection: &Selection) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let current = session.current_mut().ok_or(EngineError::Completed)?;

        let answer = selection.normalize(&current.question)?;
        current.attempt.apply(AttemptEvent::SubmitStarted)?;
        let attempt_no = current.attempt.attempt();
        let question_id = current.question.id().clone();
        session.clear_notice();

        match self
            .backend
            .check_answer(&question_id, &answer, attempt_no)
            .await
        {
            Ok(verdict) => {
                let session = self.session.as_mut().ok_or(EngineError::Empty)?;
                let current = session.current_mut().ok_or(EngineError::Completed)?;
                if verdict.correct {
                    current.attempt.apply(AttemptEvent::CorrectVerdict {
                        explanation: verdict.feedback,
                    })?;
                    session.record_correct();
                } else {
                    current.attempt.apply(AttemptEvent::IncorrectVerdict {
                        hint: verdict.feedback,
                        disabled: verdict.disabled_choices,
                    })?;
                }
                Ok(())
            }
            Err(err) => {
                warn!("check-answer failed for {question_id}: {err}");
                let session = self.session.as_mut().ok_or(EngineError::Empty)?;
                if let Some(current) = session.current_mut() {
                    current.attempt.apply(AttemptEvent::FetchFailed)?;
                }
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
        let current = session.current_mut().ok_or(EngineError::Completed)?;
        current.attempt.apply(AttemptEvent::RetryRequested)?;
        session.clear_notice();
        Ok(())
    }

    /// Disclose the correct answer; counts the question as incorrect.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::RevealLocked` (wrapped) before two wrong
    /// attempts, and `EngineError::Backend` if the disclosure fetch
    /// fails, in which case the feedback state is untouched.
    pub async fn reveal(&mut self) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let current = session.current_mut().ok_or(EngineError::Completed)?;
        if !current.attempt.can_reveal() {
            return Err(drill_core::model::AttemptError::RevealLocked.into());
        }
        let question_id = current.question.id().clone();

        let revealed = match self.backend.reveal(&question_id).await {
            Ok(revealed) => revealed,
            Err(err) => {
                warn!("reveal failed for {question_id}: {err}");
                let session = self.session.as_mut().ok_or(EngineError::Empty)?;
                session.set_notice(Notice::Danger(
                    "Could not fetch the answer. Please try again.".to_string(),
                ));
                return Err(err.into());
            }
        };

        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let current = session.current_mut().ok_or(EngineError::Completed)?;
        current.attempt.apply(AttemptEvent::RevealTaken {
            answer_text: revealed.correct_answer_text,
            explanation: revealed.feedback,
        })?;
        let entry = MissedQuestion {
            question_id,
            question_text: current.question.text().to_string(),
            attempts: current.attempt.wrong_attempts(),
        };
        session.record_missed(entry);
        session.clear_notice();
        Ok(())
    }

    /// Skip the current question without an answer.
    ///
    /// Available whenever the question is unresolved, including right
    /// after a failed grading round-trip.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AlreadyResolved` for a question in a
    /// terminal feedback phase, and `EngineError::Backend` on transport
    /// failure with the session unchanged.
    pub async fn skip(&mut self) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let current = session.current_mut().ok_or(EngineError::Completed)?;
        if current.attempt.is_resolved() {
            return Err(EngineError::AlreadyResolved);
        }
        let question_id = current.question.id().clone();

        let result = self.backend.skip(&question_id).await;
        let advance = self.advance_or_notice(result)?;
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        session.record_skip();
        match advance {
            Advance::Next(question) => session.present(question),
            Advance::Done => session.finish(self.clock.now()),
        }
        Ok(())
    }

    /// Advance past a resolved question.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Unresolved` while feedback has not reached
    /// a terminal phase, and `EngineError::Backend` on transport
    /// failure with the session unchanged.
    pub async fn next(&mut self) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        let current = session.current_mut().ok_or(EngineError::Completed)?;
        if !current.attempt.is_resolved() {
            return Err(EngineError::Unresolved);
        }

        let result = self.backend.next().await;
        let advance = self.advance_or_notice(result)?;
        let session = self.session.as_mut().ok_or(EngineError::Empty)?;
        match advance {
            Advance::Next(question) => session.present(question),
            Advance::Done => session.finish(self.clock.now()),
        }
        Ok(())
    }

    /// Summary computed from local session counters.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Empty` before the first start.
    pub fn summary(&self) -> Result<PracticeSummary, EngineError> {
        let session = self.session.as_ref().ok_or(EngineError::Empty)?;
        Ok(session.summary())
    }

    /// Summary as reported by the collaborator, cross-checked.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Backend` on transport failure and
    /// `SummaryError::CountMismatch` (wrapped) for inconsistent counts.
    pub async fn fetch_summary(&self) -> Result<PracticeSummary, EngineError> {
        let data = self.backend.summary().await?;
        Ok(PracticeSummary::from_reported(
            data.total_questions,
            data.answered,
            data.correct,
            data.incorrect,
            data.skipped,
            data.missed,
        )?)
    }

    fn advance_or_notice(
        &mut self,
        result: Result<Advance, backend::BackendError>,
    ) -> Result<Advance, EngineError> {
        result.map_err(|err| {
            warn!("advance failed: {err}");
            if let Some(session) = self.session.as_mut() {
                session.set_notice(Notice::Danger(
                    "Could not load the next question. Please try again.".to_string(),
                ));
            }
            err.into()
        })
    }
}
