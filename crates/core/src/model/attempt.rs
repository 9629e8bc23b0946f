use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ChoiceLetter;

/// Wrong attempts before the reveal affordance unlocks.
pub const REVEAL_AFTER_WRONG: u32 = 2;

/// Where the current question stands in its submit/feedback cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptPhase {
    /// Choices enabled (minus previously disabled ones), no feedback.
    Presented,
    /// A grading round-trip is in flight; inputs locked.
    Submitting,
    /// Terminal for this question: explanation shown, next offered.
    CorrectFeedback { explanation: String },
    /// Hint shown, retry offered, wrong choices struck.
    IncorrectFeedback { hint: String },
    /// Terminal: correct answer disclosed, counted as incorrect.
    Revealed {
        answer_text: String,
        explanation: String,
    },
}

impl AttemptPhase {
    fn name(&self) -> &'static str {
        match self {
            Self::Presented => "presented",
            Self::Submitting => "submitting",
            Self::CorrectFeedback { .. } => "correct feedback",
            Self::IncorrectFeedback { .. } => "incorrect feedback",
            Self::Revealed { .. } => "revealed",
        }
    }
}

/// Discrete inputs driving the attempt cycle.
///
/// Events are produced by the session driver from UI actions and
/// collaborator responses; applying one is pure state manipulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    /// Submission left for the grader; lock inputs.
    SubmitStarted,
    /// Grader confirmed the answer.
    CorrectVerdict { explanation: String },
    /// Grader rejected the answer; `disabled` lists choices to strike.
    IncorrectVerdict {
        hint: String,
        disabled: Vec<ChoiceLetter>,
    },
    /// The grading round-trip failed; the attempt is not consumed.
    FetchFailed,
    /// Student chose to try again after a wrong answer.
    RetryRequested,
    /// Student disclosed the answer after exhausting retries.
    RevealTaken {
        answer_text: String,
        explanation: String,
    },
    /// Secondary-context question reported success.
    InteractiveCompleted { note: String },
    /// Secondary-context question reported failure or was closed.
    InteractiveFailed,
}

impl AttemptEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::SubmitStarted => "submit",
            Self::CorrectVerdict { .. } => "correct verdict",
            Self::IncorrectVerdict { .. } => "incorrect verdict",
            Self::FetchFailed => "fetch failure",
            Self::RetryRequested => "retry",
            Self::RevealTaken { .. } => "reveal",
            Self::InteractiveCompleted { .. } => "interactive completion",
            Self::InteractiveFailed => "interactive failure",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("cannot apply {event} while in {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },

    #[error("reveal is locked until {REVEAL_AFTER_WRONG} wrong attempts")]
    RevealLocked,
}

/// Per-question attempt bookkeeping.
///
/// Reset by constructing a fresh value whenever a new question is
/// displayed; never persisted beyond the question's lifetime. The
/// disabled set only grows, and the attempt number never decreases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    attempt: u32,
    wrong_attempts: u32,
    disabled: BTreeSet<ChoiceLetter>,
    phase: AttemptPhase,
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt: 1,
            wrong_attempts: 0,
            disabled: BTreeSet::new(),
            phase: AttemptPhase::Presented,
        }
    }

    /// Attempt number for the next/in-flight submission, from 1.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn wrong_attempts(&self) -> u32 {
        self.wrong_attempts
    }

    /// Choices struck by prior wrong submissions on this question.
    #[must_use]
    pub fn disabled(&self) -> &BTreeSet<ChoiceLetter> {
        &self.disabled
    }

    #[must_use]
    pub fn is_choice_disabled(&self, letter: ChoiceLetter) -> bool {
        self.disabled.contains(&letter)
    }

    #[must_use]
    pub fn phase(&self) -> &AttemptPhase {
        &self.phase
    }

    /// Reveal unlocks exactly at the configured wrong-attempt count.
    #[must_use]
    pub fn can_reveal(&self) -> bool {
        self.wrong_attempts >= REVEAL_AFTER_WRONG && !self.is_resolved()
    }

    /// Whether this question reached a terminal phase.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.phase,
            AttemptPhase::CorrectFeedback { .. } | AttemptPhase::Revealed { .. }
        )
    }

    /// `Some(true)` once correct, `Some(false)` once revealed.
    #[must_use]
    pub fn resolved_correct(&self) -> Option<bool> {
        match self.phase {
            AttemptPhase::CorrectFeedback { .. } => Some(true),
            AttemptPhase::Revealed { .. } => Some(false),
            _ => None,
        }
    }

    /// Inputs are interactive only while the question is presented.
    #[must_use]
    pub fn inputs_locked(&self) -> bool {
        self.phase != AttemptPhase::Presented
    }

    /// Advance the cycle by one event.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` for an event the
    /// current phase does not accept, and `AttemptError::RevealLocked`
    /// for a reveal before the wrong-attempt threshold.
    pub fn apply(&mut self, event: AttemptEvent) -> Result<(), AttemptError> {
        use AttemptEvent as E;
        use AttemptPhase as P;

        let phase_name = self.phase.name();
        match event {
            E::SubmitStarted if matches!(self.phase, P::Presented) => {
                self.phase = P::Submitting;
            }
            E::CorrectVerdict { explanation } if matches!(self.phase, P::Submitting) => {
                self.phase = P::CorrectFeedback { explanation };
            }
            E::IncorrectVerdict { hint, disabled } if matches!(self.phase, P::Submitting) => {
                self.wrong_attempts += 1;
                self.disabled.extend(disabled);
                self.phase = P::IncorrectFeedback { hint };
            }
            E::FetchFailed if matches!(self.phase, P::Submitting) => {
                // Last good state: the attempt is not consumed.
                self.phase = P::Presented;
            }
            E::RetryRequested if matches!(self.phase, P::IncorrectFeedback { .. }) => {
                self.attempt += 1;
                self.phase = P::Presented;
            }
            E::RevealTaken {
                answer_text,
                explanation,
            } if matches!(self.phase, P::IncorrectFeedback { .. }) => {
                if self.wrong_attempts < REVEAL_AFTER_WRONG {
                    return Err(AttemptError::RevealLocked);
                }
                self.phase = P::Revealed {
                    answer_text,
                    explanation,
                };
            }
            E::InteractiveCompleted { note } if matches!(self.phase, P::Presented) => {
                self.phase = P::CorrectFeedback { explanation: note };
            }
            E::InteractiveFailed if matches!(self.phase, P::Presented) => {
                self.attempt += 1;
                self.wrong_attempts += 1;
            }
            event => {
                return Err(AttemptError::InvalidTransition {
                    phase: phase_name,
                    event: event.name(),
                });
            }
        }
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
