//! Pure projections from session state to renderable views.
//!
//! Front ends render these structs verbatim; nothing here mutates a
//! session or talks to a collaborator.

use drill_core::model::{
    AttemptPhase, AttemptState, ChoiceLetter, PracticeSummary, Question, QuizReport,
};

use crate::practice::{PracticePhase, PracticeSession};
use crate::quiz::{QuizPhase, QuizSession};

/// Transient banner shown above the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Danger(String),
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Info(m) | Self::Danger(m) => m,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTone {
    Correct,
    Incorrect,
    Revealed,
}

/// Feedback block under the question, present once graded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackView {
    pub tone: FeedbackTone,
    pub message: String,
    /// Display text of the correct answer, shown on reveal.
    pub answer_text: Option<String>,
}

/// One selectable choice row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceRow {
    pub letter: ChoiceLetter,
    pub text: String,
    /// Struck-through and non-selectable after a wrong submission.
    pub struck: bool,
}

/// Which controls the front end should offer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionView {
    pub can_submit: bool,
    pub can_retry: bool,
    pub can_reveal: bool,
    pub can_skip: bool,
    pub can_advance: bool,
    /// Concept-group sessions only: request another question from the
    /// same group after answering correctly.
    pub can_request_more: bool,
}

/// Everything needed to render the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub position: usize,
    pub total: usize,
    pub text: String,
    pub choices: Vec<ChoiceRow>,
    /// Selection-count hint for multi-answer questions, when known.
    pub multi_hint: Option<usize>,
    pub interactive: bool,
    pub inputs_locked: bool,
    pub feedback: Option<FeedbackView>,
    pub actions: ActionView,
    pub notice: Option<Notice>,
}

/// Render model for a linear practice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeView {
    Question(QuestionView),
    Summary(PracticeSummary),
}

/// Render model for a concept-group session.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizView {
    Question(QuestionView),
    Finished(QuizReport),
}

fn feedback_of(attempt: &AttemptState) -> Option<FeedbackView> {
    match attempt.phase() {
        AttemptPhase::CorrectFeedback { explanation } => Some(FeedbackView {
            tone: FeedbackTone::Correct,
            message: explanation.clone(),
            answer_text: None,
        }),
        AttemptPhase::IncorrectFeedback { hint } => Some(FeedbackView {
            tone: FeedbackTone::Incorrect,
            message: hint.clone(),
            answer_text: None,
        }),
        AttemptPhase::Revealed {
            answer_text,
            explanation,
        } => Some(FeedbackView {
            tone: FeedbackTone::Revealed,
            message: explanation.clone(),
            answer_text: Some(answer_text.clone()),
        }),
        AttemptPhase::Presented | AttemptPhase::Submitting => None,
    }
}

fn choice_rows(question: &Question, attempt: &AttemptState) -> Vec<ChoiceRow> {
    question
        .choices()
        .iter()
        .map(|(letter, text)| ChoiceRow {
            letter: *letter,
            text: text.clone(),
            struck: attempt.is_choice_disabled(*letter),
        })
        .collect()
}

fn question_view(
    question: &Question,
    attempt: &AttemptState,
    position: usize,
    total: usize,
    notice: Option<&Notice>,
    actions: ActionView,
) -> QuestionView {
    QuestionView {
        position,
        total,
        text: question.text().to_string(),
        choices: choice_rows(question, attempt),
        multi_hint: question.required_selections(),
        interactive: question.is_interactive(),
        inputs_locked: attempt.inputs_locked(),
        feedback: feedback_of(attempt),
        actions,
        notice: notice.cloned(),
    }
}

/// Project a linear session to its render model.
#[must_use]
pub fn practice_view(session: &PracticeSession) -> PracticeView {
    if session.phase() == PracticePhase::Summary {
        return PracticeView::Summary(session.summary());
    }
    let (Some(question), Some(attempt)) = (session.current_question(), session.attempt()) else {
        return PracticeView::Summary(session.summary());
    };

    let presented = matches!(attempt.phase(), AttemptPhase::Presented);
    let incorrect = matches!(attempt.phase(), AttemptPhase::IncorrectFeedback { .. });
    let actions = ActionView {
        can_submit: presented && !question.is_interactive(),
        can_retry: incorrect,
        can_reveal: attempt.can_reveal() && incorrect,
        can_skip: presented || incorrect,
        can_advance: attempt.is_resolved(),
        can_request_more: false,
    };
    PracticeView::Question(question_view(
        question,
        attempt,
        session.position(),
        session.total_questions(),
        session.notice(),
        actions,
    ))
}

/// Project a concept-group session to its render model.
#[must_use]
pub fn quiz_view(session: &QuizSession) -> QuizView {
    if session.phase() == QuizPhase::Finished {
        return QuizView::Finished(session.report());
    }
    let (Some(group), Some(attempt)) = (session.current_group(), session.attempt()) else {
        return QuizView::Finished(session.report());
    };
    let question = group.question();

    let presented = matches!(attempt.phase(), AttemptPhase::Presented);
    let incorrect = matches!(attempt.phase(), AttemptPhase::IncorrectFeedback { .. });
    let resolved = attempt.is_resolved();
    let actions = ActionView {
        can_submit: presented && !question.is_interactive(),
        can_retry: incorrect,
        can_reveal: attempt.can_reveal() && incorrect,
        // Group advancement is always allowed in concept-group sessions.
        can_skip: !resolved,
        can_advance: true,
        can_request_more: resolved && group.unseen_remaining() > 0,
    };
    QuizView::Question(question_view(
        question,
        attempt,
        session.position(),
        session.group_count(),
        session.notice(),
        actions,
    ))
}
