//! Session drivers for exam study drills.
//!
//! Two session shapes share one attempt cycle: linear practice walks a
//! fixed question sequence, concept-group quizzes visit one question
//! per concept with optional extras. Both talk to the grading
//! collaborator through the traits in the `backend` crate and expose
//! pure render models for front ends.

#![forbid(unsafe_code)]

pub mod error;
pub mod interactive;
pub mod practice;
pub mod quiz;
pub mod view;

pub use error::EngineError;
pub use interactive::{
    COMPLETION_MESSAGE_TYPE, CompletionMessage, Delegation, InteractiveSurface, MessageError,
    SurfaceError,
};
pub use practice::{PracticeFlow, PracticePhase, PracticeSession};
pub use quiz::{CompletionDisposition, MoreOutcome, QuizFlow, QuizPhase, QuizSession};
pub use view::{
    ActionView, ChoiceRow, FeedbackTone, FeedbackView, Notice, PracticeView, QuestionView,
    QuizView, practice_view, quiz_view,
};
