mod answer;
mod attempt;
mod group;
mod ids;
mod question;
mod summary;

pub use answer::{Selection, SelectionError, SubmittedAnswer};
pub use attempt::{
    AttemptError, AttemptEvent, AttemptPhase, AttemptState, REVEAL_AFTER_WRONG,
};
pub use group::{ConceptGroup, GroupError};
pub use ids::{GroupId, QuestionId, SessionToken};
pub use question::{
    ChoiceLetter, ChoiceLetterError, InteractiveQuestion, Question, QuestionError, QuestionKind,
};
pub use summary::{
    ConceptResult, GroupOutcome, MissedQuestion, PracticeSummary, QuizReport, SummaryError,
};
