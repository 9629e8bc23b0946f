//! Concept-group sessions: one representative question per concept,
//! optional extra questions per group, and a client-side mastery
//! report.

mod flow;
mod session;

pub use flow::{CompletionDisposition, MoreOutcome, QuizFlow};
pub use session::{QuizPhase, QuizSession};
