//! Linear practice sessions: a fixed question sequence with attempt
//! escalation, skips and an end-of-drill summary.

mod flow;
mod session;

pub use flow::PracticeFlow;
pub use session::{PracticePhase, PracticeProgress, PracticeSession};
