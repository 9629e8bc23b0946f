#![forbid(unsafe_code)]

pub mod contract;
pub mod http;
pub mod memory;

pub use contract::{
    Advance, BackendError, GroupQuestion, PracticeBackend, PracticeStart, PracticeSummaryData,
    QuizBackend, QuizStart, QuizVerdict, RevealedAnswer, SubmitRequest, Verdict,
};
pub use http::HttpBackend;
pub use memory::{InMemoryBackend, TestBank};
