use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use backend::{
    Advance, BackendError, InMemoryBackend, PracticeBackend, PracticeStart, PracticeSummaryData,
    RevealedAnswer, TestBank, Verdict,
};
use drill_core::model::{
    AttemptPhase, ChoiceLetter, Question, QuestionId, QuestionKind, Selection, SubmittedAnswer,
};
use drill_core::time::fixed_clock;
use engine::{EngineError, Notice, PracticeFlow, PracticeView};

fn letter(ch: char) -> ChoiceLetter {
    ChoiceLetter::new(ch).unwrap()
}

fn choices(s: &str) -> BTreeMap<ChoiceLetter, String> {
    s.chars()
        .map(|ch| (letter(ch), format!("choice {ch}")))
        .collect()
}

fn single(id: &str, text: &str) -> Question {
    Question::new(QuestionId::new(id), text, choices("abcd"), QuestionKind::Single, 0).unwrap()
}

fn multi(id: &str, text: &str, required: usize) -> Question {
    Question::new(
        QuestionId::new(id),
        text,
        choices("abcd"),
        QuestionKind::Multi {
            required: NonZeroUsize::new(required),
        },
        0,
    )
    .unwrap()
}

fn bank() -> TestBank {
    TestBank::new("ospf", "OSPF")
        .with_question(single("q1", "Best-path metric?"), "b")
        .with_question(multi("q2", "Which two multicast addresses?", 2), "a,c")
        .with_question(single("q3", "Default hello timer?"), "d")
}

fn flow() -> PracticeFlow {
    PracticeFlow::new(Arc::new(InMemoryBackend::new(bank()))).with_clock(fixed_clock())
}

#[tokio::test]
async fn full_drill_with_reveal_skip_and_correct_answer() {
    let mut flow = flow();
    flow.start("ospf").await.unwrap();
    let session = flow.session().unwrap();
    assert_eq!(session.topic_name(), "OSPF");
    assert_eq!(session.total_questions(), 3);
    assert_eq!(session.position(), 1);

    // q1: wrong twice, then reveal.
    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    let attempt = flow.session().unwrap().attempt().unwrap();
    assert!(matches!(attempt.phase(), AttemptPhase::IncorrectFeedback { .. }));
    assert!(!attempt.can_reveal());

    flow.retry().unwrap();
    flow.submit(&Selection::single(letter('c'))).await.unwrap();
    let attempt = flow.session().unwrap().attempt().unwrap();
    assert!(attempt.can_reveal());
    assert!(attempt.is_choice_disabled(letter('a')));
    assert!(attempt.is_choice_disabled(letter('c')));

    flow.reveal().await.unwrap();
    let attempt = flow.session().unwrap().attempt().unwrap();
    assert_eq!(attempt.resolved_correct(), Some(false));

    // q2: skipped without an answer.
    flow.next().await.unwrap();
    assert_eq!(flow.session().unwrap().position(), 2);
    flow.skip().await.unwrap();
    assert_eq!(flow.session().unwrap().position(), 3);

    // q3: correct on the first attempt.
    flow.submit(&Selection::single(letter('d'))).await.unwrap();
    let attempt = flow.session().unwrap().attempt().unwrap();
    assert_eq!(attempt.resolved_correct(), Some(true));
    flow.next().await.unwrap();

    let session = flow.session().unwrap();
    assert!(session.is_complete());
    let summary = flow.summary().unwrap();
    assert_eq!(summary.answered(), 2);
    assert_eq!(summary.correct(), 1);
    assert_eq!(summary.incorrect(), 1);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.percentage(), 50);
    assert_eq!(summary.missed().len(), 1);
    assert_eq!(summary.missed()[0].question_id, QuestionId::new("q1"));
    assert_eq!(summary.missed()[0].attempts, 2);

    assert!(matches!(flow.view().unwrap(), PracticeView::Summary(_)));
}

#[tokio::test]
async fn incomplete_multi_selection_never_reaches_the_grader() {
    let backend = Arc::new(InMemoryBackend::new(bank()));
    let mut flow = PracticeFlow::new(backend.clone());
    flow.start("ospf").await.unwrap();

    // Move to q2, the pick-two question.
    flow.skip().await.unwrap();

    let err = flow
        .submit(&Selection::multi([letter('a')]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Selection(drill_core::model::SelectionError::CountMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert_eq!(backend.grading_calls(), 0, "count gate is client-side");

    // The attempt is untouched; a full selection goes through.
    let attempt = flow.session().unwrap().attempt().unwrap();
    assert_eq!(attempt.attempt(), 1);
    assert!(matches!(attempt.phase(), AttemptPhase::Presented));

    let mut selection = Selection::multi([letter('c')]);
    selection.toggle(letter('a'));
    flow.submit(&selection).await.unwrap();
    let attempt = flow.session().unwrap().attempt().unwrap();
    assert_eq!(attempt.resolved_correct(), Some(true));
}

#[tokio::test]
async fn reveal_stays_locked_before_two_wrong_attempts() {
    let mut flow = flow();
    flow.start("ospf").await.unwrap();

    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    let err = flow.reveal().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Attempt(drill_core::model::AttemptError::RevealLocked)
    ));
}

#[tokio::test]
async fn advancing_an_unresolved_question_is_rejected() {
    let mut flow = flow();
    flow.start("ospf").await.unwrap();
    assert!(matches!(flow.next().await, Err(EngineError::Unresolved)));

    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    assert!(matches!(flow.next().await, Err(EngineError::Unresolved)));
}

// ─── Transport failure recovery ────────────────────────────────────────────────

struct FlakyBackend {
    inner: InMemoryBackend,
    fail_checks: AtomicBool,
}

#[async_trait]
impl PracticeBackend for FlakyBackend {
    async fn start(&self, topic: &str) -> Result<PracticeStart, BackendError> {
        PracticeBackend::start(&self.inner, topic).await
    }

    async fn check_answer(
        &self,
        question_id: &QuestionId,
        answer: &SubmittedAnswer,
        attempt: u32,
    ) -> Result<Verdict, BackendError> {
        if self.fail_checks.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected("connection reset".into()));
        }
        self.inner.check_answer(question_id, answer, attempt).await
    }

    async fn reveal(&self, question_id: &QuestionId) -> Result<RevealedAnswer, BackendError> {
        PracticeBackend::reveal(&self.inner, question_id).await
    }

    async fn skip(&self, question_id: &QuestionId) -> Result<Advance, BackendError> {
        self.inner.skip(question_id).await
    }

    async fn next(&self) -> Result<Advance, BackendError> {
        self.inner.next().await
    }

    async fn summary(&self) -> Result<PracticeSummaryData, BackendError> {
        PracticeBackend::summary(&self.inner).await
    }
}

#[tokio::test]
async fn failed_round_trip_leaves_the_attempt_unconsumed() {
    let backend = Arc::new(FlakyBackend {
        inner: InMemoryBackend::new(bank()),
        fail_checks: AtomicBool::new(true),
    });
    let mut flow = PracticeFlow::new(backend.clone());
    flow.start("ospf").await.unwrap();

    let err = flow.submit(&Selection::single(letter('b'))).await.unwrap_err();
    assert!(matches!(err, EngineError::Backend(_)));

    let session = flow.session().unwrap();
    let attempt = session.attempt().unwrap();
    assert_eq!(attempt.attempt(), 1, "failed fetch must not consume the attempt");
    assert!(matches!(attempt.phase(), AttemptPhase::Presented));
    assert!(matches!(session.notice(), Some(Notice::Danger(_))));

    // Recovery path one: resubmit once the collaborator is back.
    backend.fail_checks.store(false, Ordering::SeqCst);
    flow.submit(&Selection::single(letter('b'))).await.unwrap();
    let session = flow.session().unwrap();
    assert_eq!(session.attempt().unwrap().resolved_correct(), Some(true));
    assert!(session.notice().is_none());
}

#[tokio::test]
async fn skip_remains_available_after_a_failed_round_trip() {
    let backend = Arc::new(FlakyBackend {
        inner: InMemoryBackend::new(bank()),
        fail_checks: AtomicBool::new(true),
    });
    let mut flow = PracticeFlow::new(backend.clone());
    flow.start("ospf").await.unwrap();

    let _ = flow.submit(&Selection::single(letter('b'))).await;
    flow.skip().await.unwrap();
    assert_eq!(flow.session().unwrap().position(), 2);
}

#[tokio::test]
async fn position_is_monotonic_and_never_revisits() {
    let mut flow = flow();
    flow.start("ospf").await.unwrap();
    assert_eq!(flow.session().unwrap().position(), 1);

    flow.skip().await.unwrap();
    assert_eq!(flow.session().unwrap().position(), 2);
    flow.skip().await.unwrap();
    assert_eq!(flow.session().unwrap().position(), 3);
    flow.skip().await.unwrap();
    assert!(flow.session().unwrap().is_complete());
}

#[tokio::test]
async fn collaborator_summary_matches_local_counters() {
    let mut flow = flow();
    flow.start("ospf").await.unwrap();

    flow.submit(&Selection::single(letter('b'))).await.unwrap();
    flow.next().await.unwrap();
    flow.skip().await.unwrap();
    flow.skip().await.unwrap();

    let local = flow.summary().unwrap();
    let reported = flow.fetch_summary().await.unwrap();
    assert_eq!(local.correct(), reported.correct());
    assert_eq!(local.skipped(), reported.skipped());
    assert_eq!(local.answered(), reported.answered());
}
