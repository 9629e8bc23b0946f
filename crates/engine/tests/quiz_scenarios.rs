use std::collections::BTreeMap;
use std::sync::Arc;

use backend::{InMemoryBackend, TestBank};
use drill_core::model::{
    AttemptPhase, ChoiceLetter, GroupId, InteractiveQuestion, Question, QuestionId, QuestionKind,
    Selection,
};
use drill_core::time::fixed_clock;
use engine::{
    CompletionDisposition, CompletionMessage, EngineError, InteractiveSurface, MoreOutcome,
    Notice, QuizFlow, QuizView, SurfaceError,
};

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

fn interactive(id: &str, text: &str) -> Question {
    Question::new(
        QuestionId::new(id),
        text,
        BTreeMap::new(),
        QuestionKind::Interactive,
        0,
    )
    .unwrap()
}

fn bank() -> TestBank {
    TestBank::new("ospf", "OSPF")
        .with_question(single("q1", "Best-path metric?"), "b")
        .with_question(single("q3", "Default hello timer?"), "d")
        .with_question(single("q4", "Which packet builds adjacencies?"), "a")
        .with_question(single("q5", "Area 0 is called?"), "a")
        .with_group(
            GroupId::new("g1"),
            "OSPF fundamentals",
            vec![
                QuestionId::new("q1"),
                QuestionId::new("q3"),
                QuestionId::new("q4"),
            ],
        )
        .with_group(
            GroupId::new("g2"),
            "OSPF areas",
            vec![QuestionId::new("q5")],
        )
}

fn quiz() -> QuizFlow {
    QuizFlow::new(Arc::new(InMemoryBackend::new(bank()))).with_clock(fixed_clock())
}

#[tokio::test]
async fn reveal_then_extra_question_then_exhaustion() {
    let mut flow = quiz();
    flow.start("ospf").await.unwrap();
    let session = flow.session().unwrap();
    assert_eq!(session.group_count(), 2);
    assert_eq!(session.position(), 1);

    // Two wrong answers on the representative, then reveal.
    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    flow.retry().unwrap();
    flow.submit(&Selection::single(letter('c'))).await.unwrap();
    assert!(flow.session().unwrap().attempt().unwrap().can_reveal());
    flow.reveal().await.unwrap();

    let outcome = flow
        .session()
        .unwrap()
        .outcome(&GroupId::new("g1"))
        .unwrap()
        .clone();
    assert!(!outcome.first_attempt_correct);
    assert_eq!(outcome.attempts, 3, "two wrong answers plus the reveal");

    // Extra question from the same group: fresh attempt cycle.
    assert_eq!(flow.more_from_group().await.unwrap(), MoreOutcome::Replaced);
    let session = flow.session().unwrap();
    let first_extra = session.current_group().unwrap().question().id().clone();
    assert_eq!(first_extra, QuestionId::new("q3"));
    assert_eq!(session.attempt().unwrap().attempt(), 1);
    assert_eq!(session.position(), 1, "still the same group");

    // Answering the extra correctly never rewrites the outcome.
    flow.submit(&Selection::single(letter('d'))).await.unwrap();
    let outcome = flow
        .session()
        .unwrap()
        .outcome(&GroupId::new("g1"))
        .unwrap()
        .clone();
    assert!(!outcome.first_attempt_correct);
    assert_eq!(outcome.attempts, 3);

    // A second request serves the last unseen alternative.
    assert_eq!(flow.more_from_group().await.unwrap(), MoreOutcome::Replaced);
    let session = flow.session().unwrap();
    let second_extra = session.current_group().unwrap().question().id().clone();
    assert_eq!(second_extra, QuestionId::new("q4"));
    assert_ne!(second_extra, first_extra);
    assert_eq!(session.attempt().unwrap().attempt(), 1);
    assert_eq!(session.position(), 1, "still the same group");

    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    let outcome = flow
        .session()
        .unwrap()
        .outcome(&GroupId::new("g1"))
        .unwrap()
        .clone();
    assert_eq!(outcome.attempts, 3, "bonus questions never rewrite the outcome");

    // Nothing unseen left: exhaustion advances to the next group.
    assert_eq!(flow.more_from_group().await.unwrap(), MoreOutcome::Exhausted);
    let session = flow.session().unwrap();
    assert_eq!(session.position(), 2);
    assert!(session.notice().is_some());

    // Resolve g2 first try and finish.
    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    flow.next_group().unwrap();
    let report = flow.report().unwrap();
    assert_eq!(report.resolved(), 2);
    assert_eq!(report.first_attempt_correct(), 1);
    assert_eq!(report.weak()[0].concept, "OSPF fundamentals");
    assert_eq!(report.weak()[0].attempts, 3);
    assert!(matches!(flow.view().unwrap(), QuizView::Finished(_)));
}

#[tokio::test]
async fn extra_questions_are_only_offered_after_resolution() {
    let mut flow = quiz();
    flow.start("ospf").await.unwrap();
    assert!(matches!(
        flow.more_from_group().await,
        Err(EngineError::Unresolved)
    ));
}

#[tokio::test]
async fn groups_may_be_left_unresolved() {
    let mut flow = quiz();
    flow.start("ospf").await.unwrap();

    // Mid-feedback advancement is allowed and records no outcome.
    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    flow.next_group().unwrap();
    assert!(flow.session().unwrap().outcome(&GroupId::new("g1")).is_none());

    flow.next_group().unwrap();
    let report = flow.report().unwrap();
    assert_eq!(report.total_groups(), 2);
    assert_eq!(report.resolved(), 0);
    assert!((report.first_attempt_accuracy() - 0.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn wrong_single_letters_are_struck_locally() {
    let mut flow = quiz();
    flow.start("ospf").await.unwrap();

    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    let attempt = flow.session().unwrap().attempt().unwrap();
    assert!(attempt.is_choice_disabled(letter('a')));
    assert!(matches!(attempt.phase(), AttemptPhase::IncorrectFeedback { .. }));
}

#[tokio::test]
async fn a_fully_covered_group_is_acknowledged_on_a_correct_answer() {
    let mut flow = quiz();
    flow.start("ospf").await.unwrap();

    // g1 still has unseen alternatives: resolution alone says nothing.
    flow.submit(&Selection::single(letter('b'))).await.unwrap();
    assert!(flow.session().unwrap().notice().is_none());
    let QuizView::Question(view) = flow.view().unwrap() else {
        panic!("expected a question view");
    };
    assert!(view.actions.can_request_more);

    // g2 holds a single question: answering it covers the concept.
    flow.next_group().unwrap();
    flow.submit(&Selection::single(letter('a'))).await.unwrap();
    let session = flow.session().unwrap();
    assert!(matches!(session.notice(), Some(Notice::Info(_))));
    let QuizView::Question(view) = flow.view().unwrap() else {
        panic!("expected a question view");
    };
    assert!(!view.actions.can_request_more);
    assert!(view.notice.is_some(), "the front end sees the acknowledgment");
}

// ─── Interactive delegation ────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSurface {
    events: Vec<String>,
}

impl InteractiveSurface for RecordingSurface {
    fn open(&mut self, question: &Question) -> Result<(), SurfaceError> {
        self.events.push(format!("open:{}", question.id()));
        Ok(())
    }

    fn close(&mut self) {
        self.events.push("close".to_string());
    }
}

fn interactive_bank() -> TestBank {
    TestBank::new("ccna", "CCNA")
        .with_question(interactive("dd1", "Drag the OSI layers into order"), "-")
        .with_group(GroupId::new("g1"), "OSI model", vec![QuestionId::new("dd1")])
        .with_interactive(InteractiveQuestion {
            id: QuestionId::new("dd1"),
            title: "OSI layers".to_string(),
            instructions: "Drag each layer to its number.".to_string(),
        })
}

#[tokio::test]
async fn delegation_resolves_from_a_completion_message() {
    let mut flow = QuizFlow::new(Arc::new(InMemoryBackend::new(interactive_bank())));
    flow.start("ccna").await.unwrap();
    let mut surface = RecordingSurface::default();

    flow.open_interactive(&mut surface).unwrap();
    assert_eq!(surface.events, vec!["close", "open:dd1"]);
    assert_eq!(flow.session().unwrap().delegation().unwrap().opens(), 1);

    let message = CompletionMessage::from_json(
        r#"{"type": "dragDropComplete", "questionId": "dd1", "correct": true}"#,
    )
    .unwrap();
    let disposition = flow.handle_completion(&message, &mut surface).unwrap();
    assert_eq!(disposition, CompletionDisposition::Resolved);

    let session = flow.session().unwrap();
    assert!(session.delegation().is_none());
    assert_eq!(session.attempt().unwrap().resolved_correct(), Some(true));
    let outcome = session.outcome(&GroupId::new("g1")).unwrap();
    assert!(outcome.first_attempt_correct);
    assert_eq!(outcome.attempts, 1);
    // The activity was the group's only question.
    assert!(matches!(session.notice(), Some(Notice::Info(_))));
}

#[tokio::test]
async fn stale_completion_messages_are_ignored() {
    let mut flow = QuizFlow::new(Arc::new(InMemoryBackend::new(interactive_bank())));
    flow.start("ccna").await.unwrap();
    let mut surface = RecordingSurface::default();

    // No delegation outstanding yet: any completion is stale.
    let message = CompletionMessage::from_json(
        r#"{"type": "dragDropComplete", "questionId": "dd1", "correct": true}"#,
    )
    .unwrap();
    assert_eq!(
        flow.handle_completion(&message, &mut surface).unwrap(),
        CompletionDisposition::Ignored
    );
    assert!(flow.session().unwrap().attempt().unwrap().resolved_correct().is_none());

    // Delegated, but the message names a different question.
    flow.open_interactive(&mut surface).unwrap();
    let foreign = CompletionMessage::from_json(
        r#"{"type": "dragDropComplete", "questionId": "dd9", "correct": true}"#,
    )
    .unwrap();
    assert_eq!(
        flow.handle_completion(&foreign, &mut surface).unwrap(),
        CompletionDisposition::Ignored
    );
    let session = flow.session().unwrap();
    assert!(session.delegation().is_some(), "delegation survives a stale message");
    assert!(session.attempt().unwrap().resolved_correct().is_none());
    assert!(session.outcome(&GroupId::new("g1")).is_none());
}

#[tokio::test]
async fn failed_attempts_escalate_across_reopens() {
    let mut flow = QuizFlow::new(Arc::new(InMemoryBackend::new(interactive_bank())));
    flow.start("ccna").await.unwrap();
    let mut surface = RecordingSurface::default();

    flow.open_interactive(&mut surface).unwrap();
    let failed = CompletionMessage::from_json(
        r#"{"type": "dragDropComplete", "questionId": "dd1", "correct": false}"#,
    )
    .unwrap();
    assert_eq!(
        flow.handle_completion(&failed, &mut surface).unwrap(),
        CompletionDisposition::RetryOffered
    );
    let session = flow.session().unwrap();
    assert_eq!(session.attempt().unwrap().attempt(), 2);
    assert!(session.notice().is_some());

    // Reopening keeps one delegation record with a bumped open count.
    flow.open_interactive(&mut surface).unwrap();
    assert_eq!(flow.session().unwrap().delegation().unwrap().opens(), 2);

    let done = CompletionMessage::from_json(
        r#"{"type": "dragDropComplete", "questionId": "dd1", "correct": true}"#,
    )
    .unwrap();
    assert_eq!(
        flow.handle_completion(&done, &mut surface).unwrap(),
        CompletionDisposition::Resolved
    );
    let outcome = flow
        .session()
        .unwrap()
        .outcome(&GroupId::new("g1"))
        .unwrap()
        .clone();
    assert!(!outcome.first_attempt_correct);
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn inline_questions_cannot_be_delegated() {
    let mut flow = quiz();
    flow.start("ospf").await.unwrap();
    let mut surface = RecordingSurface::default();
    assert!(matches!(
        flow.open_interactive(&mut surface),
        Err(EngineError::NotInteractive)
    ));
    assert!(surface.events.is_empty());
}

#[tokio::test]
async fn interactive_catalog_is_cached_across_restarts() {
    let mut flow = QuizFlow::new(Arc::new(InMemoryBackend::new(interactive_bank())));
    flow.start("ccna").await.unwrap();
    let first = flow.interactive_catalog().await.unwrap().to_vec();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, QuestionId::new("dd1"));

    flow.restart().await.unwrap();
    let again = flow.interactive_catalog().await.unwrap();
    assert_eq!(again, first.as_slice());
}
