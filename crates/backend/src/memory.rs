//! In-memory collaborator with the reference grading semantics.
//!
//! Stands in for the remote service in tests and offline drills:
//! exact-match grading (case-insensitive, comma-set equality for
//! multi-answer), canned hint/explanation text, seen-id exclusion and
//! exhaustion signaling for concept groups.

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use drill_core::model::{
    ChoiceLetter, ConceptGroup, GroupId, InteractiveQuestion, MissedQuestion, Question,
    QuestionId, REVEAL_AFTER_WRONG, SessionToken, SubmittedAnswer,
};

use crate::contract::{
    Advance, BackendError, GroupQuestion, PracticeBackend, PracticeStart, PracticeSummaryData,
    QuizBackend, QuizStart, QuizVerdict, RevealedAnswer, SubmitRequest, Verdict,
};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A question plus its grading key (canonical lowercase letters).
#[derive(Debug, Clone)]
struct BankQuestion {
    question: Question,
    answer_key: String,
}

#[derive(Debug, Clone)]
struct BankGroup {
    id: GroupId,
    concept: String,
    question_ids: Vec<QuestionId>,
}

/// Static content the in-memory collaborator serves from.
#[derive(Debug, Clone)]
pub struct TestBank {
    topic: String,
    topic_name: String,
    questions: Vec<BankQuestion>,
    groups: Vec<BankGroup>,
    interactive: Vec<InteractiveQuestion>,
}

impl TestBank {
    #[must_use]
    pub fn new(topic: impl Into<String>, topic_name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            topic_name: topic_name.into(),
            questions: Vec::new(),
            groups: Vec::new(),
            interactive: Vec::new(),
        }
    }

    /// Add a question with its answer key, e.g. `"b"` or `"a,c"`.
    #[must_use]
    pub fn with_question(mut self, question: Question, answer_key: &str) -> Self {
        self.questions.push(BankQuestion {
            question,
            answer_key: canonical_key(answer_key),
        });
        self
    }

    #[must_use]
    pub fn with_group(
        mut self,
        id: GroupId,
        concept: impl Into<String>,
        question_ids: Vec<QuestionId>,
    ) -> Self {
        self.groups.push(BankGroup {
            id,
            concept: concept.into(),
            question_ids,
        });
        self
    }

    #[must_use]
    pub fn with_interactive(mut self, entry: InteractiveQuestion) -> Self {
        self.interactive.push(entry);
        self
    }

    fn find(&self, id: &QuestionId) -> Option<&BankQuestion> {
        self.questions.iter().find(|q| q.question.id() == id)
    }
}

/// Sorted lowercase letters joined by commas, the grading form.
fn canonical_key(raw: &str) -> String {
    let mut letters: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    letters.sort();
    letters.join(",")
}

/// Exact-match grading: string-set comparison, case-insensitive.
fn grade(answer_key: &str, submitted: &str) -> bool {
    let key: BTreeSet<String> = answer_key.split(',').map(str::to_lowercase).collect();
    let given: BTreeSet<String> = submitted
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .collect();
    key == given
}

/// "B. 224.0.0.6" style display text for a reveal.
fn answer_display(bank_question: &BankQuestion) -> String {
    bank_question
        .answer_key
        .split(',')
        .map(|letter| {
            let display = letter.to_uppercase();
            match letter
                .parse::<ChoiceLetter>()
                .ok()
                .and_then(|l| bank_question.question.choices().get(&l))
            {
                Some(text) => format!("{display}. {text}"),
                None => display,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone)]
struct ResultRow {
    question_id: QuestionId,
    question_text: String,
    correct: bool,
    attempts: u32,
}

#[derive(Debug, Default)]
struct PracticeState {
    order: Vec<QuestionId>,
    current: usize,
    wrong_attempts: HashMap<QuestionId, u32>,
    disabled: HashMap<QuestionId, Vec<ChoiceLetter>>,
    results: Vec<ResultRow>,
    skipped: Vec<QuestionId>,
}

#[derive(Debug, Default)]
struct QuizState {
    token: Option<SessionToken>,
    seen: HashMap<GroupId, BTreeSet<QuestionId>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    practice: Option<PracticeState>,
    quiz: QuizState,
    check_answer_calls: u32,
    submit_calls: u32,
}

/// Collaborator adapter backed by a [`TestBank`].
pub struct InMemoryBackend {
    bank: TestBank,
    shuffle: bool,
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new(bank: TestBank) -> Self {
        Self {
            bank,
            shuffle: false,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Shuffle question order and representative picks, as the live
    /// collaborator does. Off by default for deterministic tests.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Grading round-trips served so far (both drivers).
    #[must_use]
    pub fn grading_calls(&self) -> u32 {
        let state = self.state.lock().expect("memory backend lock");
        state.check_answer_calls + state.submit_calls
    }

    fn question_at(&self, state: &PracticeState, index: usize) -> Option<Question> {
        let id = state.order.get(index)?;
        let bank_question = self.bank.find(id)?;
        Some(
            bank_question
                .question
                .clone()
                .with_number(u32::try_from(index + 1).unwrap_or(u32::MAX)),
        )
    }
}

#[async_trait]
impl PracticeBackend for InMemoryBackend {
    async fn start(&self, topic: &str) -> Result<PracticeStart, BackendError> {
        if topic != self.bank.topic || self.bank.questions.is_empty() {
            return Err(BackendError::NotFound);
        }
        let mut order: Vec<QuestionId> = self
            .bank
            .questions
            .iter()
            .filter(|q| !q.question.is_interactive())
            .map(|q| q.question.id().clone())
            .collect();
        if self.shuffle {
            order.shuffle(&mut rand::rng());
        }

        let practice = PracticeState {
            order,
            ..PracticeState::default()
        };
        let first_question = self
            .question_at(&practice, 0)
            .ok_or(BackendError::NotFound)?;
        let total_questions = practice.order.len();

        let mut state = self.state.lock().expect("memory backend lock");
        state.practice = Some(practice);
        Ok(PracticeStart {
            topic_name: self.bank.topic_name.clone(),
            total_questions,
            first_question,
        })
    }

    async fn check_answer(
        &self,
        question_id: &QuestionId,
        answer: &SubmittedAnswer,
        _attempt: u32,
    ) -> Result<Verdict, BackendError> {
        let mut state = self.state.lock().expect("memory backend lock");
        state.check_answer_calls += 1;
        let bank_question = self.bank.find(question_id).ok_or(BackendError::NotFound)?;
        let practice = state.practice.as_mut().ok_or(BackendError::SessionExpired)?;

        let correct = grade(&bank_question.answer_key, answer.as_str());
        if correct {
            let attempts = practice.wrong_attempts.get(question_id).copied().unwrap_or(0) + 1;
            practice.results.push(ResultRow {
                question_id: question_id.clone(),
                question_text: bank_question.question.text().to_string(),
                correct: true,
                attempts,
            });
            Ok(Verdict {
                correct: true,
                feedback: format!(
                    "That's right: {}.",
                    answer_display(bank_question)
                ),
                attempt: attempts,
                can_reveal: false,
                disabled_choices: Vec::new(),
                correct_answer: Some(bank_question.answer_key.clone()),
            })
        } else {
            let wrong = practice.wrong_attempts.entry(question_id.clone()).or_insert(0);
            *wrong += 1;
            let wrong = *wrong;
            // Only single-letter wrong answers are struck; a wrong
            // combination says little about any one letter.
            let disabled = practice.disabled.entry(question_id.clone()).or_default();
            if !answer.as_str().contains(',') {
                if let Ok(letter) = answer.as_str().parse::<ChoiceLetter>() {
                    if !disabled.contains(&letter) {
                        disabled.push(letter);
                    }
                }
            }
            let hint = if wrong < REVEAL_AFTER_WRONG {
                "Not quite. Re-read the question and rule out the options that don't fit."
            } else {
                "Still not it. Reveal is available if you want the full explanation."
            };
            Ok(Verdict {
                correct: false,
                feedback: hint.to_string(),
                attempt: wrong,
                can_reveal: wrong >= REVEAL_AFTER_WRONG,
                disabled_choices: disabled.clone(),
                correct_answer: None,
            })
        }
    }

    async fn reveal(&self, question_id: &QuestionId) -> Result<RevealedAnswer, BackendError> {
        let mut state = self.state.lock().expect("memory backend lock");
        let bank_question = self.bank.find(question_id).ok_or(BackendError::NotFound)?;
        let practice = state.practice.as_mut().ok_or(BackendError::SessionExpired)?;

        let attempts = practice
            .wrong_attempts
            .get(question_id)
            .copied()
            .unwrap_or(0);
        practice.results.push(ResultRow {
            question_id: question_id.clone(),
            question_text: bank_question.question.text().to_string(),
            correct: false,
            attempts,
        });
        Ok(RevealedAnswer {
            correct_answer: bank_question.answer_key.clone(),
            correct_answer_text: answer_display(bank_question),
            feedback: "Compare the correct answer with your earlier picks before moving on."
                .to_string(),
        })
    }

    async fn skip(&self, question_id: &QuestionId) -> Result<Advance, BackendError> {
        let mut state = self.state.lock().expect("memory backend lock");
        let practice = state.practice.as_mut().ok_or(BackendError::SessionExpired)?;
        practice.skipped.push(question_id.clone());
        practice.current += 1;
        match self.question_at(practice, practice.current) {
            Some(question) => Ok(Advance::Next(question)),
            None => Ok(Advance::Done),
        }
    }

    async fn next(&self) -> Result<Advance, BackendError> {
        let mut state = self.state.lock().expect("memory backend lock");
        let practice = state.practice.as_mut().ok_or(BackendError::SessionExpired)?;
        practice.current += 1;
        match self.question_at(practice, practice.current) {
            Some(question) => Ok(Advance::Next(question)),
            None => Ok(Advance::Done),
        }
    }

    async fn summary(&self) -> Result<PracticeSummaryData, BackendError> {
        let state = self.state.lock().expect("memory backend lock");
        let practice = state.practice.as_ref().ok_or(BackendError::SessionExpired)?;
        let correct = practice.results.iter().filter(|r| r.correct).count();
        let incorrect = practice.results.len() - correct;
        Ok(PracticeSummaryData {
            total_questions: u32::try_from(practice.order.len()).unwrap_or(u32::MAX),
            answered: u32::try_from(practice.results.len()).unwrap_or(u32::MAX),
            correct: u32::try_from(correct).unwrap_or(u32::MAX),
            incorrect: u32::try_from(incorrect).unwrap_or(u32::MAX),
            skipped: u32::try_from(practice.skipped.len()).unwrap_or(u32::MAX),
            missed: practice
                .results
                .iter()
                .filter(|r| !r.correct)
                .map(|r| MissedQuestion {
                    question_id: r.question_id.clone(),
                    question_text: r.question_text.chars().take(100).collect(),
                    attempts: r.attempts,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl QuizBackend for InMemoryBackend {
    async fn start(&self, topic: &str) -> Result<QuizStart, BackendError> {
        if topic != self.bank.topic || self.bank.groups.is_empty() {
            return Err(BackendError::NotFound);
        }
        let token = SessionToken::new(format!(
            "session-{}",
            TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let mut groups = Vec::new();
        let mut seen = HashMap::new();
        for bank_group in &self.bank.groups {
            let pick = if self.shuffle {
                rand::rng().random_range(0..bank_group.question_ids.len())
            } else {
                0
            };
            let Some(id) = bank_group.question_ids.get(pick) else {
                continue;
            };
            let Some(bank_question) = self.bank.find(id) else {
                continue;
            };
            let group = ConceptGroup::new(
                bank_group.id.clone(),
                bank_group.concept.clone(),
                bank_question.question.clone(),
                bank_group.question_ids.len(),
            );
            seen.insert(bank_group.id.clone(), group.seen().clone());
            groups.push(group);
        }

        let mut state = self.state.lock().expect("memory backend lock");
        state.quiz = QuizState {
            token: Some(token.clone()),
            seen,
        };
        Ok(QuizStart {
            token,
            topic: self.bank.topic.clone(),
            groups,
        })
    }

    async fn submit(&self, request: SubmitRequest<'_>) -> Result<QuizVerdict, BackendError> {
        let mut state = self.state.lock().expect("memory backend lock");
        state.submit_calls += 1;
        if state.quiz.token.as_ref() != Some(request.token) {
            return Err(BackendError::SessionExpired);
        }
        let bank_question = self
            .bank
            .find(request.question_id)
            .ok_or(BackendError::NotFound)?;

        if grade(&bank_question.answer_key, request.answer.as_str()) {
            let seen = state
                .quiz
                .seen
                .get(request.group_id)
                .map_or(1, BTreeSet::len);
            let group_size = self
                .bank
                .groups
                .iter()
                .find(|g| &g.id == request.group_id)
                .map_or(1, |g| g.question_ids.len());
            Ok(QuizVerdict::Correct {
                explanation: format!("That's right: {}.", answer_display(bank_question)),
                attempts_needed: request.attempt,
                more_in_group: group_size.saturating_sub(seen),
            })
        } else {
            let hint = if request.attempt < REVEAL_AFTER_WRONG {
                "Not quite. Think about what this concept is really asking."
            } else {
                "Still not it. Reveal is available if you want the full explanation."
            };
            Ok(QuizVerdict::Incorrect {
                hint: hint.to_string(),
                attempt: request.attempt,
            })
        }
    }

    async fn reveal(
        &self,
        token: &SessionToken,
        question_id: &QuestionId,
    ) -> Result<RevealedAnswer, BackendError> {
        let state = self.state.lock().expect("memory backend lock");
        if state.quiz.token.as_ref() != Some(token) {
            return Err(BackendError::SessionExpired);
        }
        let bank_question = self.bank.find(question_id).ok_or(BackendError::NotFound)?;
        Ok(RevealedAnswer {
            correct_answer: bank_question.answer_key.clone(),
            correct_answer_text: answer_display(bank_question),
            feedback: "Compare the correct answer with your earlier picks before moving on."
                .to_string(),
        })
    }

    async fn group_question(
        &self,
        group_id: &GroupId,
        token: &SessionToken,
        exclude: &BTreeSet<QuestionId>,
    ) -> Result<GroupQuestion, BackendError> {
        let mut state = self.state.lock().expect("memory backend lock");
        if state.quiz.token.as_ref() != Some(token) {
            return Err(BackendError::SessionExpired);
        }
        let bank_group = self
            .bank
            .groups
            .iter()
            .find(|g| &g.id == group_id)
            .ok_or(BackendError::NotFound)?;

        let available: Vec<&QuestionId> = bank_group
            .question_ids
            .iter()
            .filter(|id| !exclude.contains(*id))
            .collect();
        if available.is_empty() {
            return Err(BackendError::GroupExhausted);
        }
        let pick = if self.shuffle {
            rand::rng().random_range(0..available.len())
        } else {
            0
        };
        let id = available[pick].clone();
        let bank_question = self.bank.find(&id).ok_or(BackendError::NotFound)?;
        state
            .quiz
            .seen
            .entry(group_id.clone())
            .or_default()
            .insert(id);
        Ok(GroupQuestion {
            question: bank_question.question.clone(),
            remaining_in_group: available.len() - 1,
        })
    }

    async fn interactive_catalog(&self) -> Result<Vec<InteractiveQuestion>, BackendError> {
        Ok(self.bank.interactive.clone())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
