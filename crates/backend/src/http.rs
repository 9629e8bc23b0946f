//! HTTP adapter for the collaborator contract.
//!
//! Wire format follows the drill service's JSON routes; anything the
//! service omits (e.g. `required_selections`) deserializes to a default
//! and the engine falls back accordingly.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;

use async_trait::async_trait;
use drill_core::model::{
    ChoiceLetter, ConceptGroup, GroupId, InteractiveQuestion, MissedQuestion, Question,
    QuestionId, QuestionKind, SessionToken, SubmittedAnswer,
};

use crate::contract::{
    Advance, BackendError, GroupQuestion, PracticeBackend, PracticeStart, PracticeSummaryData,
    QuizBackend, QuizStart, QuizVerdict, RevealedAnswer, SubmitRequest, Verdict,
};

/// Collaborator client over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, BackendError> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // Error payloads carry diagnostics worth keeping; exhaustion is a
    // soft signal, not a failure.
    match response.json::<ErrorWire>().await {
        Ok(body) if body.all_covered => Err(BackendError::GroupExhausted),
        Ok(body) if !body.error.is_empty() => {
            log::debug!("collaborator error ({status}): {}", body.error);
            Err(BackendError::Rejected(body.error))
        }
        _ if status == StatusCode::NOT_FOUND => Err(BackendError::NotFound),
        _ => Err(BackendError::Status(status)),
    }
}

// ─── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorWire {
    #[serde(default)]
    error: String,
    #[serde(default)]
    all_covered: bool,
}

#[derive(Debug, Deserialize)]
struct QuestionWire {
    id: String,
    question_text: String,
    #[serde(default)]
    choices: BTreeMap<String, String>,
    #[serde(default)]
    multi_answer: bool,
    #[serde(default)]
    required_selections: Option<usize>,
    #[serde(default)]
    interactive: bool,
    #[serde(default)]
    question_number: u32,
    #[serde(default)]
    protocol_tags: Vec<String>,
}

impl QuestionWire {
    fn into_question(self) -> Result<Question, BackendError> {
        let mut choices = BTreeMap::new();
        for (letter, text) in self.choices {
            let letter: ChoiceLetter = letter
                .parse()
                .map_err(|_| BackendError::Payload(format!("bad choice letter {letter:?}")))?;
            choices.insert(letter, text);
        }
        let kind = if self.interactive {
            QuestionKind::Interactive
        } else if self.multi_answer {
            QuestionKind::Multi {
                required: self.required_selections.and_then(NonZeroUsize::new),
            }
        } else {
            QuestionKind::Single
        };
        Question::new(
            QuestionId::new(self.id),
            self.question_text,
            choices,
            kind,
            self.question_number,
        )
        .map(|q| q.with_topic_tags(self.protocol_tags))
        .map_err(|err| BackendError::Payload(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct PracticeStartWire {
    protocol_name: String,
    total_questions: usize,
    first_question: QuestionWire,
}

#[derive(Debug, Deserialize)]
struct CheckAnswerWire {
    correct: bool,
    feedback: String,
    attempt: u32,
    #[serde(default)]
    can_reveal: bool,
    #[serde(default)]
    disabled_choices: Vec<String>,
    #[serde(default)]
    correct_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RevealWire {
    correct_answer: String,
    correct_answer_text: String,
    feedback: String,
}

#[derive(Debug, Deserialize)]
struct SkipWire {
    #[serde(default)]
    next_question: Option<QuestionWire>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct NextWire {
    #[serde(default)]
    question: Option<QuestionWire>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct MissedWire {
    question_id: String,
    #[serde(default)]
    question_text: String,
    #[serde(default)]
    attempts: u32,
}

#[derive(Debug, Deserialize)]
struct SummaryWire {
    total_questions: u32,
    answered: u32,
    correct: u32,
    incorrect: u32,
    skipped: u32,
    #[serde(default)]
    missed_questions: Vec<MissedWire>,
}

#[derive(Debug, Deserialize)]
struct QuizGroupWire {
    group_id: String,
    #[serde(default)]
    concept: String,
    question: QuestionWire,
    #[serde(default = "one")]
    group_size: usize,
}

fn one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct QuizStartWire {
    session_id: String,
    protocol: String,
    concept_groups: Vec<QuizGroupWire>,
}

#[derive(Debug, Deserialize)]
struct QuizSubmitWire {
    correct: bool,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    attempts_needed: Option<u32>,
    #[serde(default)]
    attempt: Option<u32>,
    #[serde(default)]
    more_in_group: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GroupQuestionWire {
    question: QuestionWire,
    #[serde(default)]
    remaining_in_group: usize,
}

#[derive(Debug, Deserialize)]
struct CatalogWire {
    #[serde(default)]
    questions: Vec<InteractiveQuestion>,
}

fn parse_letters(raw: Vec<String>) -> Vec<ChoiceLetter> {
    // Unparseable entries are dropped rather than failing the verdict.
    raw.iter()
        .filter_map(|s| match s.parse::<ChoiceLetter>() {
            Ok(letter) => Some(letter),
            Err(_) => {
                log::warn!("ignoring unparseable disabled choice {s:?}");
                None
            }
        })
        .collect()
}

// ─── PracticeBackend ───────────────────────────────────────────────────────────

#[async_trait]
impl PracticeBackend for HttpBackend {
    async fn start(&self, topic: &str) -> Result<PracticeStart, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            protocol_slug: &'a str,
        }
        let wire: PracticeStartWire = self
            .post_json("/practice/start-session", &Body { protocol_slug: topic })
            .await?;
        Ok(PracticeStart {
            topic_name: wire.protocol_name,
            total_questions: wire.total_questions,
            first_question: wire.first_question.into_question()?,
        })
    }

    async fn check_answer(
        &self,
        question_id: &QuestionId,
        answer: &SubmittedAnswer,
        attempt: u32,
    ) -> Result<Verdict, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            question_id: &'a str,
            selected_answer: &'a str,
            attempt_number: u32,
        }
        let wire: CheckAnswerWire = self
            .post_json(
                "/practice/check-answer",
                &Body {
                    question_id: question_id.as_str(),
                    selected_answer: answer.as_str(),
                    attempt_number: attempt,
                },
            )
            .await?;
        Ok(Verdict {
            correct: wire.correct,
            feedback: wire.feedback,
            attempt: wire.attempt,
            can_reveal: wire.can_reveal,
            disabled_choices: parse_letters(wire.disabled_choices),
            correct_answer: wire.correct_answer,
        })
    }

    async fn reveal(&self, question_id: &QuestionId) -> Result<RevealedAnswer, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            question_id: &'a str,
        }
        let wire: RevealWire = self
            .post_json(
                "/practice/explain",
                &Body {
                    question_id: question_id.as_str(),
                },
            )
            .await?;
        Ok(RevealedAnswer {
            correct_answer: wire.correct_answer,
            correct_answer_text: wire.correct_answer_text,
            feedback: wire.feedback,
        })
    }

    async fn skip(&self, question_id: &QuestionId) -> Result<Advance, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            question_id: &'a str,
        }
        let wire: SkipWire = self
            .post_json(
                "/practice/skip",
                &Body {
                    question_id: question_id.as_str(),
                },
            )
            .await?;
        match wire.next_question {
            Some(question) if !wire.done => Ok(Advance::Next(question.into_question()?)),
            _ => Ok(Advance::Done),
        }
    }

    async fn next(&self) -> Result<Advance, BackendError> {
        #[derive(Serialize)]
        struct Body {}
        let wire: NextWire = self.post_json("/practice/next", &Body {}).await?;
        match wire.question {
            Some(question) if !wire.done => Ok(Advance::Next(question.into_question()?)),
            _ => Ok(Advance::Done),
        }
    }

    async fn summary(&self) -> Result<PracticeSummaryData, BackendError> {
        let wire: SummaryWire = self.get_json("/practice/summary").await?;
        Ok(PracticeSummaryData {
            total_questions: wire.total_questions,
            answered: wire.answered,
            correct: wire.correct,
            incorrect: wire.incorrect,
            skipped: wire.skipped,
            missed: wire
                .missed_questions
                .into_iter()
                .map(|m| MissedQuestion {
                    question_id: QuestionId::new(m.question_id),
                    question_text: m.question_text,
                    attempts: m.attempts,
                })
                .collect(),
        })
    }
}

// ─── QuizBackend ───────────────────────────────────────────────────────────────

#[async_trait]
impl QuizBackend for HttpBackend {
    async fn start(&self, topic: &str) -> Result<QuizStart, BackendError> {
        let wire: QuizStartWire = self.get_json(&format!("/api/quiz/start/{topic}")).await?;
        let mut groups = Vec::with_capacity(wire.concept_groups.len());
        for group in wire.concept_groups {
            groups.push(ConceptGroup::new(
                GroupId::new(group.group_id),
                group.concept,
                group.question.into_question()?,
                group.group_size,
            ));
        }
        Ok(QuizStart {
            token: SessionToken::new(wire.session_id),
            topic: wire.protocol,
            groups,
        })
    }

    async fn submit(&self, request: SubmitRequest<'_>) -> Result<QuizVerdict, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            session_id: &'a str,
            question_id: &'a str,
            student_answer: &'a str,
            attempt_number: u32,
            group_id: &'a str,
        }
        let wire: QuizSubmitWire = self
            .post_json(
                "/api/quiz/submit",
                &Body {
                    session_id: request.token.as_str(),
                    question_id: request.question_id.as_str(),
                    student_answer: request.answer.as_str(),
                    attempt_number: request.attempt,
                    group_id: request.group_id.as_str(),
                },
            )
            .await?;
        if wire.correct {
            Ok(QuizVerdict::Correct {
                explanation: wire.explanation.unwrap_or_default(),
                attempts_needed: wire.attempts_needed.unwrap_or(request.attempt),
                more_in_group: wire.more_in_group.unwrap_or(0),
            })
        } else {
            Ok(QuizVerdict::Incorrect {
                hint: wire.hint.unwrap_or_default(),
                attempt: wire.attempt.unwrap_or(request.attempt),
            })
        }
    }

    async fn reveal(
        &self,
        token: &SessionToken,
        question_id: &QuestionId,
    ) -> Result<RevealedAnswer, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            session_id: &'a str,
            question_id: &'a str,
        }
        let wire: RevealWire = self
            .post_json(
                "/api/quiz/reveal",
                &Body {
                    session_id: token.as_str(),
                    question_id: question_id.as_str(),
                },
            )
            .await?;
        Ok(RevealedAnswer {
            correct_answer: wire.correct_answer,
            correct_answer_text: wire.correct_answer_text,
            feedback: wire.feedback,
        })
    }

    async fn group_question(
        &self,
        group_id: &GroupId,
        token: &SessionToken,
        exclude: &BTreeSet<QuestionId>,
    ) -> Result<GroupQuestion, BackendError> {
        let exclude = exclude
            .iter()
            .map(QuestionId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/api/quiz/group-question/{group_id}?session_id={}&exclude={exclude}",
            token.as_str()
        );
        let wire: GroupQuestionWire = self.get_json(&path).await?;
        Ok(GroupQuestion {
            question: wire.question.into_question()?,
            remaining_in_group: wire.remaining_in_group,
        })
    }

    async fn interactive_catalog(&self) -> Result<Vec<InteractiveQuestion>, BackendError> {
        let wire: CatalogWire = self.get_json("/api/drag-drop-questions").await?;
        Ok(wire.questions)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_question_maps_to_domain_kinds() {
        let wire: QuestionWire = serde_json::from_str(
            r#"{
                "id": "ospf_3",
                "question_text": "Which two multicast addresses does OSPF use?",
                "choices": {"a": "224.0.0.5", "B": "224.0.0.6", "c": "224.0.0.9", "d": "239.0.0.1"},
                "multi_answer": true,
                "required_selections": 2,
                "question_number": 3,
                "protocol_tags": ["ospf"]
            }"#,
        )
        .unwrap();
        let question = wire.into_question().unwrap();
        assert!(question.is_multi_answer());
        assert_eq!(question.required_selections(), Some(2));
        // Uppercase wire letters normalize on parse.
        assert!(question
            .choices()
            .contains_key(&"b".parse::<ChoiceLetter>().unwrap()));
    }

    #[test]
    fn wire_question_without_required_count_falls_back() {
        let wire: QuestionWire = serde_json::from_str(
            r#"{
                "id": "q",
                "question_text": "Pick some",
                "choices": {"a": "x", "b": "y"},
                "multi_answer": true
            }"#,
        )
        .unwrap();
        let question = wire.into_question().unwrap();
        assert_eq!(question.required_selections(), None);
    }

    #[test]
    fn bad_choice_letters_are_a_payload_error() {
        let wire: QuestionWire = serde_json::from_str(
            r#"{
                "id": "q",
                "question_text": "Which?",
                "choices": {"1": "x", "b": "y"}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            wire.into_question(),
            Err(BackendError::Payload(_))
        ));
    }

    #[test]
    fn unparseable_disabled_letters_are_dropped() {
        let letters = parse_letters(vec!["a".into(), "??".into(), "C".into()]);
        assert_eq!(letters.len(), 2);
    }
}
