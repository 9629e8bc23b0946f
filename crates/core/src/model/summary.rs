use thiserror::Error;

use crate::model::{GroupId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("answered ({answered}) does not match correct + incorrect ({sum})")]
    CountMismatch { answered: u32, sum: u32 },
}

/// A question the student got wrong or revealed, kept for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedQuestion {
    pub question_id: QuestionId,
    pub question_text: String,
    pub attempts: u32,
}

/// End-of-drill aggregate for a linear practice session.
///
/// Counters are derived from session results, never settable: skips do
/// not count as answered, reveals count as incorrect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeSummary {
    total_questions: u32,
    answered: u32,
    correct: u32,
    incorrect: u32,
    skipped: u32,
    percentage: u32,
    missed: Vec<MissedQuestion>,
}

impl PracticeSummary {
    /// Build a summary from session counters.
    #[must_use]
    pub fn from_results(
        total_questions: u32,
        correct: u32,
        incorrect: u32,
        skipped: u32,
        missed: Vec<MissedQuestion>,
    ) -> Self {
        let answered = correct + incorrect;
        let percentage = if answered > 0 {
            (f64::from(correct) / f64::from(answered) * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total_questions,
            answered,
            correct,
            incorrect,
            skipped,
            percentage,
            missed,
        }
    }

    /// Rehydrate a summary reported by the collaborator.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::CountMismatch` if the reported answered
    /// count does not equal correct + incorrect.
    pub fn from_reported(
        total_questions: u32,
        answered: u32,
        correct: u32,
        incorrect: u32,
        skipped: u32,
        missed: Vec<MissedQuestion>,
    ) -> Result<Self, SummaryError> {
        let sum = correct + incorrect;
        if sum != answered {
            return Err(SummaryError::CountMismatch { answered, sum });
        }
        Ok(Self::from_results(
            total_questions,
            correct,
            incorrect,
            skipped,
            missed,
        ))
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Correct share of answered questions, rounded percent.
    #[must_use]
    pub fn percentage(&self) -> u32 {
        self.percentage
    }

    #[must_use]
    pub fn missed(&self) -> &[MissedQuestion] {
        &self.missed
    }
}

/// Per-group resolution record for a concept-group session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub first_attempt_correct: bool,
    pub attempts: u32,
    pub concept: String,
}

/// One concept's line in the end-of-quiz report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptResult {
    pub group_id: GroupId,
    pub concept: String,
    pub first_attempt_correct: bool,
    pub attempts: u32,
}

/// Client-side mastery breakdown for a concept-group session.
///
/// Computed from the outcome map; no collaborator round-trip involved.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizReport {
    total_groups: u32,
    resolved: u32,
    first_attempt_correct: u32,
    strong: Vec<ConceptResult>,
    weak: Vec<ConceptResult>,
}

impl QuizReport {
    #[must_use]
    pub fn from_outcomes<'a, I>(total_groups: u32, outcomes: I) -> Self
    where
        I: IntoIterator<Item = (&'a GroupId, &'a GroupOutcome)>,
    {
        let mut strong = Vec::new();
        let mut weak = Vec::new();
        for (group_id, outcome) in outcomes {
            let result = ConceptResult {
                group_id: group_id.clone(),
                concept: outcome.concept.clone(),
                first_attempt_correct: outcome.first_attempt_correct,
                attempts: outcome.attempts,
            };
            if outcome.first_attempt_correct {
                strong.push(result);
            } else {
                weak.push(result);
            }
        }
        strong.sort_by(|a, b| a.concept.cmp(&b.concept));
        // Weakest first: more attempts before the concept stuck.
        weak.sort_by(|a, b| b.attempts.cmp(&a.attempts).then(a.concept.cmp(&b.concept)));

        let resolved = u32::try_from(strong.len() + weak.len()).unwrap_or(u32::MAX);
        let first_attempt_correct = u32::try_from(strong.len()).unwrap_or(u32::MAX);
        Self {
            total_groups,
            resolved,
            first_attempt_correct,
            strong,
            weak,
        }
    }

    #[must_use]
    pub fn total_groups(&self) -> u32 {
        self.total_groups
    }

    #[must_use]
    pub fn resolved(&self) -> u32 {
        self.resolved
    }

    /// Groups answered correctly on attempt 1 — the primary mastery metric.
    #[must_use]
    pub fn first_attempt_correct(&self) -> u32 {
        self.first_attempt_correct
    }

    /// Fraction of resolved groups correct on the first attempt.
    #[must_use]
    pub fn first_attempt_accuracy(&self) -> f64 {
        if self.resolved == 0 {
            0.0
        } else {
            f64::from(self.first_attempt_correct) / f64::from(self.resolved)
        }
    }

    #[must_use]
    pub fn strong(&self) -> &[ConceptResult] {
        &self.strong
    }

    #[must_use]
    pub fn weak(&self) -> &[ConceptResult] {
        &self.weak
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn summary_derives_answered_and_percentage() {
        let summary = PracticeSummary::from_results(3, 1, 1, 1, Vec::new());
        assert_eq!(summary.answered(), 2);
        assert_eq!(summary.percentage(), 50);
        assert_eq!(summary.skipped(), 1);
    }

    #[test]
    fn empty_session_has_zero_percentage() {
        let summary = PracticeSummary::from_results(5, 0, 0, 5, Vec::new());
        assert_eq!(summary.percentage(), 0);
    }

    #[test]
    fn reported_counts_must_align() {
        let err =
            PracticeSummary::from_reported(3, 3, 1, 1, 0, Vec::new()).unwrap_err();
        assert_eq!(err, SummaryError::CountMismatch { answered: 3, sum: 2 });
    }

    #[test]
    fn report_partitions_strong_and_weak() {
        let mut outcomes = HashMap::new();
        outcomes.insert(
            GroupId::new("g1"),
            GroupOutcome {
                first_attempt_correct: true,
                attempts: 1,
                concept: "OSPF cost".into(),
            },
        );
        outcomes.insert(
            GroupId::new("g2"),
            GroupOutcome {
                first_attempt_correct: false,
                attempts: 3,
                concept: "EIGRP DUAL".into(),
            },
        );
        outcomes.insert(
            GroupId::new("g3"),
            GroupOutcome {
                first_attempt_correct: false,
                attempts: 2,
                concept: "VLAN trunking".into(),
            },
        );

        let report = QuizReport::from_outcomes(4, outcomes.iter());
        assert_eq!(report.resolved(), 3);
        assert_eq!(report.first_attempt_correct(), 1);
        assert!((report.first_attempt_accuracy() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.strong().len(), 1);
        // Weakest (most attempts) first.
        assert_eq!(report.weak()[0].concept, "EIGRP DUAL");
        assert_eq!(report.weak()[1].concept, "VLAN trunking");
    }
}
