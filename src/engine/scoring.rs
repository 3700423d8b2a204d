//! Submission eligibility and exact-set scoring.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::model::{AnswerMode, Question, Test};
use super::selection::AnswerSelection;
use crate::api::{AnsweredQuestion, ResultRecord, SelectedAnswer};

/// Whether the current selection may be submitted.
///
/// Strict tests need every question answered, loose tests at least one.
/// A test without questions is never submittable.
pub fn can_submit(test: &Test, selection: &AnswerSelection) -> bool {
    if test.questions.is_empty() {
        return false;
    }
    match test.mode() {
        AnswerMode::Strict => test.questions.iter().all(|q| selection.is_answered(&q.id)),
        AnswerMode::Loose => test.questions.iter().any(|q| selection.is_answered(&q.id)),
    }
}

/// Round-half-up percentage of `correct` out of `considered`; 0 when nothing
/// was considered.
pub fn percentage(correct: usize, considered: usize) -> u8 {
    if considered == 0 {
        return 0;
    }
    let correct = correct.min(considered) as u64;
    let considered = considered as u64;
    ((200 * correct + considered) / (2 * considered)) as u8
}

/// Outcome for a single scored question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionVerdict {
    pub question_id: String,
    pub correct: bool,
}

/// Scored attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// 0-100
    pub score: u8,
    pub correct: usize,
    pub considered: usize,
    /// One entry per considered question, in test order
    pub verdicts: Vec<QuestionVerdict>,
}

impl ScoreCard {
    /// Verdict for a question, if it was scored
    pub fn verdict(&self, question_id: &str) -> Option<bool> {
        self.verdicts
            .iter()
            .find(|v| v.question_id == question_id)
            .map(|v| v.correct)
    }
}

/// Questions that count toward the score: all in strict mode, answered ones
/// in loose mode.
fn considered<'a>(
    test: &'a Test,
    selection: &'a AnswerSelection,
) -> impl Iterator<Item = &'a Question> + 'a {
    let strict = test.mode() == AnswerMode::Strict;
    test.questions
        .iter()
        .filter(move |q| strict || selection.is_answered(&q.id))
}

/// A question is correct iff the selected set equals the correct set.
pub fn is_question_correct(question: &Question, selection: &AnswerSelection) -> bool {
    let correct = question.correct_ids();
    let selected: BTreeSet<&str> = selection
        .selected(&question.id)
        .map(|set| set.iter().map(String::as_str).collect())
        .unwrap_or_default();
    selected == correct
}

/// Score the selection against the test
pub fn score(test: &Test, selection: &AnswerSelection) -> ScoreCard {
    let verdicts: Vec<QuestionVerdict> = considered(test, selection)
        .map(|q| QuestionVerdict {
            question_id: q.id.clone(),
            correct: is_question_correct(q, selection),
        })
        .collect();

    let correct = verdicts.iter().filter(|v| v.correct).count();
    let considered = verdicts.len();

    ScoreCard {
        score: percentage(correct, considered),
        correct,
        considered,
        verdicts,
    }
}

/// Per-question record of what was selected, for every considered question
pub fn build_record(test: &Test, selection: &AnswerSelection) -> ResultRecord {
    let answers = considered(test, selection)
        .map(|q| AnsweredQuestion {
            question: q.title.clone(),
            selected_answers: q
                .answers
                .iter()
                .filter(|a| selection.is_selected(&q.id, &a.id))
                .map(|a| SelectedAnswer {
                    answer: a.text.clone(),
                    is_correct: a.is_correct,
                })
                .collect(),
        })
        .collect();

    ResultRecord { answers }
}
