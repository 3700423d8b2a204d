use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Answers picked during one attempt: question id to selected answer ids.
///
/// Questions whose set becomes empty are dropped, so a present entry
/// always means "answered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSelection {
    selected: BTreeMap<String, BTreeSet<String>>,
}

impl AnswerSelection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle `answer_id` for `question_id`. Returns whether it is now selected.
    pub fn toggle(&mut self, question_id: &str, answer_id: &str) -> bool {
        let set = self.selected.entry(question_id.to_string()).or_default();
        let now_selected = if set.remove(answer_id) {
            false
        } else {
            set.insert(answer_id.to_string());
            true
        };
        if set.is_empty() {
            self.selected.remove(question_id);
        }
        now_selected
    }

    /// Selected answers for a question, if any
    pub fn selected(&self, question_id: &str) -> Option<&BTreeSet<String>> {
        self.selected.get(question_id)
    }

    /// Whether `answer_id` is selected for `question_id`
    pub fn is_selected(&self, question_id: &str, answer_id: &str) -> bool {
        self.selected
            .get(question_id)
            .is_some_and(|set| set.contains(answer_id))
    }

    /// Whether the question has at least one selected answer
    pub fn is_answered(&self, question_id: &str) -> bool {
        self.selected
            .get(question_id)
            .is_some_and(|set| !set.is_empty())
    }

    /// Number of answered questions
    pub fn answered_count(&self) -> usize {
        self.selected.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Drop every selection
    pub fn clear(&mut self) {
        self.selected.clear();
    }
}
