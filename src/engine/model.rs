use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::api::{parse_timestamp, QuestionData, TestRecord};
use crate::error::{EngineError, EngineResult};

/// How a test is answered and scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// Every question must be answered; every question is scored.
    Strict,
    /// Any non-empty subset may be answered; only answered questions are scored.
    Loose,
}

impl AnswerMode {
    /// Mode for an `isStrict` flag
    pub fn from_strict(is_strict: bool) -> Self {
        if is_strict {
            AnswerMode::Strict
        } else {
            AnswerMode::Loose
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerMode::Strict => "strict",
            AnswerMode::Loose => "loose",
        }
    }
}

impl std::fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier of the answer at `answer_index` of question `question_index`
pub fn answer_id(question_index: usize, answer_index: usize) -> String {
    format!("{}_{}", question_index, answer_index)
}

/// One answer option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// `"{question}_{answer}"` positional identifier
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// One question with its options in authored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Positional identifier (the question index)
    pub id: String,
    pub title: String,
    pub answers: Vec<Answer>,
}

impl Question {
    /// Identifiers of the answers marked correct
    pub fn correct_ids(&self) -> BTreeSet<&str> {
        self.answers
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.id.as_str())
            .collect()
    }

    /// Look up an answer by identifier
    pub fn answer(&self, answer_id: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == answer_id)
    }
}

/// A loaded test definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub is_strict: bool,
    pub is_private: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub questions: Vec<Question>,
}

impl Test {
    /// Build a test from its API record, decoding the embedded questions.
    ///
    /// `test_id` is the identifier the test was requested under; it wins
    /// over whatever the record carries.
    pub fn from_record(test_id: &str, record: TestRecord) -> EngineResult<Self> {
        let questions = decode_questions(&record.questions)?;

        Ok(Self {
            id: test_id.to_string(),
            title: record.title,
            description: record.description.unwrap_or_default(),
            image: record.image.filter(|s| !s.is_empty()),
            is_strict: record.is_strict,
            is_private: record.is_private,
            created_at: record.created_at.as_deref().and_then(parse_timestamp),
            author: record.creator,
            questions,
        })
    }

    /// Answering mode of this test
    pub fn mode(&self) -> AnswerMode {
        AnswerMode::from_strict(self.is_strict)
    }

    /// Look up a question by identifier
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// Decode the question list embedded in a test record.
///
/// The server stores it as a JSON-encoded string; an inline array is also
/// accepted. Positional identifiers are assigned here.
pub fn decode_questions(raw: &serde_json::Value) -> EngineResult<Vec<Question>> {
    let data: Vec<QuestionData> = match raw {
        serde_json::Value::String(encoded) => serde_json::from_str(encoded)
            .map_err(|e| malformed(format!("invalid question JSON: {}", e)))?,
        serde_json::Value::Array(_) => serde_json::from_value(raw.clone())
            .map_err(|e| malformed(format!("invalid question list: {}", e)))?,
        serde_json::Value::Null => return Err(malformed("test record has no questions")),
        other => {
            return Err(malformed(format!(
                "expected encoded question list, found {}",
                json_kind(other)
            )))
        }
    };

    Ok(data
        .into_iter()
        .enumerate()
        .map(|(qi, question)| Question {
            id: qi.to_string(),
            title: question.title,
            answers: question
                .answers
                .into_iter()
                .enumerate()
                .map(|(ai, answer)| Answer {
                    id: answer_id(qi, ai),
                    text: answer.text,
                    is_correct: answer.is_correct,
                })
                .collect(),
        })
        .collect())
}

fn malformed(message: impl Into<String>) -> EngineError {
    EngineError::MalformedQuestionData {
        message: message.into(),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
