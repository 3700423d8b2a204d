//! Test authoring wizard.
//!
//! Step one collects the test's metadata, step two its questions. The
//! draft is persisted after every step so the wizard can resume after a
//! restart, and a single create call publishes it at the end.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{AnswerData, CreateTestRequest, ImagePayload, QuestionData, QuizApi};
use crate::error::{AppError, AppResult, ValidationError, ValidationResult};
use crate::storage::{ClientStorage, DRAFT_KEY};

/// Largest accepted image, in decoded bytes
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Minimum number of answer options per question
pub const MIN_ANSWERS: usize = 2;

/// Step one: what the test is and how it is taken
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<ImagePayload>,
    pub is_strict: Option<bool>,
    pub is_private: Option<bool>,
}

impl TestMetadata {
    /// Check required fields and the image constraints
    pub fn validate(&self) -> ValidationResult<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "cannot be empty"));
        }
        if self.is_strict.is_none() {
            return Err(ValidationError::new("isStrict", "answer mode must be chosen"));
        }
        if self.is_private.is_none() {
            return Err(ValidationError::new("isPrivate", "visibility must be chosen"));
        }
        if let Some(image) = &self.image {
            if !image.content_type.starts_with("image/") {
                return Err(ValidationError::new("image", "file must be an image"));
            }
            if image.decoded_len() > MAX_IMAGE_BYTES {
                return Err(ValidationError::new("image", "image must not exceed 5MB"));
            }
        }
        Ok(())
    }
}

/// Step two input: one question as typed in by the author
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionDraft {
    pub title: String,
    pub answers: Vec<String>,
    /// Indexes into `answers` marked correct
    pub correct: BTreeSet<usize>,
}

impl QuestionDraft {
    /// Start a question with two empty answer slots
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            answers: vec![String::new(); MIN_ANSWERS],
            correct: BTreeSet::new(),
        }
    }

    /// Editable form of an already-authored question
    pub fn from_data(data: &QuestionData) -> Self {
        Self {
            title: data.title.clone(),
            answers: data.answers.iter().map(|a| a.text.clone()).collect(),
            correct: data
                .answers
                .iter()
                .enumerate()
                .filter(|(_, a)| a.is_correct)
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// Check title, answer texts and that some answer is correct
    pub fn validate(&self) -> ValidationResult<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("question", "title cannot be empty"));
        }
        if self.answers.len() < MIN_ANSWERS {
            return Err(ValidationError::new(
                "answers",
                format!("at least {} answers are required", MIN_ANSWERS),
            ));
        }
        if self.answers.iter().any(|a| a.trim().is_empty()) {
            return Err(ValidationError::new("answers", "every answer must be filled in"));
        }
        if !self.correct.iter().any(|&i| i < self.answers.len()) {
            return Err(ValidationError::new(
                "correct",
                "at least one correct answer must be marked",
            ));
        }
        Ok(())
    }

    /// Wire form of the question
    pub fn to_data(&self) -> QuestionData {
        QuestionData {
            title: self.title.clone(),
            answers: self
                .answers
                .iter()
                .enumerate()
                .map(|(i, text)| AnswerData {
                    text: text.clone(),
                    is_correct: self.correct.contains(&i),
                })
                .collect(),
        }
    }
}

/// Persisted wizard state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDraft {
    pub metadata: TestMetadata,
    #[serde(default)]
    pub questions: Vec<QuestionData>,
}

impl TestDraft {
    /// Create request for this draft
    pub fn to_request(&self, refresh_token: Option<String>) -> ValidationResult<CreateTestRequest> {
        self.metadata.validate()?;
        if self.questions.is_empty() {
            return Err(ValidationError::new(
                "questions",
                "a test needs at least one question",
            ));
        }

        Ok(CreateTestRequest {
            title: self.metadata.title.trim().to_string(),
            description: self.metadata.description.clone(),
            image: self.metadata.image.clone(),
            is_strict: self.metadata.is_strict.unwrap_or_default(),
            is_private: self.metadata.is_private.unwrap_or_default(),
            questions: self.questions.clone(),
            refresh_token,
        })
    }
}

/// Drives the authoring wizard against client storage and the API
#[derive(Clone)]
pub struct QuestionAuthoringFlow {
    storage: Arc<dyn ClientStorage>,
    api: QuizApi,
}

impl QuestionAuthoringFlow {
    /// Create a new authoring flow
    pub fn new(storage: Arc<dyn ClientStorage>, api: QuizApi) -> Self {
        Self { storage, api }
    }

    /// Validate the metadata step and persist a fresh draft
    pub async fn begin(&self, metadata: TestMetadata) -> AppResult<TestDraft> {
        metadata.validate()?;
        let draft = TestDraft {
            metadata,
            questions: Vec::new(),
        };
        self.save(&draft).await?;
        info!(title = %draft.metadata.title, "Started test draft");
        Ok(draft)
    }

    /// Load a previously persisted draft
    pub async fn resume(&self) -> AppResult<Option<TestDraft>> {
        let Some(raw) = self.storage.get(DRAFT_KEY).await? else {
            return Ok(None);
        };
        let draft = serde_json::from_str(&raw).map_err(|e| AppError::Internal {
            message: format!("Stored test draft is unreadable: {}", e),
        })?;
        Ok(Some(draft))
    }

    /// Validate a question, append it to the draft and persist
    pub async fn add_question(&self, draft: &mut TestDraft, question: QuestionDraft) -> AppResult<()> {
        question.validate()?;
        draft.questions.push(question.to_data());
        self.save(draft).await?;
        debug!(questions = draft.questions.len(), "Question added to draft");
        Ok(())
    }

    /// Publish the draft with one create call and drop the persisted copy
    pub async fn finish(&self, draft: &TestDraft) -> AppResult<()> {
        let refresh_token = self.api.client().session().tokens().refresh().await?;
        let request = draft.to_request(refresh_token)?;

        self.api.create_test(&request).await?;
        self.storage.remove(DRAFT_KEY).await?;

        info!(title = %request.title, questions = request.questions.len(), "Test published");
        Ok(())
    }

    /// Drop the persisted draft
    pub async fn discard(&self) -> AppResult<()> {
        self.storage.remove(DRAFT_KEY).await?;
        Ok(())
    }

    async fn save(&self, draft: &TestDraft) -> AppResult<()> {
        let raw = serde_json::to_string(draft).map_err(|e| AppError::Internal {
            message: format!("Failed to encode test draft: {}", e),
        })?;
        self.storage.put(DRAFT_KEY, &raw).await?;
        Ok(())
    }
}
