//! Test-taking engine.
//!
//! Drives one attempt at a test through
//! `Loading -> Ready -> Answering -> Submitted`:
//!
//! - **load** fetches the test and decodes its questions; failures move to
//!   `Error` and end the attempt
//! - **select** toggles answers (multi-select) while `Ready`/`Answering`
//! - **submit** scores and persists the result; on failure the engine stays
//!   in `Answering` with the selections intact so the user can resubmit
//! - **retry** starts over on the same test without re-fetching it

mod model;
mod scoring;
mod selection;

pub use model::{answer_id, decode_questions, Answer, AnswerMode, Question, Test};
pub use scoring::{
    build_record, can_submit, is_question_correct, percentage, score, QuestionVerdict, ScoreCard,
};
pub use selection::AnswerSelection;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::{QuizApi, ResultSubmission};
use crate::error::{ApiError, EngineError, EngineResult};

/// Lifecycle state of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No test loaded yet
    Loading,
    /// Test loaded, nothing selected yet
    Ready,
    /// Answers being selected
    Answering,
    /// Result persisted; selections are read-only
    Submitted,
    /// Loading failed
    Error,
}

impl EngineState {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Answering => "answering",
            EngineState::Submitted => "submitted",
            EngineState::Error => "error",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State machine for a single attempt at a test
#[derive(Debug)]
pub struct TestEngine {
    api: QuizApi,
    attempt_id: Uuid,
    state: EngineState,
    test: Option<Test>,
    selection: AnswerSelection,
    outcome: Option<ScoreCard>,
    last_error: Option<String>,
}

impl TestEngine {
    /// Create an engine with nothing loaded
    pub fn new(api: QuizApi) -> Self {
        Self {
            api,
            attempt_id: Uuid::new_v4(),
            state: EngineState::Loading,
            test: None,
            selection: AnswerSelection::new(),
            outcome: None,
            last_error: None,
        }
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Loaded test, if any
    pub fn test(&self) -> Option<&Test> {
        self.test.as_ref()
    }

    /// Current selections
    pub fn selection(&self) -> &AnswerSelection {
        &self.selection
    }

    /// Score of the submitted attempt
    pub fn outcome(&self) -> Option<&ScoreCard> {
        self.outcome.as_ref()
    }

    /// Message of the most recent load or submit failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Identifier used to correlate this attempt's log events
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// Fetch and decode a test. Allowed before anything is loaded or after a
    /// failed load.
    pub async fn load(&mut self, test_id: &str) -> EngineResult<&Test> {
        if !matches!(self.state, EngineState::Loading | EngineState::Error) {
            return Err(self.invalid("load"));
        }
        self.state = EngineState::Loading;
        self.last_error = None;

        info!(attempt = %self.attempt_id, test_id = %test_id, "Loading test");

        let record = match self.api.fetch_test(test_id).await {
            Ok(record) => record,
            Err(e) => return Err(self.fail_load(load_error(test_id, e))),
        };

        let test = match Test::from_record(test_id, record) {
            Ok(test) => test,
            Err(e) => return Err(self.fail_load(e)),
        };

        info!(
            attempt = %self.attempt_id,
            test_id = %test.id,
            questions = test.questions.len(),
            mode = %test.mode(),
            "Test ready"
        );

        self.selection.clear();
        self.outcome = None;
        self.state = EngineState::Ready;
        Ok(self.test.insert(test))
    }

    /// Begin answering a loaded test
    pub fn start(&mut self) -> EngineResult<()> {
        match self.state {
            EngineState::Ready => {
                self.state = EngineState::Answering;
                Ok(())
            }
            EngineState::Answering => Ok(()),
            _ => Err(self.invalid("start")),
        }
    }

    /// Toggle one answer of one question.
    ///
    /// Ignored outside `Ready`/`Answering` and for identifiers that are not
    /// part of the loaded test. Returns whether the selection changed.
    pub fn select(&mut self, question_id: &str, answer_id: &str) -> bool {
        if !matches!(self.state, EngineState::Ready | EngineState::Answering) {
            debug!(state = %self.state, "Ignoring selection");
            return false;
        }
        let known = self
            .test
            .as_ref()
            .and_then(|t| t.question(question_id))
            .is_some_and(|q| q.answer(answer_id).is_some());
        if !known {
            warn!(question_id = %question_id, answer_id = %answer_id, "Unknown answer selected");
            return false;
        }

        self.selection.toggle(question_id, answer_id);
        self.state = EngineState::Answering;
        true
    }

    /// Whether the current selections satisfy the test's submission rule
    pub fn can_submit(&self) -> bool {
        match (&self.test, self.state) {
            (Some(test), EngineState::Ready | EngineState::Answering) => {
                can_submit(test, &self.selection)
            }
            _ => false,
        }
    }

    /// Score of the current selections without submitting
    pub fn preview_score(&self) -> Option<ScoreCard> {
        self.test.as_ref().map(|t| score(t, &self.selection))
    }

    /// Score the attempt and persist the result.
    ///
    /// On failure the engine stays in `Answering` with the selections kept,
    /// so submission can be retried.
    pub async fn submit(&mut self) -> EngineResult<&ScoreCard> {
        if !matches!(self.state, EngineState::Ready | EngineState::Answering) {
            return Err(self.invalid("submit"));
        }
        let Some(test) = self.test.as_ref() else {
            return Err(self.invalid("submit"));
        };
        if !can_submit(test, &self.selection) {
            return Err(EngineError::NotSubmittable);
        }

        let card = score(test, &self.selection);
        let record = build_record(test, &self.selection);
        let result = serde_json::to_string(&record).map_err(|e| EngineError::SubmitFailed {
            message: format!("Failed to encode result: {}", e),
        })?;

        let refresh_token = match self.api.client().session().tokens().refresh().await {
            Ok(token) => token,
            Err(e) => {
                return Err(self.fail_submit(EngineError::SubmitFailed {
                    message: e.to_string(),
                }))
            }
        };

        let submission = ResultSubmission {
            test_id: test.id.clone(),
            score: card.score,
            result,
            refresh_token,
        };

        info!(
            attempt = %self.attempt_id,
            test_id = %submission.test_id,
            score = card.score,
            correct = card.correct,
            considered = card.considered,
            "Submitting result"
        );

        if let Err(e) = self.api.submit_result(&submission).await {
            let err = match e {
                ApiError::Auth(auth) => EngineError::Session(auth),
                other => EngineError::SubmitFailed {
                    message: other.to_string(),
                },
            };
            return Err(self.fail_submit(err));
        }

        self.last_error = None;
        self.state = EngineState::Submitted;
        Ok(self.outcome.insert(card))
    }

    /// Start a new attempt on the same test after submitting
    pub fn retry(&mut self) -> EngineResult<()> {
        if self.state != EngineState::Submitted {
            return Err(self.invalid("retry"));
        }
        self.selection.clear();
        self.outcome = None;
        self.last_error = None;
        self.attempt_id = Uuid::new_v4();
        self.state = EngineState::Answering;
        info!(attempt = %self.attempt_id, "Retrying test");
        Ok(())
    }

    fn fail_load(&mut self, err: EngineError) -> EngineError {
        error!(attempt = %self.attempt_id, error = %err, "Test load failed");
        self.test = None;
        self.state = EngineState::Error;
        self.last_error = Some(err.to_string());
        err
    }

    fn fail_submit(&mut self, err: EngineError) -> EngineError {
        error!(attempt = %self.attempt_id, error = %err, "Result submission failed");
        self.state = EngineState::Answering;
        self.last_error = Some(err.to_string());
        err
    }

    fn invalid(&self, action: &'static str) -> EngineError {
        EngineError::InvalidState {
            action,
            state: self.state.to_string(),
        }
    }
}

fn load_error(test_id: &str, err: ApiError) -> EngineError {
    match err {
        ApiError::Status { status: 404, .. } => EngineError::TestNotFound {
            test_id: test_id.to_string(),
        },
        ApiError::Auth(auth) => EngineError::Session(auth),
        other => EngineError::LoadFailed {
            message: other.to_string(),
        },
    }
}
