//! Integration tests for the test engine
//!
//! Drives full attempts (load, select, submit, retry) against a wiremock
//! server and checks the persisted result payload.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use quiz_client::api::{QuizApi, ResultRecord};
use quiz_client::auth::{AuthSession, AuthenticatedClient, TokenStore};
use quiz_client::config::{ApiConfig, RequestConfig};
use quiz_client::engine::{EngineState, TestEngine};
use quiz_client::error::{AuthError, EngineError};
use quiz_client::storage::SqliteStorage;

/// Create a logged-in engine pointing to the mock server
async fn create_test_engine(base_url: &str) -> TestEngine {
    let storage = SqliteStorage::new_in_memory()
        .await
        .expect("Failed to open in-memory storage");
    let tokens = Arc::new(TokenStore::new(Arc::new(storage)));
    tokens.set_access("access-1").await;
    tokens.set_refresh("refresh-1").await.unwrap();

    let config = ApiConfig {
        base_url: base_url.to_string(),
    };
    let session = AuthSession::new(&config, RequestConfig { timeout_ms: 5000 }, tokens)
        .expect("Failed to create session");
    TestEngine::new(QuizApi::new(AuthenticatedClient::new(session)))
}

/// Q1 has correct set {A}, Q2 has correct set {B, C}
fn create_test_record(is_strict: bool) -> Value {
    let questions = json!([
        {
            "title": "Q1",
            "answers": [
                {"text": "A", "isCorrect": true},
                {"text": "B", "isCorrect": false},
                {"text": "C", "isCorrect": false}
            ]
        },
        {
            "title": "Q2",
            "answers": [
                {"text": "A", "isCorrect": false},
                {"text": "B", "isCorrect": true},
                {"text": "C", "isCorrect": true}
            ]
        }
    ]);

    json!({
        "id": 7,
        "title": "Rust basics",
        "description": "Ownership and borrowing",
        "image": "",
        "isStrict": is_strict,
        "isPrivate": false,
        "createdAt": "2024-05-01T10:00:00Z",
        "creator": "ann",
        "questions": questions.to_string()
    })
}

async fn mount_test(mock_server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/test/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock_server)
        .await;
}

async fn mount_set_result(mock_server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/set_result"))
        .respond_with(ResponseTemplate::new(status))
        .mount(mock_server)
        .await;
}

/// Decode the `result` string of the last `/set_result` request
async fn submitted_record(mock_server: &MockServer) -> (Value, ResultRecord) {
    let requests = mock_server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .rev()
        .find(|r| r.url.path() == "/set_result")
        .expect("no result was submitted");
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    let record = serde_json::from_str(body["result"].as_str().unwrap()).unwrap();
    (body, record)
}

#[cfg(test)]
mod load_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_load_decodes_questions() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        assert_eq!(engine.state(), EngineState::Loading);

        let test = engine.load("7").await.unwrap();
        assert_eq!(test.id, "7");
        assert_eq!(test.title, "Rust basics");
        assert_eq!(test.image, None);
        assert_eq!(test.author.as_deref(), Some("ann"));
        assert!(test.created_at.is_some());
        assert_eq!(test.questions.len(), 2);
        assert_eq!(test.questions[1].id, "1");
        assert_eq!(test.questions[1].answers[2].id, "1_2");

        assert_eq!(engine.state(), EngineState::Ready);
        assert!(!engine.can_submit());
    }

    #[tokio::test]
    async fn test_load_accepts_inline_question_array() {
        let mock_server = MockServer::start().await;
        let mut record = create_test_record(false);
        record["questions"] = json!([{"title": "Q1", "answers": [{"text": "A", "isCorrect": true}]}]);
        mount_test(&mock_server, record).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        let test = engine.load("7").await.unwrap();
        assert_eq!(test.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_test() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        let err = engine.load("404").await.unwrap_err();

        assert!(matches!(err, EngineError::TestNotFound { ref test_id } if test_id == "404"));
        assert_eq!(engine.state(), EngineState::Error);
        assert!(engine.test().is_none());
        assert!(engine.last_error().is_some());
    }

    #[tokio::test]
    async fn test_load_malformed_questions() {
        let mock_server = MockServer::start().await;
        let mut record = create_test_record(true);
        record["questions"] = json!("[{\"title\": ");
        mount_test(&mock_server, record).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        let err = engine.load("7").await.unwrap_err();

        assert!(matches!(err, EngineError::MalformedQuestionData { .. }));
        assert_eq!(engine.state(), EngineState::Error);
    }

    #[tokio::test]
    async fn test_load_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test/7"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        let err = engine.load("7").await.unwrap_err();

        assert!(matches!(err, EngineError::LoadFailed { .. }));
        assert_eq!(engine.state(), EngineState::Error);
    }

    #[tokio::test]
    async fn test_load_after_error_can_succeed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test/7"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        mount_test(&mock_server, create_test_record(true)).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        assert!(engine.load("7").await.is_err());
        assert!(engine.load("7").await.is_ok());
        assert_eq!(engine.state(), EngineState::Ready);
        assert!(engine.last_error().is_none());
    }

    #[tokio::test]
    async fn test_load_with_expired_session() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test/7"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        let err = engine.load("7").await.unwrap_err();

        assert!(matches!(err, EngineError::Session(AuthError::SessionExpired)));
        assert_eq!(engine.state(), EngineState::Error);
    }

    #[tokio::test]
    async fn test_load_twice_is_rejected() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();

        let err = engine.load("7").await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot load while ready");
    }
}

#[cfg(test)]
mod answering_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_select_ignores_unknown_answers() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        assert!(!engine.select("0", "0_0"), "nothing loaded yet");

        engine.load("7").await.unwrap();
        assert!(!engine.select("9", "9_0"));
        assert!(!engine.select("0", "1_0"));
        assert_eq!(engine.state(), EngineState::Ready);

        assert!(engine.select("0", "0_0"));
        assert_eq!(engine.state(), EngineState::Answering);
    }

    #[tokio::test]
    async fn test_strict_requires_every_question() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();
        engine.start().unwrap();

        engine.select("0", "0_0");
        assert!(!engine.can_submit());
        assert!(matches!(
            engine.submit().await.unwrap_err(),
            EngineError::NotSubmittable
        ));
        assert_eq!(engine.state(), EngineState::Answering);

        engine.select("1", "1_1");
        assert!(engine.can_submit());

        // Deselecting Q2's only answer makes it unanswered again
        engine.select("1", "1_1");
        assert!(!engine.can_submit());
    }

    #[tokio::test]
    async fn test_preview_score_matches_submission() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;
        mount_set_result(&mock_server, 201).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();
        engine.select("0", "0_0");
        engine.select("1", "1_1");

        let preview = engine.preview_score().unwrap();
        let card = engine.submit().await.unwrap();
        assert_eq!(&preview, card);
    }
}

#[cfg(test)]
mod submit_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_strict_partial_credit_is_persisted() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;

        Mock::given(method("POST"))
            .and(path("/set_result"))
            .and(body_partial_json(json!({
                "testId": "7",
                "score": 50,
                "refreshToken": "refresh-1"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();
        engine.select("0", "0_0");
        engine.select("1", "1_1");

        let card = engine.submit().await.unwrap();
        assert_eq!(card.score, 50);
        assert_eq!(card.correct, 1);
        assert_eq!(card.considered, 2);
        assert_eq!(engine.state(), EngineState::Submitted);

        let (_, record) = submitted_record(&mock_server).await;
        let summary: Vec<(String, Vec<(String, bool)>)> = record
            .answers
            .iter()
            .map(|q| {
                (
                    q.question.clone(),
                    q.selected_answers
                        .iter()
                        .map(|a| (a.answer.clone(), a.is_correct))
                        .collect(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Q1".to_string(), vec![("A".to_string(), true)]),
                ("Q2".to_string(), vec![("B".to_string(), true)]),
            ]
        );
    }

    #[tokio::test]
    async fn test_loose_scores_answered_questions_only() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(false)).await;
        mount_set_result(&mock_server, 201).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();
        engine.select("0", "0_0");

        let card = engine.submit().await.unwrap();
        assert_eq!(card.score, 100);
        assert_eq!(card.considered, 1);

        let (body, record) = submitted_record(&mock_server).await;
        assert_eq!(body["score"], json!(100));
        assert_eq!(record.answers.len(), 1);
        assert_eq!(record.answers[0].question, "Q1");
    }

    #[tokio::test]
    async fn test_all_correct_scores_100() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;
        mount_set_result(&mock_server, 201).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        let correct: Vec<(String, String)> = engine
            .load("7")
            .await
            .unwrap()
            .questions
            .iter()
            .flat_map(|q| {
                q.answers
                    .iter()
                    .filter(|a| a.is_correct)
                    .map(|a| (q.id.clone(), a.id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (question, answer) in &correct {
            engine.select(question, answer);
        }

        assert_eq!(engine.submit().await.unwrap().score, 100);
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_selections() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(true)).await;

        Mock::given(method("POST"))
            .and(path("/set_result"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        mount_set_result(&mock_server, 201).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();
        engine.select("0", "0_0");
        engine.select("1", "1_1");
        engine.select("1", "1_2");

        let err = engine.submit().await.unwrap_err();
        assert!(matches!(err, EngineError::SubmitFailed { .. }));
        assert_eq!(engine.state(), EngineState::Answering);
        assert_eq!(engine.selection().answered_count(), 2);
        assert!(engine.outcome().is_none());
        assert!(engine.last_error().is_some());

        // Resubmitting the same selections succeeds
        assert_eq!(engine.submit().await.unwrap().score, 100);
        assert_eq!(engine.state(), EngineState::Submitted);
    }

    #[tokio::test]
    async fn test_submitted_attempt_is_read_only() {
        let mock_server = MockServer::start().await;
        mount_test(&mock_server, create_test_record(false)).await;
        mount_set_result(&mock_server, 201).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();
        engine.select("0", "0_0");
        engine.submit().await.unwrap();

        assert!(!engine.select("0", "0_1"));
        assert!(!engine.can_submit());
        assert!(matches!(
            engine.submit().await.unwrap_err(),
            EngineError::InvalidState { action: "submit", .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_starts_fresh_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_test_record(false)))
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_set_result(&mock_server, 201).await;

        let mut engine = create_test_engine(&mock_server.uri()).await;
        engine.load("7").await.unwrap();
        assert!(engine.retry().is_err(), "retry before submitting");

        engine.select("0", "0_1");
        assert_eq!(engine.submit().await.unwrap().score, 0);
        let first_attempt = engine.attempt_id();

        engine.retry().unwrap();
        assert_eq!(engine.state(), EngineState::Answering);
        assert!(engine.selection().is_empty());
        assert!(engine.outcome().is_none());
        assert!(engine.test().is_some());
        assert_ne!(engine.attempt_id(), first_attempt);

        engine.select("0", "0_0");
        assert_eq!(engine.submit().await.unwrap().score, 100);
    }
}
