use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, error, info};

use super::types::{
    AllTestsResponse, CreateTestRequest, ResultSubmission, ResultSummary, ResultsResponse,
    TestFilters, TestRecord, TestSummary, UserProfile,
};
use crate::auth::AuthenticatedClient;
use crate::error::{ApiError, ApiResult};

/// Typed client for the quiz platform's REST endpoints
#[derive(Clone, Debug)]
pub struct QuizApi {
    client: AuthenticatedClient,
}

impl QuizApi {
    /// Create a new API client on top of an authenticated transport
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    /// The authenticated transport
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Create a test from an authored draft
    pub async fn create_test(&self, request: &CreateTestRequest) -> ApiResult<()> {
        info!(title = %request.title, questions = request.questions.len(), "Creating test");

        let builder = self.client.http().post(self.client.url("/create_test")).json(request);
        let response = self.client.send(builder).await?;
        ensure_success(response).await?;

        info!(title = %request.title, "Test created");
        Ok(())
    }

    /// Fetch one test including its embedded questions
    pub async fn fetch_test(&self, test_id: &str) -> ApiResult<TestRecord> {
        let start = Instant::now();
        debug!(test_id = %test_id, "Fetching test");

        let builder = self.client.http().get(self.test_url(test_id)?);
        let result: ApiResult<TestRecord> = match self.client.send(builder).await {
            Ok(response) => read_json(response).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => info!(
                test_id = %test_id,
                latency_ms = start.elapsed().as_millis(),
                "Test fetched"
            ),
            Err(e) => error!(
                test_id = %test_id,
                error = %e,
                latency_ms = start.elapsed().as_millis(),
                "Test fetch failed"
            ),
        }
        result
    }

    /// Persist the result of a completed attempt
    pub async fn submit_result(&self, submission: &ResultSubmission) -> ApiResult<()> {
        let start = Instant::now();

        let builder = self.client.http().post(self.client.url("/set_result")).json(submission);
        let response = self.client.send(builder).await?;
        ensure_success(response).await?;

        info!(
            test_id = %submission.test_id,
            score = submission.score,
            latency_ms = start.elapsed().as_millis(),
            "Result submitted"
        );
        Ok(())
    }

    /// One page of the public home listing
    pub async fn home_tests(&self, page: u32) -> ApiResult<Vec<TestSummary>> {
        let builder = self
            .client
            .http()
            .get(self.client.url(&format!("/get_home_tests/{}/", page)));
        let response = self.client.send_public(builder).await?;
        read_json(response).await
    }

    /// Filtered listing of all public tests
    pub async fn all_tests(&self, filters: &TestFilters, page: u32) -> ApiResult<Vec<TestSummary>> {
        let builder = self
            .client
            .http()
            .get(self.client.url("/get_all_tests"))
            .query(&filters.to_query(page));
        let response = self.client.send_public(builder).await?;
        let listing: AllTestsResponse = read_json(response).await?;
        Ok(listing.tests)
    }

    /// Number of public tests
    pub async fn count_public_tests(&self) -> ApiResult<u64> {
        let builder = self.client.http().get(self.client.url("/count_all_public_tests"));
        let response = self.client.send_public(builder).await?;
        read_json(response).await
    }

    /// Profile of the logged-in user
    pub async fn my_profile(&self) -> ApiResult<UserProfile> {
        self.get_authenticated("/my_profile").await
    }

    /// Results of tests the logged-in user took
    pub async fn my_results(&self) -> ApiResult<Vec<ResultSummary>> {
        let listing: ResultsResponse = self.get_authenticated("/my_results").await?;
        Ok(listing.results)
    }

    /// Results other users got on the logged-in user's tests
    pub async fn my_tests_results(&self) -> ApiResult<Vec<ResultSummary>> {
        let listing: ResultsResponse = self.get_authenticated("/my_tests_results").await?;
        Ok(listing.results)
    }

    /// Tests authored by the logged-in user
    pub async fn my_tests(&self) -> ApiResult<Vec<TestSummary>> {
        self.get_authenticated("/my_tests").await
    }

    /// `/test/{id}` with the id encoded as a single path segment
    fn test_url(&self, test_id: &str) -> ApiResult<Url> {
        let invalid = || ApiError::InvalidTestId {
            test_id: test_id.to_string(),
        };
        if matches!(test_id, "" | "." | "..") || test_id.contains('/') {
            return Err(invalid());
        }

        let mut url = Url::parse(&self.client.url("/test")).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push(test_id);
        Ok(url)
    }

    async fn get_authenticated<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let builder = self.client.http().get(self.client.url(path));
        let response = self.client.send(builder).await?;
        read_json(response).await
    }
}

/// Turn a non-2xx response into [`ApiError::Status`] carrying the body
async fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&error_body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(error_body);

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let response = ensure_success(response).await?;
    response
        .json()
        .await
        .map_err(|e| ApiError::InvalidResponse {
            message: format!("Failed to parse response: {}", e),
        })
}
