use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier that the API sends either as a number or as a string
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

fn flexible_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "flexible_id")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

/// Parse a server timestamp: RFC 3339, or a naive ISO timestamp taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Answer as authored and as embedded in a test record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerData {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Question as authored and as embedded in a test record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionData {
    pub title: String,
    pub answers: Vec<AnswerData>,
}

/// Image attached to a test, already base64-encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub data: String,
}

impl ImagePayload {
    /// Size in bytes of the decoded image
    pub fn decoded_len(&self) -> usize {
        let data = self.data.trim_end();
        let padding = data.chars().rev().take_while(|c| *c == '=').count();
        (data.len() / 4 * 3).saturating_sub(padding)
    }
}

/// Full test record from `/test/{id}`.
///
/// `questions` is kept raw: the server embeds it as a JSON-encoded string,
/// and decoding it is the test engine's job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub is_strict: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, alias = "authorName")]
    pub creator: Option<String>,
    #[serde(default)]
    pub questions: serde_json::Value,
}

/// Listing entry for a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "creator")]
    pub author_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_strict: bool,
}

/// Response of `/get_all_tests`
#[derive(Debug, Clone, Deserialize)]
pub struct AllTestsResponse {
    #[serde(default)]
    pub tests: Vec<TestSummary>,
}

/// Filters accepted by `/get_all_tests`
#[derive(Debug, Clone, Default)]
pub struct TestFilters {
    pub test_name: Option<String>,
    pub author_name: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub is_strict: Option<bool>,
}

impl TestFilters {
    /// Query parameters for the given page; empty filters are omitted
    pub fn to_query(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", page.to_string())];
        if let Some(name) = self.test_name.as_deref().filter(|s| !s.is_empty()) {
            query.push(("testName", name.to_string()));
        }
        if let Some(author) = self.author_name.as_deref().filter(|s| !s.is_empty()) {
            query.push(("authorName", author.to_string()));
        }
        if let Some(from) = self.created_from {
            query.push(("createdFrom", from.to_rfc3339()));
        }
        if let Some(to) = self.created_to {
            query.push(("createdTo", to.to_rfc3339()));
        }
        if let Some(strict) = self.is_strict {
            query.push(("isStrict", strict.to_string()));
        }
        query
    }
}

/// Response of `/my_profile`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// One selected answer inside a stored result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAnswer {
    pub answer: String,
    pub is_correct: bool,
}

/// A question and what was selected for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub question: String,
    pub selected_answers: Vec<SelectedAnswer>,
}

/// Per-question detail of one attempt, as stored by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub answers: Vec<AnsweredQuestion>,
}

/// Body posted to `/set_result`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSubmission {
    pub test_id: String,
    pub score: u8,
    /// JSON-encoded [`ResultRecord`]
    pub result: String,
    pub refresh_token: Option<String>,
}

/// Stored result as listed by `/my_results` and `/my_tests_results`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub score: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

impl ResultSummary {
    /// Decode the embedded per-question record; `None` if absent or unreadable
    pub fn record(&self) -> Option<ResultRecord> {
        self.result
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// When the attempt was recorded
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.completed_at
            .as_deref()
            .or(self.created_at.as_deref())
            .and_then(parse_timestamp)
    }
}

/// Envelope of `/my_results` and `/my_tests_results`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsResponse {
    #[serde(default)]
    pub results: Vec<ResultSummary>,
}

/// Body posted to `/create_test`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub title: String,
    pub description: String,
    pub image: Option<ImagePayload>,
    pub is_strict: bool,
    pub is_private: bool,
    pub questions: Vec<QuestionData>,
    pub refresh_token: Option<String>,
}
