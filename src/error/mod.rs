use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Test engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Client state storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Session and token lifecycle errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication failed with status {status}")]
    AuthenticationFailed { status: u16 },

    #[error("Auth service unreachable: {message}")]
    Connectivity { message: String },

    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },

    #[error("No refresh token stored")]
    NoRefreshToken,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid auth response: {message}")]
    InvalidResponse { message: String },

    #[error("Token storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Message suitable for showing to the user, derived from the failure kind
    /// (and the HTTP status for rejected credentials).
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::AuthenticationFailed { status: 401 } => "Invalid email or password",
            AuthError::AuthenticationFailed { status: 404 } => "No account exists for this email",
            AuthError::AuthenticationFailed { status: 400 } => {
                "Required fields are missing or malformed"
            }
            AuthError::AuthenticationFailed { .. } => "Authentication failed, please try again",
            AuthError::Connectivity { .. } => "Could not reach the server, please try again",
            AuthError::RefreshFailed { .. }
            | AuthError::NoRefreshToken
            | AuthError::SessionExpired => "Your session has expired, please log in again",
            AuthError::InvalidResponse { .. } | AuthError::Storage(_) => {
                "Something went wrong, please try again"
            }
        }
    }

    /// Whether this error means the session is gone and the user must log in again.
    pub fn is_session_loss(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshFailed { .. } | AuthError::NoRefreshToken | AuthError::SessionExpired
        )
    }
}

/// Remote quiz API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid test id: {test_id:?}")]
    InvalidTestId { test_id: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Test-taking engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Test not found: {test_id}")]
    TestNotFound { test_id: String },

    #[error("Malformed question data: {message}")]
    MalformedQuestionData { message: String },

    #[error("Failed to load test: {message}")]
    LoadFailed { message: String },

    #[error("Failed to submit result: {message}")]
    SubmitFailed { message: String },

    #[error("Answers do not satisfy the submission rules for this test")]
    NotSubmittable,

    #[error("Cannot {action} while {state}")]
    InvalidState { action: &'static str, state: String },

    #[error("{0}")]
    Session(#[from] AuthError),
}

/// Authoring-side input validation failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Validation failed: {field} - {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error for the given field.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for session operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for authoring validation
pub type ValidationResult<T> = Result<T, ValidationError>;
