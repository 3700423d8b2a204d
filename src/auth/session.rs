use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::tokens::TokenStore;
use super::types::{
    Credentials, LoginResponse, RefreshRequest, RefreshResponse, Registration, RegisterResponse,
};
use crate::config::{ApiConfig, RequestConfig};
use crate::error::{AuthError, AuthResult};

/// Session against the quiz API: login, registration and token refresh.
///
/// Cloning is cheap; clones share the same [`TokenStore`].
#[derive(Clone, Debug)]
pub struct AuthSession {
    client: Client,
    base_url: String,
    tokens: Arc<TokenStore>,
    request_config: RequestConfig,
}

impl AuthSession {
    /// Create a new session bound to `tokens`
    pub fn new(
        config: &ApiConfig,
        request_config: RequestConfig,
        tokens: Arc<TokenStore>,
    ) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(|e| AuthError::Connectivity {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            request_config,
        })
    }

    /// Log in with email and password, storing the returned token pair.
    ///
    /// Any failure clears both tokens. A rejected login carries the HTTP
    /// status so callers can tell bad credentials (401) from an unknown
    /// user (404) or malformed input (400).
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<()> {
        info!(email = %credentials.email, "Logging in");

        let response = match self
            .client
            .post(self.url("/login"))
            .json(credentials)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.fail(self.connectivity(e)).await,
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Login rejected");
            return self
                .fail(AuthError::AuthenticationFailed {
                    status: status.as_u16(),
                })
                .await;
        }

        let tokens: LoginResponse = match response.json().await {
            Ok(tokens) => tokens,
            Err(e) => {
                return self
                    .fail(AuthError::InvalidResponse {
                        message: format!("Failed to parse login response: {}", e),
                    })
                    .await
            }
        };

        self.store_tokens(Some(tokens.access_token), Some(&tokens.refresh_token))
            .await?;

        info!(email = %credentials.email, "Login succeeded");
        Ok(())
    }

    /// Register a new account. Tokens returned by the server are stored,
    /// so a successful registration is also a login.
    pub async fn register(&self, registration: &Registration) -> AuthResult<()> {
        info!(email = %registration.email, "Registering account");

        let response = match self
            .client
            .post(self.url("/register"))
            .json(registration)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.fail(self.connectivity(e)).await,
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Registration rejected");
            return self
                .fail(AuthError::AuthenticationFailed {
                    status: status.as_u16(),
                })
                .await;
        }

        // Some deployments answer with an empty body
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return self.fail(self.connectivity(e)).await,
        };
        let tokens: RegisterResponse = if body.trim().is_empty() {
            RegisterResponse::default()
        } else {
            match serde_json::from_str(&body) {
                Ok(tokens) => tokens,
                Err(e) => {
                    return self
                        .fail(AuthError::InvalidResponse {
                            message: format!("Failed to parse registration response: {}", e),
                        })
                        .await
                }
            }
        };

        self.store_tokens(tokens.access_token, tokens.refresh_token.as_deref())
            .await?;

        info!(email = %registration.email, "Registration succeeded");
        Ok(())
    }

    /// Local check: both an access and a refresh token are present.
    /// Token validity is not verified against the server.
    pub async fn is_authenticated(&self) -> bool {
        if self.tokens.access().await.is_none() {
            return false;
        }
        match self.tokens.refresh().await {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "Could not read refresh token");
                false
            }
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// The refresh token is replaced too when the server rotates it. On
    /// failure both tokens are cleared.
    pub async fn refresh(&self) -> AuthResult<()> {
        let Some(refresh_token) = self.tokens.refresh().await? else {
            return Err(AuthError::NoRefreshToken);
        };

        debug!("Refreshing access token");

        let response = match self
            .client
            .post(self.url("/refresh"))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return self
                    .fail(AuthError::RefreshFailed {
                        message: self.connectivity(e).to_string(),
                    })
                    .await
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Token refresh rejected");
            return self
                .fail(AuthError::RefreshFailed {
                    message: format!("refresh endpoint returned {}", status.as_u16()),
                })
                .await;
        }

        let refreshed: RefreshResponse = match response.json().await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                return self
                    .fail(AuthError::RefreshFailed {
                        message: format!("Failed to parse refresh response: {}", e),
                    })
                    .await
            }
        };

        let Some(access) = refreshed.access_token.filter(|t| !t.is_empty()) else {
            return self
                .fail(AuthError::RefreshFailed {
                    message: "refresh response carried no access token".to_string(),
                })
                .await;
        };

        self.store_tokens(Some(access), refreshed.refresh_token.as_deref())
            .await?;

        info!("Access token refreshed");
        Ok(())
    }

    /// Best-effort refresh for startup.
    ///
    /// Never returns an error: any failure (no stored token, server
    /// rejection, transport or storage error) yields `false` with both
    /// tokens cleared.
    pub async fn check_and_refresh(&self) -> bool {
        match self.refresh().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Startup session check failed");
                self.clear_quietly().await;
                false
            }
        }
    }

    /// End the session by clearing both tokens
    pub async fn logout(&self) -> AuthResult<()> {
        info!("Logging out");
        self.tokens.clear_all().await?;
        Ok(())
    }

    /// Token store shared by this session
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Underlying HTTP client
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Configured per-request timeout
    pub fn timeout_ms(&self) -> u64 {
        self.request_config.timeout_ms
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Clear tokens, logging instead of failing if storage is unavailable
    pub(crate) async fn clear_quietly(&self) {
        if let Err(e) = self.tokens.clear_all().await {
            warn!(error = %e, "Failed to clear persisted refresh token");
        }
    }

    /// Store whichever tokens the server returned; a storage failure leaves
    /// no half-written session behind.
    async fn store_tokens(
        &self,
        access: Option<String>,
        refresh: Option<&str>,
    ) -> AuthResult<()> {
        if let Some(access) = access {
            self.tokens.set_access(access).await;
        }
        if let Some(refresh) = refresh {
            if let Err(e) = self.tokens.set_refresh(refresh).await {
                return self.fail(AuthError::Storage(e)).await;
            }
        }
        Ok(())
    }

    async fn fail<T>(&self, err: AuthError) -> AuthResult<T> {
        self.clear_quietly().await;
        Err(err)
    }

    fn connectivity(&self, e: reqwest::Error) -> AuthError {
        let message = if e.is_timeout() {
            format!("timed out after {}ms", self.request_config.timeout_ms)
        } else {
            e.to_string()
        };
        AuthError::Connectivity { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MockClientStorage, SqliteStorage};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn create_session(base_url: &str) -> AuthSession {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let tokens = Arc::new(TokenStore::new(Arc::new(storage)));
        let config = ApiConfig {
            base_url: base_url.to_string(),
        };
        AuthSession::new(&config, RequestConfig::default(), tokens).unwrap()
    }

    #[tokio::test]
    async fn test_url_joining() {
        let session = create_session("http://localhost:8000/").await;
        assert_eq!(session.base_url(), "http://localhost:8000");
        assert_eq!(session.url("/login"), "http://localhost:8000/login");
        assert_eq!(session.url("test/7"), "http://localhost:8000/test/7");
    }

    #[tokio::test]
    async fn test_refresh_without_token() {
        let session = create_session("http://localhost:8000").await;
        let result = session.refresh().await;
        assert!(matches!(result, Err(AuthError::NoRefreshToken)));
    }

    fn failing_put_storage() -> MockClientStorage {
        let mut mock = MockClientStorage::new();
        mock.expect_get().returning(|_| Ok(Some("refresh-0".to_string())));
        mock.expect_put().returning(|_, _| {
            Err(StorageError::Query {
                message: "disk full".to_string(),
            })
        });
        mock.expect_remove().returning(|_| Ok(()));
        mock
    }

    fn session_over(base_url: &str, storage: MockClientStorage) -> AuthSession {
        let tokens = Arc::new(TokenStore::new(Arc::new(storage)));
        let config = ApiConfig {
            base_url: base_url.to_string(),
        };
        AuthSession::new(&config, RequestConfig::default(), tokens).unwrap()
    }

    #[tokio::test]
    async fn test_login_storage_failure_clears_access_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "access-1",
                "refreshToken": "refresh-1"
            })))
            .mount(&mock_server)
            .await;

        let session = session_over(&mock_server.uri(), failing_put_storage());
        let result = session
            .login(&Credentials::new("ann@example.com", "secret"))
            .await;

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert_eq!(session.tokens().access().await, None);
    }

    #[tokio::test]
    async fn test_refresh_storage_failure_clears_access_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "access-2",
                "refreshToken": "refresh-2"
            })))
            .mount(&mock_server)
            .await;

        let session = session_over(&mock_server.uri(), failing_put_storage());
        let result = session.refresh().await;

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert_eq!(session.tokens().access().await, None);
    }

    /// Serve one response whose body stops short of its Content-Length
    async fn truncated_body_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Read headers and the JSON body before answering
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 201 Created\r\nContent-Type: application/json\r\n\
                      Content-Length: 200\r\n\r\n{\"accessToken\":\"acc",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_register_truncated_body_is_connectivity_error() {
        let base_url = truncated_body_server().await;
        let session = create_session(&base_url).await;
        session.tokens().set_refresh("stale").await.unwrap();

        let result = session
            .register(&Registration::new("Ann", "ann@example.com", "secret"))
            .await;

        assert!(matches!(result, Err(AuthError::Connectivity { .. })));
        assert_eq!(session.tokens().refresh().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_is_authenticated_requires_both_tokens() {
        let session = create_session("http://localhost:8000").await;
        assert!(!session.is_authenticated().await);

        session.tokens().set_access("a").await;
        assert!(!session.is_authenticated().await);

        session.tokens().set_refresh("r").await.unwrap();
        assert!(session.is_authenticated().await);

        session.tokens().clear_access().await;
        assert!(!session.is_authenticated().await);
    }
}
