use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::session::AuthSession;
use crate::error::{ApiError, ApiResult, AuthError};

/// HTTP client that attaches the session's bearer token to every request.
///
/// A 401 triggers one refresh and one replay of the request. Refreshes are
/// single-flight: requests that fail with the same stale token share a
/// single call to `/refresh`.
#[derive(Clone, Debug)]
pub struct AuthenticatedClient {
    session: AuthSession,
    refresh_gate: Arc<Mutex<()>>,
}

impl AuthenticatedClient {
    /// Wrap a session
    pub fn new(session: AuthSession) -> Self {
        Self {
            session,
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// The wrapped session
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Underlying HTTP client, for building requests
    pub fn http(&self) -> &Client {
        self.session.http()
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        self.session.url(path)
    }

    /// Send `request` with the current access token.
    ///
    /// Without an access token a refresh is attempted first. On a 401 the
    /// session is refreshed and the request is replayed exactly once; the
    /// replay's response is returned whatever its status. If a needed
    /// refresh fails, both tokens are cleared and [`AuthError::SessionExpired`]
    /// is returned.
    pub async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let token = match self.session.tokens().access().await {
            Some(token) => token,
            None => {
                debug!("No access token, refreshing before request");
                self.refresh_once(None).await?
            }
        };

        let replay = request.try_clone();
        let response = self.dispatch(request, &token).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(replay) = replay else {
            warn!("Request body cannot be replayed, returning 401 as-is");
            return Ok(response);
        };

        info!(url = %response.url(), "Access token rejected, refreshing and retrying once");
        let token = self.refresh_once(Some(&token)).await?;
        self.dispatch(replay, &token).await
    }

    /// Send a request that needs no credentials
    pub async fn send_public(&self, request: RequestBuilder) -> ApiResult<Response> {
        request.send().await.map_err(|e| self.transport_error(e))
    }

    async fn dispatch(&self, request: RequestBuilder, token: &str) -> ApiResult<Response> {
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    /// Refresh the session unless a concurrent request already did.
    ///
    /// `stale` is the access token the caller last used (`None` if it had
    /// none). If the stored token differs from it by the time the gate is
    /// acquired, that newer token is returned without another refresh.
    async fn refresh_once(&self, stale: Option<&str>) -> ApiResult<String> {
        let _guard = self.refresh_gate.lock().await;

        if let Some(current) = self.session.tokens().access().await {
            if stale != Some(current.as_str()) {
                debug!("Access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        if let Err(e) = self.session.refresh().await {
            warn!(error = %e, "Session refresh failed, clearing session");
            self.session.clear_quietly().await;
            return Err(AuthError::SessionExpired.into());
        }

        self.session
            .tokens()
            .access()
            .await
            .ok_or_else(|| AuthError::SessionExpired.into())
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                timeout_ms: self.session.timeout_ms(),
            }
        } else {
            ApiError::Http(e)
        }
    }
}
