use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageResult;
use crate::storage::{ClientStorage, REFRESH_TOKEN_KEY};

/// Holder for the session's bearer credentials.
///
/// The access token lives only in process memory and is gone after a
/// restart; the refresh token is written through to [`ClientStorage`].
/// Token contents are opaque and never validated or logged.
pub struct TokenStore {
    access: RwLock<Option<String>>,
    storage: Arc<dyn ClientStorage>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field(
                "has_access",
                &self.access.try_read().map(|t| t.is_some()).unwrap_or(false),
            )
            .finish()
    }
}

impl TokenStore {
    /// Create a token store persisting refresh tokens to `storage`
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            access: RwLock::new(None),
            storage,
        }
    }

    /// Replace the in-memory access token
    pub async fn set_access(&self, token: impl Into<String>) {
        debug!("Setting access token");
        *self.access.write().await = Some(token.into());
    }

    /// Current access token, if any
    pub async fn access(&self) -> Option<String> {
        self.access.read().await.clone()
    }

    /// Drop the in-memory access token
    pub async fn clear_access(&self) {
        debug!("Clearing access token");
        *self.access.write().await = None;
    }

    /// Persist a refresh token
    pub async fn set_refresh(&self, token: &str) -> StorageResult<()> {
        debug!("Setting refresh token");
        self.storage.put(REFRESH_TOKEN_KEY, token).await
    }

    /// Read the persisted refresh token
    pub async fn refresh(&self) -> StorageResult<Option<String>> {
        let token = self.storage.get(REFRESH_TOKEN_KEY).await?;
        debug!(found = token.is_some(), "Read refresh token");
        Ok(token.filter(|t| !t.is_empty()))
    }

    /// Remove the persisted refresh token
    pub async fn clear_refresh(&self) -> StorageResult<()> {
        debug!("Clearing refresh token");
        self.storage.remove(REFRESH_TOKEN_KEY).await
    }

    /// Clear both tokens. The access token is always cleared, even when
    /// removing the refresh token from storage fails.
    pub async fn clear_all(&self) -> StorageResult<()> {
        self.clear_access().await;
        self.clear_refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MockClientStorage, SqliteStorage};

    async fn sqlite_store() -> TokenStore {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        TokenStore::new(Arc::new(storage))
    }

    #[tokio::test]
    async fn test_access_token_is_memory_only() {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let store = TokenStore::new(storage.clone());

        store.set_access("access-1").await;
        assert_eq!(store.access().await, Some("access-1".to_string()));

        // A fresh store over the same storage models a process restart
        let restarted = TokenStore::new(storage);
        assert_eq!(restarted.access().await, None);
    }

    #[tokio::test]
    async fn test_refresh_token_is_persisted() {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let store = TokenStore::new(storage.clone());

        store.set_refresh("refresh-1").await.unwrap();

        let restarted = TokenStore::new(storage.clone());
        assert_eq!(
            restarted.refresh().await.unwrap(),
            Some("refresh-1".to_string())
        );
        assert_eq!(
            storage.get(REFRESH_TOKEN_KEY).await.unwrap(),
            Some("refresh-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = sqlite_store().await;
        store.set_access("a").await;
        store.set_refresh("r").await.unwrap();

        store.clear_all().await.unwrap();

        assert_eq!(store.access().await, None);
        assert_eq!(store.refresh().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_access_keeps_refresh() {
        let store = sqlite_store().await;
        store.set_access("a").await;
        store.set_refresh("r").await.unwrap();

        store.clear_access().await;

        assert_eq!(store.access().await, None);
        assert_eq!(store.refresh().await.unwrap(), Some("r".to_string()));
    }

    #[tokio::test]
    async fn test_clear_all_drops_access_even_when_storage_fails() {
        let mut mock = MockClientStorage::new();
        mock.expect_remove().returning(|_| {
            Err(StorageError::Query {
                message: "disk full".to_string(),
            })
        });
        let store = TokenStore::new(Arc::new(mock));
        store.set_access("a").await;

        assert!(store.clear_all().await.is_err());
        assert_eq!(store.access().await, None);
    }

    #[tokio::test]
    async fn test_empty_refresh_token_reads_as_absent() {
        let mut mock = MockClientStorage::new();
        mock.expect_get().returning(|_| Ok(Some(String::new())));
        let store = TokenStore::new(Arc::new(mock));

        assert_eq!(store.refresh().await.unwrap(), None);
    }
}
