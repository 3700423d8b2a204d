//! Durable client-side state.
//!
//! The client keeps a small key/value table on disk for state that must
//! survive a restart: the refresh token and the in-progress authoring draft.
//! Access tokens are never written here.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Key under which the authoring draft is persisted between wizard steps.
pub const DRAFT_KEY: &str = "testData";

/// Durable key/value store for client state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;
    /// Insert or replace the value stored under `key`.
    async fn put(&self, key: &str, value: &str) -> StorageResult<()>;
    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}
