//! Session and token lifecycle.
//!
//! - [`TokenStore`]: memory-only access token, persisted refresh token
//! - [`AuthSession`]: login, registration, refresh and logout
//! - [`AuthenticatedClient`]: bearer injection with one refresh-and-retry

mod request;
mod session;
mod tokens;
mod types;

pub use request::AuthenticatedClient;
pub use session::AuthSession;
pub use tokens::TokenStore;
pub use types::{Credentials, Registration};
