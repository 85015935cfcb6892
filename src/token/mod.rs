//! Session Tokens
//!
//! Storage of authenticated sessions and the credential read/refresh path.

pub mod credentials;
pub mod storage;

pub use credentials::CredentialAccessor;
pub use storage::SessionStore;
