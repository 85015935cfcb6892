//! State Management
//!
//! Pending authorization attempts, stored under a fixed-length hash of the
//! `state` parameter so long state tokens never hit backend key limits.

use base64::Engine;
use md5::{Digest, Md5};
use rand::Rng;
use tracing::debug;

use crate::core::CacheAdapter;
use crate::error::SessionResult;
use crate::types::{AuthorizationAttempt, PendingAttempt, RequestContext};

/// Cache key for a state token: lowercase hex MD5, always 32 characters.
pub fn state_cache_key(state: &str) -> String {
    hex::encode(Md5::digest(state.as_bytes()))
}

/// Generate a fresh state token.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a fresh OIDC nonce.
pub fn generate_nonce() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Store of pending authorization attempts.
///
/// Records take the backend's default lifetime; an attempt that never comes
/// back is left to backend eviction.
#[derive(Clone)]
pub struct StateStore {
    cache: CacheAdapter,
}

impl StateStore {
    /// Create a state store over a cache adapter.
    pub fn new(cache: CacheAdapter) -> Self {
        Self { cache }
    }

    /// Persist an attempt under the hash of `state`, returning that key.
    pub async fn begin(
        &self,
        state: &str,
        attempt: &AuthorizationAttempt,
        request: Option<&RequestContext>,
    ) -> SessionResult<String> {
        let state_key = state_cache_key(state);
        self.cache.set(&state_key, attempt, None, request).await?;
        debug!(state_key = %state_key, policy = %attempt.policy_name, "Authorization attempt stored");
        Ok(state_key)
    }

    /// Look up the attempt for `state`. Does not remove it.
    pub async fn consume(
        &self,
        state: &str,
        request: Option<&RequestContext>,
    ) -> SessionResult<Option<PendingAttempt>> {
        let state_key = state_cache_key(state);
        let attempt: Option<AuthorizationAttempt> = self.cache.get(&state_key, request).await?;

        Ok(attempt.map(|attempt| PendingAttempt { state_key, attempt }))
    }

    /// Drop the attempt for `state`.
    pub async fn end(&self, state: &str, request: Option<&RequestContext>) -> SessionResult<()> {
        let state_key = state_cache_key(state);
        self.cache.drop(&state_key, request).await?;
        debug!(state_key = %state_key, "Authorization attempt dropped");
        Ok(())
    }
}
