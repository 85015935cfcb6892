//! Session Storage
//!
//! Authenticated-session records, keyed by the opaque handle carried in the
//! session cookie. The store never generates handles and never looks a
//! session up by anything else.

use tracing::debug;

use crate::core::CacheAdapter;
use crate::error::SessionResult;
use crate::types::{RequestContext, Session, TokenSet};

/// Store of authenticated sessions.
#[derive(Clone)]
pub struct SessionStore {
    cache: CacheAdapter,
}

impl SessionStore {
    /// Create a session store over a cache adapter.
    pub fn new(cache: CacheAdapter) -> Self {
        Self { cache }
    }

    /// Persist a token set under `handle`, replacing any previous record.
    ///
    /// Accepts anything convertible to a [`TokenSet`], so provider token
    /// sets are normalized on the way in.
    pub async fn put(
        &self,
        handle: &str,
        token_set: impl Into<TokenSet>,
        request: Option<&RequestContext>,
    ) -> SessionResult<Session> {
        let session = Session::new(token_set.into());
        self.cache.set(handle, &session, None, request).await?;
        debug!(has_claims = session.claims.is_some(), "Session stored");
        Ok(session)
    }

    /// Load the session stored under `handle`.
    pub async fn get(
        &self,
        handle: &str,
        request: Option<&RequestContext>,
    ) -> SessionResult<Option<Session>> {
        Ok(self.cache.get(handle, request).await?)
    }

    /// Drop the session stored under `handle`.
    pub async fn drop(&self, handle: &str, request: Option<&RequestContext>) -> SessionResult<()> {
        self.cache.drop(handle, request).await?;
        debug!("Session dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InMemoryCache, MockCacheBackend};
    use crate::types::{Claims, ClaimsSource, ProviderTokenSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn store() -> SessionStore {
        SessionStore::new(CacheAdapter::new(Arc::new(InMemoryCache::new("idm", None)), false))
    }

    #[tokio::test]
    async fn test_deferred_claims_materialized_once_on_write() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = ProviderTokenSet {
            access_token: Some("at".to_string()),
            claims: ClaimsSource::deferred(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(Claims {
                    sub: Some("user-1".to_string()),
                    exp: Some(4_102_444_800),
                    ..Default::default()
                })
            }),
            ..Default::default()
        };

        let store = store();
        store.put("handle-1", provider, None).await.unwrap();
        let session = store.get("handle-1", None).await.unwrap().unwrap();
        let again = store.get("handle-1", None).await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.claims.as_ref().and_then(|c| c.sub.as_deref()), Some("user-1"));
        assert_eq!(session.token_set.claims, session.claims);
        assert_eq!(session, again);
    }

    #[tokio::test]
    async fn test_put_replaces_whole_record() {
        let store = store();
        let first = ProviderTokenSet {
            refresh_token: Some("rt-1".to_string()),
            claims: Claims {
                contact_id: Some("c-1".to_string()),
                ..Default::default()
            }
            .into(),
            ..Default::default()
        };
        let second = ProviderTokenSet {
            access_token: Some("at-2".to_string()),
            ..Default::default()
        };

        store.put("h", first, None).await.unwrap();
        store.put("h", second, None).await.unwrap();

        let session = store.get("h", None).await.unwrap().unwrap();
        assert_eq!(session.refresh_token(), None);
        assert_eq!(session.claims, None);
    }

    #[tokio::test]
    async fn test_get_missing_and_drop() {
        let store = store();
        assert!(store.get("missing", None).await.unwrap().is_none());

        store.put("h", ProviderTokenSet::default(), None).await.unwrap();
        store.drop("h", None).await.unwrap();
        assert!(store.get("h", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_shape() {
        let mock = Arc::new(MockCacheBackend::new());
        let store = SessionStore::new(CacheAdapter::new(mock.clone(), false));
        store
            .put(
                "h",
                ProviderTokenSet {
                    id_token: Some("id".to_string()),
                    claims: Claims {
                        tfp: Some("policyA".to_string()),
                        ..Default::default()
                    }
                    .into(),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let raw = mock.peek("h").unwrap();
        assert_eq!(raw["tokenSet"]["id_token"], "id");
        assert_eq!(raw["claims"]["tfp"], "policyA");
    }
}
