//! Credential Accessor
//!
//! Read path used by the rest of the application: look up the current
//! session, its claims, refresh it against the provider, end it.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::ClientResolver;
use crate::error::{SessionError, SessionResult};
use crate::resilience::RetryPolicy;
use crate::token::SessionStore;
use crate::types::{normalize_token_set, Claims, RequestContext, Session};

/// Session lookups and refresh for the current request.
pub struct CredentialAccessor {
    sessions: SessionStore,
    resolver: Arc<dyn ClientResolver>,
    retry: RetryPolicy,
    default_policy: Option<String>,
}

impl CredentialAccessor {
    /// Create a credential accessor.
    pub fn new(
        sessions: SessionStore,
        resolver: Arc<dyn ClientResolver>,
        retry: RetryPolicy,
        default_policy: Option<String>,
    ) -> Self {
        Self {
            sessions,
            resolver,
            retry,
            default_policy,
        }
    }

    /// Retry policy wrapping provider refresh calls.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Session for this request. No cookie or no record is `None`, not an error.
    pub async fn get_credentials(&self, request: &RequestContext) -> SessionResult<Option<Session>> {
        match request.session_handle() {
            Some(handle) => self.sessions.get(handle, Some(request)).await,
            None => Ok(None),
        }
    }

    /// Claims of this request's session.
    pub async fn get_claims(&self, request: &RequestContext) -> SessionResult<Option<Claims>> {
        Ok(self
            .get_credentials(request)
            .await?
            .and_then(|session| session.claims))
    }

    /// Refresh this request's session with the provider and replace the
    /// stored record.
    ///
    /// The contact id written into the refreshed claims is the override,
    /// else the refreshed claim, else the previous claim. A refreshed token
    /// set without claims gets claims holding only that contact id.
    pub async fn refresh(
        &self,
        request: &RequestContext,
        contact_id_override: Option<&str>,
    ) -> SessionResult<Session> {
        let handle = request.session_handle().ok_or(SessionError::SessionAbsent)?;
        let existing = self
            .sessions
            .get(handle, Some(request))
            .await?
            .ok_or(SessionError::SessionAbsent)?;

        let refresh_token = existing
            .refresh_token()
            .map(str::to_owned)
            .ok_or(SessionError::MissingRefreshToken)?;

        let policy_name = existing
            .policy_name()
            .map(str::to_owned)
            .or_else(|| self.default_policy.clone())
            .unwrap_or_default();

        let client = self.resolver.get_client(&policy_name).await?;
        debug!(policy = %policy_name, "Refreshing session tokens");

        let refreshed = self
            .retry
            .execute(|| client.refresh(&refresh_token))
            .await
            .map_err(|e| {
                warn!(policy = %policy_name, error = %e, "Token refresh failed");
                SessionError::ProviderRefresh(e)
            })?;

        let mut token_set = normalize_token_set(refreshed);

        let prior_contact_id = existing.claims.and_then(|claims| claims.contact_id);
        let refreshed_contact_id = token_set
            .claims
            .as_mut()
            .and_then(|claims| claims.contact_id.take());
        let contact_id = contact_id_override
            .map(str::to_owned)
            .or(refreshed_contact_id)
            .or(prior_contact_id);

        match token_set.claims.as_mut() {
            Some(claims) => claims.contact_id = contact_id,
            None if contact_id.is_some() => {
                token_set.claims = Some(Claims {
                    contact_id,
                    ..Default::default()
                });
            }
            None => {}
        }

        let session = self.sessions.put(handle, token_set, Some(request)).await?;
        info!(policy = %policy_name, "Session refreshed");
        Ok(session)
    }

    /// Drop this request's session record and clear the cookie.
    pub async fn logout(&self, request: &mut RequestContext) -> SessionResult<()> {
        if let Some(handle) = request.session_handle().map(str::to_owned) {
            self.sessions.drop(&handle, Some(&*request)).await?;
        }
        request.clear_session_cookie();
        info!("Session ended");
        Ok(())
    }
}
