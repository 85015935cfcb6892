//! Extension Points
//!
//! Host-supplied hooks run at fixed points of the session lifecycle. A hook
//! returning `Some(response)` has handled the request and the response is
//! used verbatim; `None` continues the default flow.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::types::{AuthResponse, RequestContext, TokenSet};

/// Lifecycle hooks. Every method defaults to "not handled".
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Called after a successful login, before redirecting to `back_to_path`.
    async fn pre_return_path_redirect(
        &self,
        _request: &RequestContext,
        _token_set: &TokenSet,
        _back_to_path: &str,
    ) -> Option<AuthResponse> {
        None
    }

    /// Called before the session is dropped on logout.
    async fn pre_logout(&self, _request: &RequestContext) {}

    /// Called when an endpoint fails.
    async fn on_error(
        &self,
        _error: &SessionError,
        _request: Option<&RequestContext>,
    ) -> Option<AuthResponse> {
        None
    }
}

/// Hooks that never handle anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SessionHooks for NoHooks {}
