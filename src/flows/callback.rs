//! Callback Handler
//!
//! Completes an authorization attempt when the provider posts back to the
//! return endpoint. A rejection becomes an error redirect; a validated token
//! set becomes a stored session plus a small self-submitting page (a 302
//! here can lose the cookie that was just set).

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{fully_qualified_local_path, local_url, SessionHooks, StateStore};
use crate::error::SessionResult;
use crate::flows::outbound::present;
use crate::token::SessionStore;
use crate::types::{
    normalize_token_set, AuthResponse, AuthorizationAttempt, AuthorizationRejection,
    ProviderTokenSet, RequestContext, SessionConfig, SessionCookie,
};

/// Script served at the post-authentication script path. It navigates to the
/// destination carried by the hidden `backToPath` input.
pub const POST_AUTHENTICATION_REDIRECT_SCRIPT: &str = r#"(function () {
  var input = document.getElementById('backToPath');
  if (input && input.value) {
    window.location.replace(input.value);
  }
})();
"#;

/// Script served at the post-authentication script path.
pub fn post_authentication_redirect_script() -> &'static str {
    POST_AUTHENTICATION_REDIRECT_SCRIPT
}

/// HTML page continuing to `destination` via the redirect script, with a
/// plain link for clients without scripts.
pub fn redirect_payload(destination: &str, script_path: &str) -> String {
    let destination = html_escape::encode_double_quoted_attribute(destination);
    let script_path = html_escape::encode_double_quoted_attribute(script_path);

    format!(
        concat!(
            "<input id=\"backToPath\" type=\"hidden\" value=\"{destination}\" />\n",
            "<script type=\"application/javascript\" src=\"{script}\"></script>\n",
            "<noscript>\n",
            "  <a href=\"{destination}\">Please click here to continue</a>\n",
            "</noscript>\n"
        ),
        destination = destination,
        script = script_path,
    )
}

/// Callback handler.
pub struct CallbackHandler {
    config: Arc<SessionConfig>,
    state_store: StateStore,
    sessions: SessionStore,
    hooks: Arc<dyn SessionHooks>,
}

impl CallbackHandler {
    /// Create a callback handler.
    pub fn new(
        config: Arc<SessionConfig>,
        state_store: StateStore,
        sessions: SessionStore,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            config,
            state_store,
            sessions,
            hooks,
        }
    }

    /// Redirect to the error page for a provider rejection.
    ///
    /// The target is the attempt's own error page when it names one, else
    /// the configured default. Existing query parameters on the target are
    /// kept. The pending attempt is dropped once the target is known.
    pub async fn handle_authorization_error(
        &self,
        request: Option<&RequestContext>,
        pending: Option<&AuthorizationAttempt>,
        rejection: &AuthorizationRejection,
    ) -> SessionResult<AuthResponse> {
        let error_path = pending
            .and_then(|attempt| present(&attempt.disallowed_redirect_path))
            .unwrap_or(&self.config.disallowed_redirect_path);

        let mut location = local_url(&self.config.app_domain, error_path)?;
        location
            .query_pairs_mut()
            .append_pair("errorMessage", &rejection.error_message)
            .append_pair("errorDescription", &rejection.error_description)
            .append_pair("state", &rejection.state);

        if !rejection.state.is_empty() {
            self.state_store.end(&rejection.state, request).await?;
        }

        warn!(
            error = %rejection.error_message,
            error_description = %rejection.error_description,
            "Authorization rejected by identity provider"
        );

        Ok(AuthResponse::redirect(location))
    }

    /// Store the session for a validated token set and continue to the
    /// attempt's return path.
    ///
    /// Reuses the session handle from the current cookie, or issues a new
    /// one. The `pre_return_path_redirect` hook may replace the response.
    pub async fn handle_validated_token(
        &self,
        request: &mut RequestContext,
        state: &str,
        pending: &AuthorizationAttempt,
        token_set: ProviderTokenSet,
    ) -> SessionResult<AuthResponse> {
        let back_to_path = if pending.back_to_path.is_empty() {
            self.config.default_back_to_path.clone()
        } else {
            pending.back_to_path.clone()
        };

        let token_set = normalize_token_set(token_set);

        self.state_store.end(state, Some(&*request)).await?;

        let handle = request
            .session_handle()
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = self.sessions.put(&handle, token_set, Some(&*request)).await?;
        request.set_session_cookie(SessionCookie::new(handle));

        info!(policy = %pending.policy_name, "Authentication completed");

        if let Some(response) = self
            .hooks
            .pre_return_path_redirect(&*request, &session.token_set, &back_to_path)
            .await
        {
            return Ok(response);
        }

        let destination = fully_qualified_local_path(&self.config.app_domain, &back_to_path)?;
        Ok(AuthResponse::html(redirect_payload(
            &destination,
            &self.config.post_authentication_redirect_js_path,
        )))
    }
}
