//! Outbound Request Builder
//!
//! Builds the url of this application's outbound endpoint, and the provider
//! authorization url that endpoint redirects to. The latter allocates the
//! state, nonce and PKCE pair and records them as a pending attempt.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::core::{
    generate_nonce, generate_state, local_url, AuthorizationUrlParams, ClientResolver,
    PkceGenerator, StateStore, CODE_CHALLENGE_METHOD,
};
use crate::error::SessionResult;
use crate::types::{AuthorizationAttempt, OutboundQuery, RequestContext, SessionConfig};

/// Sentinel sent for `forceLogin` when a fresh login is required.
pub const FORCE_LOGIN_SENTINEL: &str = "yes";

/// Options for [`OutboundRequestBuilder::build`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthenticationUrlOptions {
    pub policy_name: Option<String>,
    pub journey: Option<String>,
    pub force_login: bool,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub scope: Option<String>,
    /// Cross-site analytics client id, sent as `_ga`.
    pub analytics_id: Option<String>,
}

/// What the user asked for at the outbound endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderRedirectRequest {
    pub back_to_path: Option<String>,
    pub policy_name: Option<String>,
    pub journey: Option<String>,
    pub force_login: bool,
    pub analytics_id: Option<String>,
}

impl From<&OutboundQuery> for ProviderRedirectRequest {
    fn from(query: &OutboundQuery) -> Self {
        Self {
            back_to_path: query.back_to_path.clone(),
            policy_name: query.policy_name.clone(),
            journey: query.journey.clone(),
            force_login: query.force_login,
            analytics_id: query.analytics_id.clone(),
        }
    }
}

/// Caller overrides for the provider redirect. Unset values fall back to
/// configuration or are generated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderRedirectOverrides {
    pub state: Option<String>,
    /// Merged over the generated attempt record; caller keys win.
    pub state_cache_data: Map<String, Value>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub service_id: Option<String>,
    pub nonce: Option<String>,
    pub scope: Option<String>,
    pub prompt: Option<String>,
}

impl From<&OutboundQuery> for ProviderRedirectOverrides {
    fn from(query: &OutboundQuery) -> Self {
        Self {
            state: query.state.clone(),
            nonce: query.nonce.clone(),
            scope: query.scope.clone(),
            ..Default::default()
        }
    }
}

/// Treat empty strings as absent.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Outbound request builder.
pub struct OutboundRequestBuilder {
    config: Arc<SessionConfig>,
    state_store: StateStore,
    resolver: Arc<dyn ClientResolver>,
    pkce: Arc<dyn PkceGenerator>,
}

impl OutboundRequestBuilder {
    /// Create an outbound request builder.
    pub fn new(
        config: Arc<SessionConfig>,
        state_store: StateStore,
        resolver: Arc<dyn ClientResolver>,
        pkce: Arc<dyn PkceGenerator>,
    ) -> Self {
        Self {
            config,
            state_store,
            resolver,
            pkce,
        }
    }

    /// Url of the outbound endpoint for a login returning to `back_to_path`.
    ///
    /// Empty options are left out of the query; `forceLogin` only appears
    /// when set.
    pub fn build(
        &self,
        back_to_path: Option<&str>,
        options: &AuthenticationUrlOptions,
    ) -> SessionResult<Url> {
        let back_to_path = back_to_path
            .filter(|path| !path.is_empty())
            .unwrap_or(&self.config.default_back_to_path);

        let mut url = local_url(&self.config.app_domain, &self.config.outbound_path)?;
        url.set_query(None);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("backToPath", back_to_path);

            let optional = [
                ("policyName", present(&options.policy_name)),
                ("journey", present(&options.journey)),
                ("forceLogin", options.force_login.then_some(FORCE_LOGIN_SENTINEL)),
                ("state", present(&options.state)),
                ("nonce", present(&options.nonce)),
                ("scope", present(&options.scope)),
                ("_ga", present(&options.analytics_id)),
            ];
            for (name, value) in optional {
                if let Some(value) = value {
                    query.append_pair(name, value);
                }
            }
        }

        Ok(url)
    }

    /// Record a pending attempt and build the provider authorization url.
    pub async fn build_provider_redirect(
        &self,
        request: Option<&RequestContext>,
        redirect: &ProviderRedirectRequest,
        overrides: ProviderRedirectOverrides,
    ) -> SessionResult<String> {
        let config = &self.config;

        let policy_name = present(&redirect.policy_name)
            .or(present(&config.default_policy))
            .unwrap_or_default()
            .to_string();
        let journey = present(&redirect.journey)
            .or(present(&config.default_journey))
            .unwrap_or_default()
            .to_string();
        let back_to_path = redirect.back_to_path.clone().unwrap_or_default();

        let state = present(&overrides.state)
            .map(str::to_owned)
            .unwrap_or_else(generate_state);
        let nonce = present(&overrides.nonce)
            .map(str::to_owned)
            .unwrap_or_else(generate_nonce);
        let redirect_uri = match present(&overrides.redirect_uri) {
            Some(uri) => uri.to_string(),
            None => config.redirect_uri_fqdn()?,
        };
        let client_id = present(&overrides.client_id).unwrap_or(&config.client_id);
        let service_id = present(&overrides.service_id).unwrap_or(&config.service_id);
        let scope = present(&overrides.scope).unwrap_or(&config.default_scope);

        let client = self.resolver.get_client(&policy_name).await?;
        let pkce = self.pkce.generate();

        let attempt = AuthorizationAttempt {
            policy_name: policy_name.clone(),
            journey: journey.clone(),
            force_login: redirect.force_login,
            back_to_path,
            nonce: Some(nonce.clone()),
            code_challenge: pkce.code_challenge.clone(),
            code_verifier: pkce.code_verifier,
            disallowed_redirect_path: None,
            extra: Map::new(),
        }
        .merge_overrides(&overrides.state_cache_data)?;

        let state_key = self.state_store.begin(&state, &attempt, request).await?;

        let prompt = if redirect.force_login {
            Some("login".to_string())
        } else {
            present(&overrides.prompt).map(str::to_owned)
        };

        let params = AuthorizationUrlParams {
            redirect_uri,
            scope: scope.to_string(),
            state,
            prompt,
            response_type: "code".to_string(),
            response_mode: "form_post".to_string(),
            client_id: client_id.to_string(),
            code_challenge: pkce.code_challenge,
            code_challenge_method: CODE_CHALLENGE_METHOD.to_string(),
            policy_name: policy_name.clone(),
            journey,
            service_id: service_id.to_string(),
            nonce: Some(nonce),
            analytics_id: redirect.analytics_id.clone(),
        };

        let authorization_url = client.authorization_url(&params)?;
        info!(
            policy = %policy_name,
            state_key = %state_key,
            force_login = redirect.force_login,
            "Provider redirect built"
        );

        Ok(authorization_url)
    }
}
