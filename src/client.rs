//! Identity Service
//!
//! Service object combining the stores, flows and hooks. Built once at
//! startup and shared by reference with the host's request handlers.

use std::sync::Arc;
use tracing::{debug, error};
use url::Url;

use crate::core::{
    local_url, state_cache_key, CacheAdapter, CacheBackend, ClientResolver, DefaultPkceGenerator,
    InMemoryCache, NoHooks, PkceGenerator, SessionHooks, StateStore,
};
use crate::error::{get_user_message, ProviderError, SessionError, SessionResult};
use crate::flows::{
    post_authentication_redirect_script, AuthenticationUrlOptions, CallbackHandler,
    OutboundRequestBuilder, ProviderRedirectOverrides, ProviderRedirectRequest,
};
use crate::resilience::RetryPolicy;
use crate::token::{CredentialAccessor, SessionStore};
use crate::types::{
    AuthResponse, AuthorizationRejection, CallbackChecks, CallbackParams, Claims, CookieOptions,
    OutboundQuery, RequestContext, Session, SessionConfig,
};

/// Session lifecycle service.
pub struct IdentityService {
    config: Arc<SessionConfig>,
    cache: CacheAdapter,
    state_store: StateStore,
    session_store: SessionStore,
    resolver: Arc<dyn ClientResolver>,
    hooks: Arc<dyn SessionHooks>,
    outbound: OutboundRequestBuilder,
    callback: CallbackHandler,
    credentials: CredentialAccessor,
}

impl IdentityService {
    /// Create a service with the in-memory cache, no hooks and the default
    /// PKCE generator.
    pub fn new(config: SessionConfig, resolver: Arc<dyn ClientResolver>) -> SessionResult<Self> {
        let cache = Arc::new(InMemoryCache::new(
            config.cache_segment.clone(),
            Some(config.cache_cookie_ttl),
        ));
        Self::with_components(
            config,
            cache,
            resolver,
            Arc::new(NoHooks),
            Arc::new(DefaultPkceGenerator::new()),
        )
    }

    /// Create a service with custom components.
    pub fn with_components(
        config: SessionConfig,
        cache: Arc<dyn CacheBackend>,
        resolver: Arc<dyn ClientResolver>,
        hooks: Arc<dyn SessionHooks>,
        pkce: Arc<dyn PkceGenerator>,
    ) -> SessionResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let cache = CacheAdapter::new(cache, config.pass_request_to_cache_methods);
        let state_store = StateStore::new(cache.clone());
        let session_store = SessionStore::new(cache.clone());

        let outbound = OutboundRequestBuilder::new(
            config.clone(),
            state_store.clone(),
            resolver.clone(),
            pkce,
        );
        let callback = CallbackHandler::new(
            config.clone(),
            state_store.clone(),
            session_store.clone(),
            hooks.clone(),
        );
        let credentials = CredentialAccessor::new(
            session_store.clone(),
            resolver.clone(),
            RetryPolicy::new(config.retry_config()),
            config.default_policy.clone(),
        );

        debug!(
            outbound_path = %config.outbound_path,
            redirect_uri = %config.redirect_uri,
            "Identity service ready"
        );

        Ok(Self {
            config,
            cache,
            state_store,
            session_store,
            resolver,
            hooks,
            outbound,
            callback,
            credentials,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the cache adapter.
    pub fn cache(&self) -> &CacheAdapter {
        &self.cache
    }

    /// Get the state store.
    pub fn state_store(&self) -> &StateStore {
        &self.state_store
    }

    /// Get the session store.
    pub fn session_store(&self) -> &SessionStore {
        &self.session_store
    }

    /// Get the credential accessor.
    pub fn credentials(&self) -> &CredentialAccessor {
        &self.credentials
    }

    // ========== Credentials ==========

    /// Session for this request, if any.
    pub async fn get_credentials(&self, request: &RequestContext) -> SessionResult<Option<Session>> {
        self.credentials.get_credentials(request).await
    }

    /// Claims of this request's session, if any.
    pub async fn get_claims(&self, request: &RequestContext) -> SessionResult<Option<Claims>> {
        self.credentials.get_claims(request).await
    }

    /// Refresh this request's session with the provider.
    pub async fn refresh_token(
        &self,
        request: &RequestContext,
        contact_id: Option<&str>,
    ) -> SessionResult<Session> {
        self.credentials.refresh(request, contact_id).await
    }

    /// End this request's session.
    pub async fn logout(&self, request: &mut RequestContext) -> SessionResult<()> {
        self.hooks.pre_logout(request).await;
        self.credentials.logout(request).await
    }

    // ========== Outbound ==========

    /// Url of the outbound endpoint for a login returning to `back_to_path`.
    pub fn generate_authentication_url(
        &self,
        back_to_path: Option<&str>,
        options: &AuthenticationUrlOptions,
    ) -> SessionResult<Url> {
        self.outbound.build(back_to_path, options)
    }

    /// Record a pending attempt and build the provider authorization url.
    pub async fn generate_outbound_redirect_url(
        &self,
        request: Option<&RequestContext>,
        redirect: &ProviderRedirectRequest,
        overrides: ProviderRedirectOverrides,
    ) -> SessionResult<String> {
        self.outbound
            .build_provider_redirect(request, redirect, overrides)
            .await
    }

    /// Serve the outbound endpoint: redirect to the provider.
    pub async fn handle_outbound(
        &self,
        request: &RequestContext,
        query: &OutboundQuery,
    ) -> SessionResult<AuthResponse> {
        let location = self
            .generate_outbound_redirect_url(Some(request), &query.into(), query.into())
            .await?;
        Ok(AuthResponse::redirect(location))
    }

    // ========== Return ==========

    /// Serve the return endpoint.
    ///
    /// The pending attempt for the posted `state` must exist; a second
    /// delivery of the same callback fails with `StateNotFound`. A provider
    /// error whose attempt has expired still goes to the error redirect.
    pub async fn handle_return(
        &self,
        request: &mut RequestContext,
        params: &CallbackParams,
    ) -> SessionResult<AuthResponse> {
        let state = params.state.as_deref().unwrap_or_default();
        let pending = match self.state_store.consume(state, Some(&*request)).await? {
            Some(pending) => pending,
            None => {
                if let Some(rejection) = params.rejection() {
                    return self
                        .callback
                        .handle_authorization_error(Some(&*request), None, &rejection)
                        .await;
                }
                return Err(SessionError::StateNotFound {
                    state_key: state_cache_key(state),
                });
            }
        };

        if let Some(rejection) = params.rejection() {
            return self
                .callback
                .handle_authorization_error(Some(&*request), Some(&pending.attempt), &rejection)
                .await;
        }

        let client = self.resolver.get_client(&pending.attempt.policy_name).await?;
        let redirect_uri = self.config.redirect_uri_fqdn()?;
        let checks = CallbackChecks {
            state: state.to_string(),
            nonce: pending.attempt.nonce.clone(),
            code_verifier: pending.attempt.code_verifier.clone(),
            response_type: "code".to_string(),
        };

        match client.callback(&redirect_uri, params, &checks).await {
            Ok(token_set) => {
                self.callback
                    .handle_validated_token(request, state, &pending.attempt, token_set)
                    .await
            }
            Err(ProviderError::Rejected {
                error,
                error_description,
            }) => {
                let rejection = AuthorizationRejection {
                    error_message: error,
                    error_description: error_description.unwrap_or_default(),
                    state: state.to_string(),
                };
                self.callback
                    .handle_authorization_error(Some(&*request), Some(&pending.attempt), &rejection)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========== Host Support ==========

    /// Response for a failed endpoint call.
    ///
    /// The `on_error` hook decides first; otherwise the user is sent to the
    /// error page with the error code and a browser-safe message.
    pub async fn error_response(
        &self,
        failure: &SessionError,
        request: Option<&RequestContext>,
    ) -> AuthResponse {
        error!(code = failure.error_code(), error = %failure, "Identity endpoint failed");

        if let Some(response) = self.hooks.on_error(failure, request).await {
            return response;
        }

        match local_url(&self.config.app_domain, &self.config.disallowed_redirect_path) {
            Ok(mut location) => {
                location
                    .query_pairs_mut()
                    .append_pair("errorMessage", failure.error_code())
                    .append_pair("errorDescription", get_user_message(failure));
                AuthResponse::redirect(location)
            }
            Err(_) => AuthResponse::redirect(self.config.disallowed_redirect_path.clone()),
        }
    }

    /// Script to serve at the post-authentication script path.
    pub fn post_authentication_redirect_script(&self) -> &'static str {
        post_authentication_redirect_script()
    }

    /// Attributes for the session cookie.
    pub fn cookie_options(&self) -> CookieOptions {
        self.config.cookie_options()
    }
}

/// Create an identity service with default components.
pub fn identity_service(
    config: SessionConfig,
    resolver: Arc<dyn ClientResolver>,
) -> SessionResult<IdentityService> {
    IdentityService::new(config, resolver)
}
