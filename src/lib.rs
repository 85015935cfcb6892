//! OIDC Session Module
//!
//! OpenID Connect session and token lifecycle management for web applications
//! that sit behind an external identity provider.
//!
//! # Features
//!
//! - Authorization Code Flow with PKCE (RFC 7636, S256) and nonce
//! - Short-lived authorization state in a pluggable cache
//! - Session records keyed by an opaque cookie handle
//! - Token refresh with linear back-off retry
//! - Open-redirect safe return paths
//! - Host hooks for post-login redirects, logout and error pages
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oidc_session::{
//!     identity_service, session_config, CallbackParams, OutboundQuery, RequestContext,
//!     StaticClientResolver,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = session_config()
//!         .identity_app_url("https://identity.example")
//!         .service_id("0f8fad5b-d9cb-469f-a165-70867728950e")
//!         .client_id("7c9e6679-7425-40de-944b-e07fc1f90ae7")
//!         .client_secret("client-secret")
//!         .cookie_password("a-password-of-at-least-32-characters")
//!         .app_domain("https://app.example")
//!         .default_policy("b2c_1a_signin")
//!         .build()?;
//!
//!     // The host supplies a provider client for each policy.
//!     let resolver = StaticClientResolver::new().with_fallback(my_oidc_client());
//!     let service = identity_service(config, Arc::new(resolver))?;
//!
//!     // GET /login/out?backToPath=/account
//!     let request = RequestContext::new();
//!     let response = service
//!         .handle_outbound(&request, &OutboundQuery::from_url(&incoming_url))
//!         .await?;
//!
//!     // POST /login/return
//!     let mut request = RequestContext::new();
//!     let response = service
//!         .handle_return(&mut request, &CallbackParams::from_form(&body))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, attempts, token sets, requests and responses
//! - `error`: error hierarchy with browser-safe messages
//! - `core`: cache seam, state store, PKCE, provider seams, hooks, path checks
//! - `flows`: outbound and callback halves of the login round trip
//! - `token`: session storage, credential access and refresh
//! - `resilience`: retry with linear back-off
//! - `builders`: fluent builder for configuration
//! - `client`: identity service combining all functionality

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod resilience;
pub mod token;
pub mod types;

// Re-export main service
pub use client::{identity_service, IdentityService};

// Re-export builders
pub use builders::{session_config, SessionConfigBuilder};

// Re-export errors
pub use error::{
    get_user_message, BackendError, ConfigurationError, ProviderError, SessionError,
    SessionResult,
};

// Re-export types
pub use types::{
    // Config
    CookieOptions, SessionConfig,
    // Attempt
    AuthorizationAttempt, PendingAttempt,
    // Token
    normalize_token_set, Claims, ClaimsSource, ProviderTokenSet, Session, TokenSet,
    // Callback
    AuthorizationRejection, CallbackChecks, CallbackParams, OutboundQuery,
    // Request / Response
    AuthResponse, CookieUpdate, RequestContext, SessionCookie,
};

// Re-export core components
pub use self::core::{
    // Cache
    create_cache, create_mock_cache, CacheAdapter, CacheBackend, CacheCall, InMemoryCache,
    MockCacheBackend,
    // State
    generate_nonce, generate_state, state_cache_key, StateStore,
    // PKCE
    create_mock_pkce_generator, create_pkce_generator, DefaultPkceGenerator, MockPkceGenerator,
    PkceGenerator, PkcePair,
    // Provider
    create_mock_oidc_client, AuthorizationUrlParams, ClientResolver, MockClientResolver,
    MockOidcClient, OidcClient, StaticClientResolver,
    // Hooks
    NoHooks, SessionHooks,
    // Paths
    fully_qualified_local_path, local_url,
};

// Re-export flows
pub use flows::{
    // Outbound
    AuthenticationUrlOptions, OutboundRequestBuilder, ProviderRedirectOverrides,
    ProviderRedirectRequest, FORCE_LOGIN_SENTINEL,
    // Callback
    post_authentication_redirect_script, redirect_payload, CallbackHandler,
};

// Re-export token management
pub use token::{CredentialAccessor, SessionStore};

// Re-export resilience
pub use resilience::{RetryConfig, RetryPolicy, RetryStats, DEFAULT_RETRY_CONFIG};
