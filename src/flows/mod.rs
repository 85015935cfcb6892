//! Authentication Flows
//!
//! The two halves of an OIDC login round trip:
//!
//! - **Outbound**: build the outbound endpoint url, then the provider
//!   authorization url with state, nonce and PKCE recorded as a pending attempt
//! - **Callback**: turn the provider's response into an error redirect or a
//!   stored session

pub mod callback;
pub mod outbound;

pub use callback::{
    post_authentication_redirect_script, redirect_payload, CallbackHandler,
    POST_AUTHENTICATION_REDIRECT_SCRIPT,
};
pub use outbound::{
    AuthenticationUrlOptions, OutboundRequestBuilder, ProviderRedirectOverrides,
    ProviderRedirectRequest, FORCE_LOGIN_SENTINEL,
};
