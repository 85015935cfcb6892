//! Identity Provider Capability
//!
//! The OIDC client library is an external collaborator: it builds provider
//! authorization urls, exchanges codes and refreshes tokens. This module
//! defines the seams it plugs into, a policy-keyed resolver, and mocks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use url::Url;

use crate::error::{ProviderError, SessionError, SessionResult};
use crate::types::{CallbackChecks, CallbackParams, ProviderTokenSet};

/// Parameters for the provider authorization url.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationUrlParams {
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub prompt: Option<String>,
    pub response_type: String,
    pub response_mode: String,
    pub client_id: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub policy_name: String,
    pub journey: String,
    pub service_id: String,
    pub nonce: Option<String>,
    /// Cross-site analytics client id, sent as `_ga`.
    pub analytics_id: Option<String>,
}

impl AuthorizationUrlParams {
    /// Query parameters in wire form. Empty and absent values are left out.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let pairs = [
            ("redirect_uri", Some(&self.redirect_uri)),
            ("scope", Some(&self.scope)),
            ("state", Some(&self.state)),
            ("prompt", self.prompt.as_ref()),
            ("response_type", Some(&self.response_type)),
            ("response_mode", Some(&self.response_mode)),
            ("client_id", Some(&self.client_id)),
            ("code_challenge", Some(&self.code_challenge)),
            ("code_challenge_method", Some(&self.code_challenge_method)),
            ("policyName", Some(&self.policy_name)),
            ("journey", Some(&self.journey)),
            ("serviceId", Some(&self.service_id)),
            ("nonce", self.nonce.as_ref()),
            ("_ga", self.analytics_id.as_ref()),
        ];

        pairs
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .filter(|value| !value.is_empty())
                    .map(|value| (name, value.clone()))
            })
            .collect()
    }
}

/// A configured OIDC client for one provider policy.
#[async_trait]
pub trait OidcClient: Send + Sync {
    /// Build the provider authorization url.
    fn authorization_url(&self, params: &AuthorizationUrlParams) -> Result<String, ProviderError>;

    /// Exchange the callback parameters for a token set, verifying them
    /// against `checks`.
    async fn callback(
        &self,
        redirect_uri: &str,
        params: &CallbackParams,
        checks: &CallbackChecks,
    ) -> Result<ProviderTokenSet, ProviderError>;

    /// Exchange a refresh token for a new token set.
    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokenSet, ProviderError>;
}

/// Looks up the OIDC client for a provider policy.
#[async_trait]
pub trait ClientResolver: Send + Sync {
    /// Get the client for `policy_name`.
    async fn get_client(&self, policy_name: &str) -> SessionResult<Arc<dyn OidcClient>>;
}

/// Resolver over a fixed set of clients. Policy names match
/// case-insensitively.
#[derive(Default)]
pub struct StaticClientResolver {
    clients: HashMap<String, Arc<dyn OidcClient>>,
    fallback: Option<Arc<dyn OidcClient>>,
}

impl StaticClientResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for a policy.
    pub fn with_client(mut self, policy_name: &str, client: Arc<dyn OidcClient>) -> Self {
        self.clients.insert(policy_name.to_lowercase(), client);
        self
    }

    /// Client used for policies with no registration.
    pub fn with_fallback(mut self, client: Arc<dyn OidcClient>) -> Self {
        self.fallback = Some(client);
        self
    }
}

#[async_trait]
impl ClientResolver for StaticClientResolver {
    async fn get_client(&self, policy_name: &str) -> SessionResult<Arc<dyn OidcClient>> {
        self.clients
            .get(&policy_name.to_lowercase())
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| SessionError::ProviderResolution {
                policy_name: policy_name.to_string(),
            })
    }
}

/// Mock OIDC client for testing.
pub struct MockOidcClient {
    authorization_endpoint: String,
    callback_results: Mutex<VecDeque<Result<ProviderTokenSet, ProviderError>>>,
    refresh_results: Mutex<VecDeque<Result<ProviderTokenSet, ProviderError>>>,
    default_token_set: Mutex<Option<ProviderTokenSet>>,
    authorization_history: Mutex<Vec<AuthorizationUrlParams>>,
    callback_history: Mutex<Vec<(String, CallbackParams, CallbackChecks)>>,
    refresh_history: Mutex<Vec<String>>,
}

impl MockOidcClient {
    /// Create new mock client whose authorization urls point at `authorization_endpoint`.
    pub fn new(authorization_endpoint: impl Into<String>) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.into(),
            callback_results: Mutex::new(VecDeque::new()),
            refresh_results: Mutex::new(VecDeque::new()),
            default_token_set: Mutex::new(None),
            authorization_history: Mutex::new(Vec::new()),
            callback_history: Mutex::new(Vec::new()),
            refresh_history: Mutex::new(Vec::new()),
        }
    }

    /// Token set returned when no result is queued.
    pub fn set_default_token_set(&self, token_set: ProviderTokenSet) -> &Self {
        *self.default_token_set.lock() = Some(token_set);
        self
    }

    /// Queue a code-exchange result.
    pub fn queue_callback_result(&self, result: Result<ProviderTokenSet, ProviderError>) -> &Self {
        self.callback_results.lock().push_back(result);
        self
    }

    /// Queue a refresh result.
    pub fn queue_refresh_result(&self, result: Result<ProviderTokenSet, ProviderError>) -> &Self {
        self.refresh_results.lock().push_back(result);
        self
    }

    /// Get authorization url history.
    pub fn get_authorization_history(&self) -> Vec<AuthorizationUrlParams> {
        self.authorization_history.lock().clone()
    }

    /// Get code-exchange history.
    pub fn get_callback_history(&self) -> Vec<(String, CallbackParams, CallbackChecks)> {
        self.callback_history.lock().clone()
    }

    /// Get refresh history (refresh tokens presented).
    pub fn get_refresh_history(&self) -> Vec<String> {
        self.refresh_history.lock().clone()
    }

    fn next_result(
        &self,
        queue: &Mutex<VecDeque<Result<ProviderTokenSet, ProviderError>>>,
    ) -> Result<ProviderTokenSet, ProviderError> {
        if let Some(result) = queue.lock().pop_front() {
            return result;
        }
        self.default_token_set
            .lock()
            .clone()
            .ok_or_else(|| ProviderError::Other {
                message: "no mock response queued".to_string(),
            })
    }
}

#[async_trait]
impl OidcClient for MockOidcClient {
    fn authorization_url(&self, params: &AuthorizationUrlParams) -> Result<String, ProviderError> {
        self.authorization_history.lock().push(params.clone());

        let mut url = Url::parse(&self.authorization_endpoint).map_err(|e| ProviderError::Other {
            message: format!("invalid authorization endpoint: {}", e),
        })?;
        url.query_pairs_mut().extend_pairs(params.to_query_pairs());
        Ok(url.to_string())
    }

    async fn callback(
        &self,
        redirect_uri: &str,
        params: &CallbackParams,
        checks: &CallbackChecks,
    ) -> Result<ProviderTokenSet, ProviderError> {
        self.callback_history
            .lock()
            .push((redirect_uri.to_string(), params.clone(), checks.clone()));
        self.next_result(&self.callback_results)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokenSet, ProviderError> {
        self.refresh_history.lock().push(refresh_token.to_string());
        self.next_result(&self.refresh_results)
    }
}

/// Mock resolver handing out one client for every policy.
pub struct MockClientResolver {
    client: Arc<dyn OidcClient>,
    requested_policies: Mutex<Vec<String>>,
    unknown_policies: Mutex<Vec<String>>,
}

impl MockClientResolver {
    /// Create a resolver returning `client`.
    pub fn new(client: Arc<dyn OidcClient>) -> Self {
        Self {
            client,
            requested_policies: Mutex::new(Vec::new()),
            unknown_policies: Mutex::new(Vec::new()),
        }
    }

    /// Make lookups of `policy_name` fail.
    pub fn reject_policy(&self, policy_name: impl Into<String>) -> &Self {
        self.unknown_policies.lock().push(policy_name.into());
        self
    }

    /// Policies looked up so far.
    pub fn get_requested_policies(&self) -> Vec<String> {
        self.requested_policies.lock().clone()
    }
}

#[async_trait]
impl ClientResolver for MockClientResolver {
    async fn get_client(&self, policy_name: &str) -> SessionResult<Arc<dyn OidcClient>> {
        self.requested_policies.lock().push(policy_name.to_string());

        if self.unknown_policies.lock().iter().any(|p| p == policy_name) {
            return Err(SessionError::ProviderResolution {
                policy_name: policy_name.to_string(),
            });
        }
        Ok(self.client.clone())
    }
}

/// Create mock OIDC client for testing.
pub fn create_mock_oidc_client() -> MockOidcClient {
    MockOidcClient::new("https://login.example/oauth2/v2.0/authorize")
}
