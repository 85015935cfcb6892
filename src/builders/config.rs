//! Configuration Builder
//!
//! Fluent builder for session manager configuration.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, SessionError, SessionResult};
use crate::types::{
    SessionConfig, DEFAULT_BACK_TO_PATH, DEFAULT_CACHE_COOKIE_TTL, DEFAULT_CACHE_SEGMENT,
    DEFAULT_COOKIE_NAME, DEFAULT_DISALLOWED_REDIRECT_PATH, DEFAULT_LOGOUT_PATH,
    DEFAULT_OUTBOUND_PATH, DEFAULT_POST_AUTHENTICATION_REDIRECT_JS_PATH, DEFAULT_REDIRECT_URI,
    DEFAULT_RETRY_DELAY_MULTIPLIER_SECS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_SCOPE,
};

/// Session configuration builder.
pub struct SessionConfigBuilder {
    identity_app_url: Option<String>,
    service_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    cookie_password: Option<SecretString>,
    app_domain: Option<String>,
    cookie_name: String,
    cache_segment: String,
    cache_cookie_ttl: Duration,
    pass_request_to_cache_methods: bool,
    is_secure: bool,
    outbound_path: String,
    redirect_uri: String,
    auth_redirect_uri_fqdn: Option<String>,
    logout_path: Option<String>,
    disallowed_redirect_path: String,
    post_authentication_redirect_js_path: String,
    default_back_to_path: String,
    default_policy: Option<String>,
    default_journey: Option<String>,
    default_scope: String,
    retry_delay_multiplier_secs: f64,
    retry_max_attempts: u32,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfigBuilder {
    /// Create new configuration builder with every default applied.
    pub fn new() -> Self {
        Self {
            identity_app_url: None,
            service_id: None,
            client_id: None,
            client_secret: None,
            cookie_password: None,
            app_domain: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cache_segment: DEFAULT_CACHE_SEGMENT.to_string(),
            cache_cookie_ttl: DEFAULT_CACHE_COOKIE_TTL,
            pass_request_to_cache_methods: false,
            is_secure: false,
            outbound_path: DEFAULT_OUTBOUND_PATH.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            auth_redirect_uri_fqdn: None,
            logout_path: Some(DEFAULT_LOGOUT_PATH.to_string()),
            disallowed_redirect_path: DEFAULT_DISALLOWED_REDIRECT_PATH.to_string(),
            post_authentication_redirect_js_path: DEFAULT_POST_AUTHENTICATION_REDIRECT_JS_PATH
                .to_string(),
            default_back_to_path: DEFAULT_BACK_TO_PATH.to_string(),
            default_policy: None,
            default_journey: None,
            default_scope: DEFAULT_SCOPE.to_string(),
            retry_delay_multiplier_secs: DEFAULT_RETRY_DELAY_MULTIPLIER_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
        }
    }

    /// Set identity app url.
    pub fn identity_app_url(mut self, url: impl Into<String>) -> Self {
        self.identity_app_url = Some(url.into());
        self
    }

    /// Set consuming service id.
    pub fn service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set cookie password.
    pub fn cookie_password(mut self, password: impl Into<String>) -> Self {
        self.cookie_password = Some(SecretString::new(password.into()));
        self
    }

    /// Set application root url.
    pub fn app_domain(mut self, app_domain: impl Into<String>) -> Self {
        self.app_domain = Some(app_domain.into());
        self
    }

    /// Set session cookie name.
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set in-memory cache segment.
    pub fn cache_segment(mut self, segment: impl Into<String>) -> Self {
        self.cache_segment = segment.into();
        self
    }

    /// Set cookie and default cache lifetime.
    pub fn cache_cookie_ttl(mut self, ttl: Duration) -> Self {
        self.cache_cookie_ttl = ttl;
        self
    }

    /// Pass the request context to cache calls.
    pub fn pass_request_to_cache_methods(mut self, enable: bool) -> Self {
        self.pass_request_to_cache_methods = enable;
        self
    }

    /// Only set secure cookies.
    pub fn is_secure(mut self, secure: bool) -> Self {
        self.is_secure = secure;
        self
    }

    /// Set outbound endpoint path.
    pub fn outbound_path(mut self, path: impl Into<String>) -> Self {
        self.outbound_path = path.into();
        self
    }

    /// Set return endpoint path.
    pub fn redirect_uri(mut self, path: impl Into<String>) -> Self {
        self.redirect_uri = path.into();
        self
    }

    /// Set a fully qualified return url.
    pub fn auth_redirect_uri_fqdn(mut self, url: impl Into<String>) -> Self {
        self.auth_redirect_uri_fqdn = Some(url.into());
        self
    }

    /// Set logout endpoint path.
    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = Some(path.into());
        self
    }

    /// Disable the logout endpoint.
    pub fn disable_logout_path(mut self) -> Self {
        self.logout_path = None;
        self
    }

    /// Set error page path.
    pub fn disallowed_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.disallowed_redirect_path = path.into();
        self
    }

    /// Set post-authentication script path.
    pub fn post_authentication_redirect_js_path(mut self, path: impl Into<String>) -> Self {
        self.post_authentication_redirect_js_path = path.into();
        self
    }

    /// Set default post-login path.
    pub fn default_back_to_path(mut self, path: impl Into<String>) -> Self {
        self.default_back_to_path = path.into();
        self
    }

    /// Set default provider policy.
    pub fn default_policy(mut self, policy: impl Into<String>) -> Self {
        self.default_policy = Some(policy.into());
        self
    }

    /// Set default identity app journey.
    pub fn default_journey(mut self, journey: impl Into<String>) -> Self {
        self.default_journey = Some(journey.into());
        self
    }

    /// Set default scope.
    pub fn default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scope = scope.into();
        self
    }

    /// Set retry delay multiplier (seconds).
    pub fn retry_delay_multiplier_secs(mut self, multiplier: f64) -> Self {
        self.retry_delay_multiplier_secs = multiplier;
        self
    }

    /// Set retry attempt budget.
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = attempts;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> SessionResult<SessionConfig> {
        let app_domain = required("app_domain", self.app_domain)?;
        let app_domain = Url::parse(&app_domain)
            .map_err(|e| ConfigurationError::invalid("app_domain", e.to_string()))?;

        let config = SessionConfig {
            identity_app_url: required("identity_app_url", self.identity_app_url)?,
            service_id: required("service_id", self.service_id)?,
            client_id: required("client_id", self.client_id)?,
            client_secret: required("client_secret", self.client_secret)?,
            cookie_password: required("cookie_password", self.cookie_password)?,
            app_domain,
            cookie_name: self.cookie_name,
            cache_segment: self.cache_segment,
            cache_cookie_ttl: self.cache_cookie_ttl,
            pass_request_to_cache_methods: self.pass_request_to_cache_methods,
            is_secure: self.is_secure,
            outbound_path: self.outbound_path,
            redirect_uri: self.redirect_uri,
            auth_redirect_uri_fqdn: self.auth_redirect_uri_fqdn,
            logout_path: self.logout_path,
            disallowed_redirect_path: self.disallowed_redirect_path,
            post_authentication_redirect_js_path: self.post_authentication_redirect_js_path,
            default_back_to_path: self.default_back_to_path,
            default_policy: self.default_policy,
            default_journey: self.default_journey,
            default_scope: self.default_scope,
            retry_delay_multiplier_secs: self.retry_delay_multiplier_secs,
            retry_max_attempts: self.retry_max_attempts,
        };

        config.validate()?;
        Ok(config)
    }
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, SessionError> {
    value.ok_or_else(|| {
        ConfigurationError::MissingField {
            field: field.to_string(),
        }
        .into()
    })
}

/// Create a new session configuration builder.
pub fn session_config() -> SessionConfigBuilder {
    SessionConfigBuilder::new()
}
