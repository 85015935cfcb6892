//! Configuration Types
//!
//! Session manager configuration and its defaults.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::core::fully_qualified_local_path;
use crate::error::{ConfigurationError, SessionResult};
use crate::resilience::RetryConfig;
use crate::types::CookieOptions;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "idm";
/// Default cache segment.
pub const DEFAULT_CACHE_SEGMENT: &str = "idm";
/// Default session cookie and in-memory cache lifetime.
pub const DEFAULT_CACHE_COOKIE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_OUTBOUND_PATH: &str = "/login/out";
pub const DEFAULT_REDIRECT_URI: &str = "/login/return";
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";
pub const DEFAULT_DISALLOWED_REDIRECT_PATH: &str = "/error";
pub const DEFAULT_POST_AUTHENTICATION_REDIRECT_JS_PATH: &str = "/postAuthRedirect";
pub const DEFAULT_BACK_TO_PATH: &str = "/";
pub const DEFAULT_SCOPE: &str = "offline_access openid";
pub const DEFAULT_RETRY_DELAY_MULTIPLIER_SECS: f64 = 1.5;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Minimum cookie password length.
pub const MIN_COOKIE_PASSWORD_LEN: usize = 32;
/// Largest accepted retry delay multiplier, one hour.
pub const MAX_RETRY_DELAY_MULTIPLIER_SECS: f64 = 3600.0;

/// Session manager configuration.
///
/// Read-only once the service is built.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Url of the identity app.
    pub identity_app_url: String,
    /// Id of the consuming service (GUID).
    pub service_id: String,
    /// Client id registered with the provider (GUID).
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Password used to seal the session cookie.
    pub cookie_password: SecretString,
    /// Root url the application is served from.
    pub app_domain: Url,

    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Segment name for the default in-memory cache.
    #[serde(default = "default_cache_segment")]
    pub cache_segment: String,
    /// Cookie and default cache lifetime.
    #[serde(default = "default_cache_cookie_ttl", with = "duration_ms")]
    pub cache_cookie_ttl: Duration,
    /// Pass the request context to every cache call.
    #[serde(default)]
    pub pass_request_to_cache_methods: bool,
    /// Only set secure cookies.
    #[serde(default)]
    pub is_secure: bool,
    /// Path of the outbound endpoint.
    #[serde(default = "default_outbound_path")]
    pub outbound_path: String,
    /// Path of the return endpoint.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Fully qualified return url, when it differs from `app_domain` + `redirect_uri`.
    #[serde(default)]
    pub auth_redirect_uri_fqdn: Option<String>,
    /// Path of the logout endpoint; `None` disables it.
    #[serde(default = "default_logout_path")]
    pub logout_path: Option<String>,
    /// Where to send users whose sign-in failed.
    #[serde(default = "default_disallowed_redirect_path")]
    pub disallowed_redirect_path: String,
    /// Where the post-authentication redirect script is served from.
    #[serde(default = "default_post_authentication_redirect_js_path")]
    pub post_authentication_redirect_js_path: String,
    /// Where to send users after login when no path was given.
    #[serde(default = "default_back_to_path")]
    pub default_back_to_path: String,
    /// Provider policy used when none is requested.
    #[serde(default)]
    pub default_policy: Option<String>,
    /// Identity app journey used when none is requested.
    #[serde(default)]
    pub default_journey: Option<String>,
    /// Scope requested when none is given.
    #[serde(default = "default_scope")]
    pub default_scope: String,
    /// Delay before attempt n (n >= 2) is this many seconds times n - 1.
    #[serde(default = "default_retry_delay_multiplier_secs")]
    pub retry_delay_multiplier_secs: f64,
    /// Attempts made at a provider call before giving up.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_cache_segment() -> String {
    DEFAULT_CACHE_SEGMENT.to_string()
}

fn default_cache_cookie_ttl() -> Duration {
    DEFAULT_CACHE_COOKIE_TTL
}

fn default_outbound_path() -> String {
    DEFAULT_OUTBOUND_PATH.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_logout_path() -> Option<String> {
    Some(DEFAULT_LOGOUT_PATH.to_string())
}

fn default_disallowed_redirect_path() -> String {
    DEFAULT_DISALLOWED_REDIRECT_PATH.to_string()
}

fn default_post_authentication_redirect_js_path() -> String {
    DEFAULT_POST_AUTHENTICATION_REDIRECT_JS_PATH.to_string()
}

fn default_back_to_path() -> String {
    DEFAULT_BACK_TO_PATH.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_retry_delay_multiplier_secs() -> f64 {
    DEFAULT_RETRY_DELAY_MULTIPLIER_SECS
}

fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl SessionConfig {
    /// Check the configuration against the required shape.
    pub fn validate(&self) -> SessionResult<()> {
        require_non_empty("identity_app_url", &self.identity_app_url)?;
        require_guid("service_id", &self.service_id)?;
        require_guid("client_id", &self.client_id)?;
        require_non_empty("client_secret", self.client_secret.expose_secret())?;
        require_non_empty("cookie_name", &self.cookie_name)?;
        require_non_empty("outbound_path", &self.outbound_path)?;
        require_non_empty("redirect_uri", &self.redirect_uri)?;
        require_non_empty("disallowed_redirect_path", &self.disallowed_redirect_path)?;
        require_non_empty("default_back_to_path", &self.default_back_to_path)?;
        require_non_empty("default_scope", &self.default_scope)?;

        if self.cookie_password.expose_secret().len() < MIN_COOKIE_PASSWORD_LEN {
            return Err(ConfigurationError::invalid(
                "cookie_password",
                format!("must be at least {} characters", MIN_COOKIE_PASSWORD_LEN),
            )
            .into());
        }

        if !matches!(self.app_domain.scheme(), "http" | "https")
            || self.app_domain.host_str().is_none()
        {
            return Err(
                ConfigurationError::invalid("app_domain", "must be an absolute http(s) url").into(),
            );
        }

        if !(0.0..=MAX_RETRY_DELAY_MULTIPLIER_SECS).contains(&self.retry_delay_multiplier_secs) {
            return Err(ConfigurationError::invalid(
                "retry_delay_multiplier_secs",
                format!(
                    "must be between 0 and {} seconds",
                    MAX_RETRY_DELAY_MULTIPLIER_SECS
                ),
            )
            .into());
        }

        if self.retry_max_attempts == 0 {
            return Err(
                ConfigurationError::invalid("retry_max_attempts", "must be at least 1").into(),
            );
        }

        Ok(())
    }

    /// Fully qualified url the provider posts back to.
    pub fn redirect_uri_fqdn(&self) -> SessionResult<String> {
        match &self.auth_redirect_uri_fqdn {
            Some(fqdn) if !fqdn.is_empty() => Ok(fqdn.clone()),
            _ => fully_qualified_local_path(&self.app_domain, &self.redirect_uri),
        }
    }

    /// Attributes for the session cookie.
    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            name: self.cookie_name.clone(),
            is_secure: self.is_secure,
            ttl: self.cache_cookie_ttl,
            password: SecretString::new(self.cookie_password.expose_secret().clone()),
            path: "/".to_string(),
            http_only: true,
        }
    }

    /// Retry settings for provider calls.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            delay_multiplier_secs: self.retry_delay_multiplier_secs,
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_guid(field: &str, value: &str) -> Result<(), ConfigurationError> {
    require_non_empty(field, value)?;
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ConfigurationError::invalid(field, "must be a GUID"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    fn config_json() -> serde_json::Value {
        serde_json::json!({
            "identity_app_url": "https://identity.example",
            "service_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
            "client_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "client_secret": "client-secret",
            "cookie_password": "0123456789abcdef0123456789abcdef",
            "app_domain": "https://app.example"
        })
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SessionConfig = serde_json::from_value(config_json()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.cookie_name, "idm");
        assert_eq!(config.outbound_path, "/login/out");
        assert_eq!(config.redirect_uri, "/login/return");
        assert_eq!(config.logout_path.as_deref(), Some("/logout"));
        assert_eq!(config.disallowed_redirect_path, "/error");
        assert_eq!(config.default_back_to_path, "/");
        assert_eq!(config.default_scope, "offline_access openid");
        assert_eq!(config.cache_cookie_ttl, Duration::from_secs(86_400));
        assert_eq!(config.retry_delay_multiplier_secs, 1.5);
        assert!(!config.pass_request_to_cache_methods);
    }

    #[test]
    fn test_ttl_is_read_in_milliseconds() {
        let mut json = config_json();
        json["cache_cookie_ttl"] = serde_json::json!(999_999);
        let config: SessionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.cache_cookie_ttl, Duration::from_millis(999_999));
    }

    #[test]
    fn test_short_cookie_password_rejected() {
        let mut json = config_json();
        json["cookie_password"] = serde_json::json!("too-short");
        let config: SessionConfig = serde_json::from_value(json).unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Configuration(ConfigurationError::InvalidField { ref field, .. })
                if field == "cookie_password"
        ));
    }

    #[test]
    fn test_retry_multiplier_is_bounded() {
        for multiplier in [1e19, f64::INFINITY, f64::NAN, -0.5] {
            let mut config: SessionConfig = serde_json::from_value(config_json()).unwrap();
            config.retry_delay_multiplier_secs = multiplier;

            let err = config.validate().unwrap_err();
            assert!(matches!(
                err,
                SessionError::Configuration(ConfigurationError::InvalidField { ref field, .. })
                    if field == "retry_delay_multiplier_secs"
            ));
        }

        let mut config: SessionConfig = serde_json::from_value(config_json()).unwrap();
        config.retry_delay_multiplier_secs = MAX_RETRY_DELAY_MULTIPLIER_SECS;
        config.validate().unwrap();
        config.retry_delay_multiplier_secs = 0.0;
        config.validate().unwrap();
    }

    #[test]
    fn test_client_id_must_be_guid() {
        let mut json = config_json();
        json["client_id"] = serde_json::json!("not-a-guid");
        let config: SessionConfig = serde_json::from_value(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redirect_uri_fqdn() {
        let config: SessionConfig = serde_json::from_value(config_json()).unwrap();
        assert_eq!(
            config.redirect_uri_fqdn().unwrap(),
            "https://app.example/login/return"
        );

        let mut json = config_json();
        json["auth_redirect_uri_fqdn"] = serde_json::json!("https://auth.example/return");
        let config: SessionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.redirect_uri_fqdn().unwrap(), "https://auth.example/return");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config: SessionConfig = serde_json::from_value(config_json()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("client-secret"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
