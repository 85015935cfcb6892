//! Request Types
//!
//! Per-request context handed to the session operations by the host's web
//! layer, and the session cookie it reads and writes.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Contents of the client-side session cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    /// Opaque handle of the session record in the cache.
    pub cache_key: String,
}

impl SessionCookie {
    /// Create a cookie referencing a session handle.
    pub fn new(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
        }
    }
}

/// What the host must do with the session cookie once the operation returns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CookieUpdate {
    /// Leave the cookie as it is.
    #[default]
    Unchanged,
    /// Write this cookie.
    Set(SessionCookie),
    /// Remove the cookie.
    Clear,
}

/// Per-request context.
///
/// Built by the host from the incoming request; the session operations read
/// the current session cookie from it and record cookie changes on it. It is
/// also what gets passed through to the cache backend when
/// `pass_request_to_cache_methods` is enabled.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    session_cookie: Option<SessionCookie>,
    cookie_update: CookieUpdate,
    attributes: HashMap<String, String>,
}

impl RequestContext {
    /// Context for a request carrying no session cookie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a request carrying a session cookie.
    pub fn with_session_cookie(cookie: SessionCookie) -> Self {
        Self {
            session_cookie: Some(cookie),
            ..Default::default()
        }
    }

    /// Attach a host attribute (request id, tenant, ...).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Host attribute lookup.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Session handle named by the current cookie, if any.
    pub fn session_handle(&self) -> Option<&str> {
        self.session_cookie
            .as_ref()
            .map(|cookie| cookie.cache_key.as_str())
            .filter(|key| !key.is_empty())
    }

    /// Set the session cookie for the response.
    pub fn set_session_cookie(&mut self, cookie: SessionCookie) {
        self.session_cookie = Some(cookie.clone());
        self.cookie_update = CookieUpdate::Set(cookie);
    }

    /// Clear the session cookie for the response.
    pub fn clear_session_cookie(&mut self) {
        self.session_cookie = None;
        self.cookie_update = CookieUpdate::Clear;
    }

    /// Cookie change the host must apply to the response.
    pub fn cookie_update(&self) -> &CookieUpdate {
        &self.cookie_update
    }
}

/// Attributes for the session cookie, derived from configuration.
#[derive(Clone, Debug)]
pub struct CookieOptions {
    /// Cookie name.
    pub name: String,
    /// Only send over HTTPS.
    pub is_secure: bool,
    /// Cookie lifetime.
    pub ttl: Duration,
    /// Password used by the host to seal the cookie.
    pub password: SecretString,
    /// Cookie path.
    pub path: String,
    /// Hide from scripts.
    pub http_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_handle_from_cookie() {
        let request = RequestContext::with_session_cookie(SessionCookie::new("handle-1"));
        assert_eq!(request.session_handle(), Some("handle-1"));
        assert_eq!(request.cookie_update(), &CookieUpdate::Unchanged);
    }

    #[test]
    fn test_empty_cache_key_is_no_session() {
        let request = RequestContext::with_session_cookie(SessionCookie::new(""));
        assert_eq!(request.session_handle(), None);
    }

    #[test]
    fn test_cookie_updates() {
        let mut request = RequestContext::new();
        assert_eq!(request.session_handle(), None);

        request.set_session_cookie(SessionCookie::new("h"));
        assert_eq!(request.session_handle(), Some("h"));
        assert_eq!(
            request.cookie_update(),
            &CookieUpdate::Set(SessionCookie::new("h"))
        );

        request.clear_session_cookie();
        assert_eq!(request.session_handle(), None);
        assert_eq!(request.cookie_update(), &CookieUpdate::Clear);
    }

    #[test]
    fn test_attributes() {
        let request = RequestContext::new().with_attribute("request_id", "req-1");
        assert_eq!(request.attribute("request_id"), Some("req-1"));
        assert_eq!(request.attribute("missing"), None);
    }
}
