//! Callback Types
//!
//! Parameters arriving at the outbound and return endpoints.

use std::collections::HashMap;
use url::Url;

/// Parameters posted back by the identity provider to the return endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code (if success).
    pub code: Option<String>,
    /// State parameter.
    pub state: Option<String>,
    /// ID token, when the provider posts one alongside the code.
    pub id_token: Option<String>,
    /// Error code (if authorization failed).
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
    /// Any other posted fields.
    pub extra: HashMap<String, String>,
}

impl CallbackParams {
    /// Parse from name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();

        for (key, value) in pairs {
            let value = value.into();
            match key.as_ref() {
                "code" => params.code = Some(value),
                "state" => params.state = Some(value),
                "id_token" => params.id_token = Some(value),
                "error" => params.error = Some(value),
                "error_description" => params.error_description = Some(value),
                other => {
                    params.extra.insert(other.to_string(), value);
                }
            }
        }

        params
    }

    /// Parse an `application/x-www-form-urlencoded` body (form_post response mode).
    pub fn from_form(body: &str) -> Self {
        Self::from_pairs(
            url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        )
    }

    /// Parse from a callback URL's query string.
    pub fn from_url(url: &Url) -> Self {
        Self::from_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    /// Check if the provider reported an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Provider rejection carried by these parameters, if any.
    pub fn rejection(&self) -> Option<AuthorizationRejection> {
        self.error.as_ref().map(|error| AuthorizationRejection {
            error_message: error.clone(),
            error_description: self.error_description.clone().unwrap_or_default(),
            state: self.state.clone().unwrap_or_default(),
        })
    }
}

/// The identity provider refused the authorization (consent denied, policy
/// failure, ...). Rendered as an error redirect, never as a server fault.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationRejection {
    /// Provider error code or message.
    pub error_message: String,
    /// Provider error description.
    pub error_description: String,
    /// State token of the rejected attempt.
    pub state: String,
}

/// Values the provider client must check when exchanging the code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackChecks {
    /// Expected state.
    pub state: String,
    /// Expected nonce.
    pub nonce: Option<String>,
    /// PKCE code verifier.
    pub code_verifier: String,
    /// Expected response type.
    pub response_type: String,
}

/// Query parameters accepted by the outbound endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutboundQuery {
    pub back_to_path: Option<String>,
    pub policy_name: Option<String>,
    pub journey: Option<String>,
    pub force_login: bool,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub scope: Option<String>,
    /// Cross-site analytics client id (`_ga`).
    pub analytics_id: Option<String>,
}

impl OutboundQuery {
    /// Parse from name/value pairs. Empty values count as absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();

        for (key, value) in pairs {
            let value: String = value.into();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "backToPath" => query.back_to_path = Some(value),
                "policyName" => query.policy_name = Some(value),
                "journey" => query.journey = Some(value),
                "forceLogin" => query.force_login = value == "yes",
                "state" => query.state = Some(value),
                "nonce" => query.nonce = Some(value),
                "scope" => query.scope = Some(value),
                "_ga" => query.analytics_id = Some(value),
                _ => {}
            }
        }

        query
    }

    /// Parse from the outbound endpoint URL.
    pub fn from_url(url: &Url) -> Self {
        Self::from_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())))
    }
}
