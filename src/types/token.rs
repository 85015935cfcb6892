//! Token Types
//!
//! Token sets as issued by the identity provider, the materialized form that
//! gets persisted, and the session record built from it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Identity claims extracted from a validated ID token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry (seconds since the Unix epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Trust framework policy the token was issued under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfp: Option<String>,
    /// Authentication context class, used as the policy when `tfp` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    /// Contact identifier of the signed-in user.
    #[serde(default, rename = "contactId", skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// Any other claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Claims {
    /// Policy the claims were issued under (`tfp`, falling back to `acr`).
    /// Empty values count as absent.
    pub fn policy_name(&self) -> Option<&str> {
        non_empty(&self.tfp).or_else(|| non_empty(&self.acr))
    }

    /// Look up a claim not modelled as a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Deferred claims computation supplied by a token library.
pub type ClaimsFn = Arc<dyn Fn() -> Option<Claims> + Send + Sync>;

/// Claims as handed over by the provider client: either already a value or
/// computed on demand.
#[derive(Clone, Default)]
pub enum ClaimsSource {
    /// No claims available.
    #[default]
    Absent,
    /// Plain claims value.
    Materialized(Claims),
    /// Claims computed when first asked for.
    Deferred(ClaimsFn),
}

impl ClaimsSource {
    /// Wrap a closure producing claims.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn() -> Option<Claims> + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(f))
    }

    /// Resolve to a plain value, running a deferred computation once.
    pub fn materialize(self) -> Option<Claims> {
        match self {
            Self::Absent => None,
            Self::Materialized(claims) => Some(claims),
            Self::Deferred(compute) => compute(),
        }
    }
}

impl From<Claims> for ClaimsSource {
    fn from(claims: Claims) -> Self {
        Self::Materialized(claims)
    }
}

impl std::fmt::Debug for ClaimsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Materialized(claims) => f.debug_tuple("Materialized").field(claims).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Token set returned by an identity provider client after a code exchange
/// or refresh.
#[derive(Clone, Default)]
pub struct ProviderTokenSet {
    /// Access token.
    pub access_token: Option<String>,
    /// Token type (usually "Bearer").
    pub token_type: Option<String>,
    /// Refresh token.
    pub refresh_token: Option<String>,
    /// ID token.
    pub id_token: Option<String>,
    /// Access token expiry (seconds since the Unix epoch).
    pub expires_at: Option<i64>,
    /// Granted scopes.
    pub scope: Option<String>,
    /// Claims, possibly not yet computed.
    pub claims: ClaimsSource,
    /// Additional provider fields.
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for ProviderTokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTokenSet")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("claims", &self.claims)
            .finish()
    }
}

/// Token set with claims materialized, ready to persist.
///
/// The only way to obtain one from a [`ProviderTokenSet`] is
/// [`normalize_token_set`], so everything that gets stored has plain claims.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("claims", &self.claims)
            .finish()
    }
}

/// Materialize the claims of a provider token set.
///
/// Deferred claims are computed exactly once, here.
pub fn normalize_token_set(token_set: ProviderTokenSet) -> TokenSet {
    TokenSet {
        access_token: token_set.access_token,
        token_type: token_set.token_type,
        refresh_token: token_set.refresh_token,
        id_token: token_set.id_token,
        expires_at: token_set.expires_at,
        scope: token_set.scope,
        claims: token_set.claims.materialize(),
        extra: token_set.extra,
    }
}

impl From<ProviderTokenSet> for TokenSet {
    fn from(token_set: ProviderTokenSet) -> Self {
        normalize_token_set(token_set)
    }
}

/// Authenticated session record, referenced by the session cookie.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Token set issued by the provider.
    pub token_set: TokenSet,
    /// Claims extracted at storage time.
    #[serde(default)]
    pub claims: Option<Claims>,
}

impl Session {
    /// Build a session record from a materialized token set.
    pub fn new(token_set: TokenSet) -> Self {
        let claims = token_set.claims.clone();
        Self { token_set, claims }
    }

    /// Whether the session's claims have expired.
    ///
    /// A session without claims counts as expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Whether the session's claims had expired at `now` (seconds since epoch).
    pub fn is_expired_at(&self, now: i64) -> bool {
        match &self.claims {
            None => true,
            Some(claims) => claims.exp.map(|exp| exp < now).unwrap_or(false),
        }
    }

    /// Refresh token of the stored token set.
    pub fn refresh_token(&self) -> Option<&str> {
        self.token_set.refresh_token.as_deref()
    }

    /// Policy the session was issued under.
    pub fn policy_name(&self) -> Option<&str> {
        self.claims.as_ref().and_then(Claims::policy_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn claims_expiring_at(exp: i64) -> Claims {
        Claims {
            sub: Some("user-1".to_string()),
            exp: Some(exp),
            ..Default::default()
        }
    }

    #[test]
    fn test_deferred_claims_computed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let provider = ProviderTokenSet {
            access_token: Some("at".to_string()),
            claims: ClaimsSource::deferred(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(claims_expiring_at(100))
            }),
            ..Default::default()
        };

        let token_set = normalize_token_set(provider);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(token_set.claims.as_ref().and_then(|c| c.exp), Some(100));

        let session = Session::new(token_set);
        let _ = session.claims.clone();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_expiry() {
        let session = Session::new(TokenSet::from(ProviderTokenSet {
            claims: claims_expiring_at(1_000).into(),
            ..Default::default()
        }));

        assert!(!session.is_expired_at(999));
        assert!(!session.is_expired_at(1_000));
        assert!(session.is_expired_at(1_001));
    }

    #[test]
    fn test_session_without_claims_is_expired() {
        let session = Session::new(TokenSet::from(ProviderTokenSet::default()));
        assert!(session.is_expired_at(0));
    }

    #[test]
    fn test_claims_without_exp_not_expired() {
        let session = Session::new(TokenSet::from(ProviderTokenSet {
            claims: Claims::default().into(),
            ..Default::default()
        }));
        assert!(!session.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_policy_name_prefers_tfp() {
        let claims = Claims {
            tfp: Some("b2c_1a_signin".to_string()),
            acr: Some("b2c_1a_other".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.policy_name(), Some("b2c_1a_signin"));

        let claims = Claims {
            acr: Some("b2c_1a_other".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.policy_name(), Some("b2c_1a_other"));
    }

    #[test]
    fn test_empty_tfp_falls_back_to_acr() {
        let claims = Claims {
            tfp: Some(String::new()),
            acr: Some("b2c_1a_other".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.policy_name(), Some("b2c_1a_other"));

        let claims = Claims {
            tfp: Some(String::new()),
            acr: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(claims.policy_name(), None);
    }

    #[test]
    fn test_session_serialized_shape() {
        let session = Session::new(TokenSet::from(ProviderTokenSet {
            refresh_token: Some("rt".to_string()),
            claims: Claims {
                contact_id: Some("c-1".to_string()),
                ..Default::default()
            }
            .into(),
            ..Default::default()
        }));

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["tokenSet"]["refresh_token"], "rt");
        assert_eq!(value["claims"]["contactId"], "c-1");

        let back: Session = serde_json::from_value(value).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let token_set = TokenSet::from(ProviderTokenSet {
            access_token: Some("secret-access".to_string()),
            ..Default::default()
        });
        assert!(!format!("{:?}", token_set).contains("secret-access"));
    }
}
