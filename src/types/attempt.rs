//! Authorization Attempt Types
//!
//! Records persisted while the user is away at the identity provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BackendError;

/// Pending authorization attempt, stored under the hash of its `state`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationAttempt {
    /// Provider policy selected for this attempt.
    #[serde(default)]
    pub policy_name: String,
    /// Identity app journey selected for this attempt.
    #[serde(default)]
    pub journey: String,
    /// Whether the provider was asked to force a fresh login.
    #[serde(default)]
    pub force_login: bool,
    /// Relative path to return to after login.
    #[serde(default)]
    pub back_to_path: String,
    /// OIDC nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// PKCE code challenge.
    #[serde(default)]
    pub code_challenge: String,
    /// PKCE code verifier.
    #[serde(default)]
    pub code_verifier: String,
    /// Error page override for this attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disallowed_redirect_path: Option<String>,
    /// Caller-supplied fields with no dedicated slot.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthorizationAttempt {
    /// Overlay caller-supplied fields on this attempt.
    ///
    /// Caller values win for every key they name; objects are merged
    /// recursively.
    pub fn merge_overrides(self, overrides: &Map<String, Value>) -> Result<Self, BackendError> {
        if overrides.is_empty() {
            return Ok(self);
        }

        let mut base = serde_json::to_value(&self).map_err(|e| BackendError::Serialization {
            key: "stateCacheData".to_string(),
            message: e.to_string(),
        })?;
        merge_value(&mut base, &Value::Object(overrides.clone()));

        serde_json::from_value(base).map_err(|e| BackendError::Serialization {
            key: "stateCacheData".to_string(),
            message: e.to_string(),
        })
    }
}

fn merge_value(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

/// An attempt read back from the state store, with the key it lives under.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingAttempt {
    /// Cache key (hash of the state token).
    pub state_key: String,
    /// The stored attempt.
    pub attempt: AuthorizationAttempt,
}
