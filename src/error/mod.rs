//! Session Error Types
//!
//! Error hierarchy for the session lifecycle: cache backend faults, identity
//! provider faults, configuration problems and caller contract violations.

use thiserror::Error;

/// Root error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Cache backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("No identity provider client configured for policy '{policy_name}'")]
    ProviderResolution { policy_name: String },

    #[error("Token refresh failed: {0}")]
    ProviderRefresh(#[source] ProviderError),

    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("No session found for this request")]
    SessionAbsent,

    #[error("No pending authorization attempt for state key {state_key}")]
    StateNotFound { state_key: String },

    #[error("Session has no refresh token")]
    MissingRefreshToken,

    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },
}

impl SessionError {
    /// Get error code for diagnostics and error redirects.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "IDM_CONFIG",
            Self::Backend(_) => "IDM_BACKEND",
            Self::ProviderResolution { .. } => "IDM_PROVIDER_RESOLUTION",
            Self::ProviderRefresh(_) => "IDM_PROVIDER_REFRESH",
            Self::Provider(_) => "IDM_PROVIDER",
            Self::SessionAbsent => "IDM_SESSION_ABSENT",
            Self::StateNotFound { .. } => "IDM_STATE_NOT_FOUND",
            Self::MissingRefreshToken => "IDM_NO_REFRESH_TOKEN",
            Self::InvalidPath { .. } => "IDM_INVALID_PATH",
        }
    }

    /// Check if the caller should send the user back through login.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::SessionAbsent
                | Self::StateNotFound { .. }
                | Self::MissingRefreshToken
                | Self::ProviderRefresh(_)
        )
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },
}

impl ConfigurationError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Cache backend error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Cache unavailable: {message}")]
    Unavailable { message: String },

    #[error("Cache serialization failed for key {key}: {message}")]
    Serialization { key: String, message: String },
}

/// Error reported by an identity provider client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Provider rejected the request: {error}")]
    Rejected {
        error: String,
        error_description: Option<String>,
    },

    #[error("Provider error: {message}")]
    Other { message: String },
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Get a browser-safe message for an error.
///
/// Internal details (backend messages, keys, provider payloads) are never
/// included.
pub fn get_user_message(error: &SessionError) -> &'static str {
    match error {
        SessionError::SessionAbsent | SessionError::MissingRefreshToken => {
            "Your session has expired. Please sign in again."
        }
        SessionError::StateNotFound { .. } => {
            "Your sign-in attempt could not be completed. Please start again."
        }
        SessionError::ProviderRefresh(_) => {
            "Failed to refresh your session. Please sign in again."
        }
        SessionError::Provider(_) | SessionError::ProviderResolution { .. } => {
            "The sign-in service is temporarily unavailable. Please try again later."
        }
        _ => "An authentication error occurred. Please try again.",
    }
}
