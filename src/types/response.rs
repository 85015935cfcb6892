//! Response Types
//!
//! Framework-neutral responses produced by the session endpoints and hooks.

/// Response the host should send to the browser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthResponse {
    /// HTTP redirect to `location`.
    Redirect { location: String },
    /// HTML document with status 200.
    Html { body: String },
}

impl AuthResponse {
    /// Redirect response.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
        }
    }

    /// HTML response.
    pub fn html(body: impl Into<String>) -> Self {
        Self::Html { body: body.into() }
    }

    /// Redirect target, for redirect responses.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location } => Some(location),
            Self::Html { .. } => None,
        }
    }

    /// Body, for HTML responses.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Html { body } => Some(body),
            Self::Redirect { .. } => None,
        }
    }
}
