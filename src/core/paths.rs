//! Path Resolution
//!
//! Turns caller-influenced paths into absolute urls on the application's own
//! domain.

use url::Url;

use crate::error::{SessionError, SessionResult};

/// Resolve `path` against `app_domain`.
///
/// Only the path and query of the resolved url are kept; any scheme or
/// authority carried by `path` itself is discarded, so the result always
/// points at `app_domain`'s host.
pub fn fully_qualified_local_path(app_domain: &Url, path: &str) -> SessionResult<String> {
    local_url(app_domain, path).map(String::from)
}

/// [`fully_qualified_local_path`] as a [`Url`].
pub fn local_url(app_domain: &Url, path: &str) -> SessionResult<Url> {
    let resolved = app_domain
        .join(path)
        .map_err(|e| SessionError::InvalidPath {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    let mut local = app_domain.clone();
    local.set_path(resolved.path());
    local.set_query(resolved.query());
    local.set_fragment(None);

    Ok(local)
}
