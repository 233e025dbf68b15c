//! Requester identity extraction.
//!
//! The identity provider and the proxy in front of Hermes validate the user;
//! Hermes only reads the claims they forward. An explicit department header
//! wins. Otherwise the department is resolved from the forwarded role list,
//! falling back to the default department when nothing matches.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::state::AppState;

/// Header carrying the requester's department, already resolved upstream.
pub const DEPARTMENT_HEADER: &str = "x-hermes-department";

/// Header carrying the requester's comma-separated role claims.
pub const ROLES_HEADER: &str = "x-hermes-roles";

/// The caller of a request, as far as access rules are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub department: String,
}

impl FromRequestParts<Arc<AppState>> for Requester {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(department) = header_text(&parts.headers, DEPARTMENT_HEADER) {
            return Ok(Self {
                department: department.to_owned(),
            });
        }

        let roles = header_text(&parts.headers, ROLES_HEADER).unwrap_or_default();
        Ok(Self {
            department: state.departments.resolve(roles.split(',')),
        })
    }
}

/// A header value as UTF-8 text, trimmed, or `None` if absent or empty.
///
/// Department names are not ASCII-only (`Dirección`), so the raw bytes are
/// decoded instead of using `HeaderValue::to_str`.
fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_text_decodes_utf8() {
        let mut headers = HeaderMap::new();
        headers.insert(
            DEPARTMENT_HEADER,
            HeaderValue::from_bytes("Dirección".as_bytes()).unwrap(),
        );
        assert_eq!(header_text(&headers, DEPARTMENT_HEADER), Some("Dirección"));
    }

    #[test]
    fn blank_headers_are_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLES_HEADER, HeaderValue::from_static("   "));
        assert_eq!(header_text(&headers, ROLES_HEADER), None);
        assert_eq!(header_text(&headers, DEPARTMENT_HEADER), None);
    }
}
