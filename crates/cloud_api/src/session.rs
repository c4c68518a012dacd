//! Resolve session cookie to the caller's identity for dashboard routes.

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::COOKIE, request::Parts, StatusCode},
};
use domain::Identity;

use crate::state::AppState;
use db::get_identity_by_session_token;

pub const SESSION_COOKIE_NAME: &str = "dash_session";

pub fn token_from_cookie_header(cookie_header: Option<&str>) -> Option<String> {
    let header = cookie_header?;
    for part in header.split(';') {
        let part = part.trim();
        if part.starts_with(SESSION_COOKIE_NAME)
            && part.as_bytes().get(SESSION_COOKIE_NAME.len()) == Some(&b'=')
        {
            let value = part[SESSION_COOKIE_NAME.len() + 1..].trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Extractor that resolves the session cookie to an identity. Returns 401
/// if missing or invalid.
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let db = state
            .db
            .as_ref()
            .ok_or((StatusCode::SERVICE_UNAVAILABLE, "database unavailable"))?;
        let cookie_header = parts.headers.get(COOKIE).and_then(|v| v.to_str().ok());
        let token = token_from_cookie_header(cookie_header)
            .ok_or((StatusCode::UNAUTHORIZED, "not logged in"))?;
        let identity = get_identity_by_session_token(db, &token)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "session lookup failed"))?;
        let identity = identity.ok_or((StatusCode::UNAUTHORIZED, "invalid or expired session"))?;
        Ok(CurrentUser(identity))
    }
}
