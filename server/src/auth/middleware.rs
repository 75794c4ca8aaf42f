//! Authentication middleware.
//!
//! A bearer token names the principal directly; board ownership and
//! membership decide what that principal may touch. The token is not
//! verified here: callers are expected to be authenticated by a proxy in
//! front of the server. Unless `REQUIRE_AUTH` is on, the server runs in
//! development mode and requests without a header act as `anonymous`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::AppState;

/// Principal used for unauthenticated requests in development mode.
pub const ANONYMOUS: &str = "anonymous";

/// Authenticated caller extracted from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// The principal the engine authorizes against
    pub principal: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        principal_from_header(auth_header, state.config.require_auth)
            .map(|principal| AuthUser { principal })
    }
}

fn principal_from_header(
    header: Option<&str>,
    auth_required: bool,
) -> Result<String, (StatusCode, &'static str)> {
    match header {
        Some(header) => {
            let token = header
                .strip_prefix("Bearer ")
                .ok_or((StatusCode::UNAUTHORIZED, "Invalid authorization header format"))?
                .trim();
            if token.is_empty() {
                return Err((StatusCode::UNAUTHORIZED, "Empty bearer token"));
            }
            Ok(token.to_string())
        }
        None if auth_required => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
        None => Ok(ANONYMOUS.to_string()),
    }
}
