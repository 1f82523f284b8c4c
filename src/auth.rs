use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    error::AppError,
    token::{Identity, TokenError, TokenService},
};

/// AuthError
///
/// Why the gate turned a request away. Only the kind is ever reported; the
/// offending token is not echoed back or logged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no authorization header provided")]
    Missing,

    #[error("authorization header or token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    SignatureInvalid,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing_token",
            AuthError::Malformed => "malformed_token",
            AuthError::Expired => "token_expired",
            AuthError::SignatureInvalid => "signature_invalid",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::Expired,
            TokenError::SignatureInvalid => AuthError::SignatureInvalid,
            // Signing-side failures cannot come out of validation.
            TokenError::Malformed | TokenError::MissingSecret | TokenError::Encoding(_) => {
                AuthError::Malformed
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::Authentication(self).into_response()
    }
}

/// parse_bearer
///
/// Pulls the token out of an `Authorization` header value. The value must be
/// exactly two space-separated parts: the `Bearer` scheme (any ASCII case) and
/// a non-empty token.
pub fn parse_bearer(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::Missing)?;

    let mut parts = value.split(' ');
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::Malformed);
    };

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Malformed);
    }

    Ok(token)
}

/// authenticate
///
/// Runs the whole gate against a set of request headers: header parsing, then
/// signature and expiry checks. Produces the identity the token was issued for.
pub fn authenticate(tokens: &TokenService, headers: &HeaderMap) -> Result<Identity, AuthError> {
    let raw = match headers.get(header::AUTHORIZATION) {
        None => None,
        // A header that is not visible ASCII cannot hold a valid token.
        Some(value) => Some(value.to_str().map_err(|_| AuthError::Malformed)?),
    };

    let token = parse_bearer(raw)?;
    let claims = tokens.validate(token)?;
    Ok(claims.into_identity())
}

/// auth_middleware
///
/// The authorization gate for every protected route. On success the caller's
/// [`Identity`] is published into the request extensions, where only this
/// request can see it; handlers pick it up with the [`AuthUser`] extractor.
/// On failure the request is rejected with 401 before any handler runs.
pub async fn auth_middleware(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = authenticate(&tokens, request.headers()).inspect_err(|err| {
        tracing::warn!(
            kind = err.code(),
            method = %request.method(),
            uri = %request.uri().path(),
            "request rejected by auth gate"
        );
    })?;

    tracing::debug!(subject_id = %identity.subject_id, role = %identity.role, "request authenticated");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// AuthUser
///
/// The identity established by [`auth_middleware`] for the current request.
///
/// Usable as a handler argument on any route behind the gate. On a route that
/// the gate does not cover there is no identity to read, and the extractor
/// rejects with 401 rather than guessing.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(identity) => Ok(AuthUser(identity.clone())),
            None => {
                tracing::error!(uri = %parts.uri.path(), "AuthUser used on a route outside the auth gate");
                Err(AuthError::Missing)
            }
        }
    }
}
