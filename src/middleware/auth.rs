use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError, utils::verify_token};

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthenticated)
}

/// Rejects requests without a bearer token (401) or with one that fails
/// verification (403); otherwise exposes the token's [`Claims`](crate::utils::Claims)
/// as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).inspect_err(|_| {
        tracing::debug!("Rejected {} without bearer token", req.uri().path());
    })?;

    let claims = verify_token(&token, &state.config).map_err(|e| {
        tracing::warn!("Rejected token on {}: {}", req.uri().path(), e);
        AppError::Forbidden
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
