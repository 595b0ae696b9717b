use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::AppError};

/// Short-circuits with 503 before a handler touches a datastore that is down.
pub async fn require_datastore(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !state.store.is_available() {
        tracing::warn!("Datastore unavailable, refusing {}", req.uri().path());
        return Err(AppError::Unavailable);
    }
    Ok(next.run(req).await)
}
