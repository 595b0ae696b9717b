use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

use crate::error::ErrorContext;

const MAX_LOGGED_BODY: usize = 64 * 1024;

/// Logs every 5xx with the request line. Outages are warnings since the
/// response already tells the client to come back later.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();

    if !status.is_server_error() {
        return response;
    }

    if let Some(context) = response.extensions().get::<ErrorContext>() {
        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(%method, %path, code = context.code, "{}", context.message);
        } else {
            error!(%method, %path, %status, code = context.code, "{}", context.message);
        }
        return response;
    }

    // Raised outside the handlers, so the body is the only record of the cause.
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!(%method, %path, %status, "Unreadable error body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(%method, %path, %status, "{}", String::from_utf8_lossy(&bytes));

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
