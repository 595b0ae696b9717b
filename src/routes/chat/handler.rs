use axum::{
    extract::{Extension, Json, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::model::{ChatLog, SaveMessageRequest, SuccessResponse};
use crate::{AppState, error::AppError, utils::Claims};

fn user_id(claims: &Claims) -> Result<Uuid, AppError> {
    claims.user_id().ok_or(AppError::Forbidden)
}

#[axum::debug_handler]
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let messages = ChatLog::history(state.store.as_ref(), user_id(&claims)?).await?;
    Ok(Json(messages))
}

#[axum::debug_handler]
pub async fn save(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SaveMessageRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let messages = ChatLog::append(state.store.as_ref(), user_id(&claims)?, req.message).await?;
    tracing::debug!("Chat log for {} now holds {} messages", claims.username, messages.len());
    Ok(Json(SuccessResponse::ok()))
}

#[axum::debug_handler]
pub async fn clear(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    ChatLog::clear(state.store.as_ref(), user_id(&claims)?).await?;
    tracing::info!("Cleared chat log for {}", claims.username);
    Ok(Json(SuccessResponse::ok()))
}
