use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use super::model::{
    GenerateImageRequest, GenerateImageResponse, GenerateTextRequest, GenerateTextResponse,
};
use crate::{AppState, error::AppError};

#[axum::debug_handler]
pub async fn generate_text(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<GenerateTextRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let instruction = req.system_instruction.as_ref().map(|s| s.text());
    let text = state
        .gateway
        .generate_text(&req.contents, instruction.as_deref())
        .await
        .inspect_err(|e| tracing::error!("Text generation failed: {}", e))?;

    Ok(Json(GenerateTextResponse::from_text(text)))
}

#[axum::debug_handler]
pub async fn generate_image(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<GenerateImageRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let image_base64 = state
        .gateway
        .generate_image(req.prompt())
        .await
        .inspect_err(|e| tracing::error!("Image generation failed: {}", e))?;

    Ok(Json(GenerateImageResponse { image_base64 }))
}
