use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use crate::{AppState, error::AppError, utils::generate_token};

use super::model::{CredentialsRequest, LoginResponse, RegisterResponse, User};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    User::register(state.store.as_ref(), &req, state.config.bcrypt_cost).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Username and password are required".into(),
        ));
    }

    let user = User::verify(state.store.as_ref(), &req.username, &req.password).await?;

    let token = generate_token(&user.id, &user.username, &state.config).map_err(|e| {
        tracing::error!("Failed to sign token for {}: {}", user.username, e);
        AppError::Internal("Failed to generate token".into())
    })?;

    Ok(Json(LoginResponse {
        token,
        username: user.username,
    }))
}
