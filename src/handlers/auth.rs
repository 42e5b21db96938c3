use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::Result,
    models::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
    services::auth_service,
};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    payload.validate()?;

    let response = auth_service::register(state.store.as_ref(), &state.config, &payload).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = auth_service::login(state.store.as_ref(), &state.config, &payload).await?;

    Ok(Json(response))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>> {
    let response =
        auth_service::refresh(state.store.as_ref(), &state.config, &payload.refresh_token).await?;

    Ok(Json(response))
}

/// Tokens are stateless, so logging out is the client discarding its pair.
pub async fn logout(auth_user: AuthUser) -> Json<Value> {
    tracing::debug!("User {} logged out", auth_user.username);

    Json(json!({ "success": true }))
}

pub async fn me(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<PublicUser>> {
    let user = auth_service::current_user(state.store.as_ref(), auth_user.user_id).await?;

    Ok(Json(user))
}
