use axum::{extract::State, http::StatusCode, response::Json};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::Result,
    models::{Community, CreateCommunityRequest},
    services::community_service,
};

pub async fn get_communities(State(state): State<AppState>) -> Result<Json<Vec<Community>>> {
    let communities = community_service::list_communities(state.store.as_ref()).await?;

    Ok(Json(communities))
}

pub async fn create_community(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCommunityRequest>,
) -> Result<(StatusCode, Json<Community>)> {
    payload.validate()?;

    let community =
        community_service::create_community(state.store.as_ref(), auth_user.user_id, &payload)
            .await?;

    Ok((StatusCode::CREATED, Json(community)))
}
