use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::Result,
    models::{TargetKind, UserVoteResponse, VoteCounts, VoteOutcome, VoteRequest, VoteTarget},
    services::vote_service,
};

pub async fn cast_vote(
    State(state): State<AppState>,
    auth_user: AuthUser,
    payload: std::result::Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteOutcome>> {
    let Json(payload) = payload?;
    let outcome = vote_service::apply_vote(state.store.as_ref(), auth_user.user_id, &payload).await?;

    Ok(Json(outcome))
}

pub async fn get_user_vote(
    State(state): State<AppState>,
    Path((target_type, target_id)): Path<(String, Uuid)>,
    auth_user: AuthUser,
) -> Result<Json<UserVoteResponse>> {
    let kind: TargetKind = target_type.parse()?;
    let user_vote = vote_service::get_user_vote(
        state.store.as_ref(),
        auth_user.user_id,
        VoteTarget {
            kind,
            id: target_id,
        },
    )
    .await?;

    Ok(Json(UserVoteResponse { user_vote }))
}

pub async fn get_vote_counts(
    State(state): State<AppState>,
    Path((target_type, target_id)): Path<(String, Uuid)>,
) -> Result<Json<VoteCounts>> {
    let kind: TargetKind = target_type.parse()?;
    let counts = vote_service::get_vote_counts(
        state.store.as_ref(),
        VoteTarget {
            kind,
            id: target_id,
        },
    )
    .await?;

    Ok(Json(counts))
}
