use uuid::Uuid;

use crate::{
    error::Result,
    models::{TargetKind, VoteCounts, VoteOutcome, VoteRequest, VoteTarget, VoteValue},
    store::Store,
};

/// Parses the raw request into a target and a vote value, then records it.
/// Nothing is touched when either field is invalid.
pub async fn apply_vote(
    store: &dyn Store,
    voter_id: Uuid,
    request: &VoteRequest,
) -> Result<VoteOutcome> {
    let kind: TargetKind = request.target_type.parse()?;
    let value = VoteValue::try_from(request.vote_type)?;
    let target = VoteTarget {
        kind,
        id: request.target_id,
    };

    let outcome = store.apply_vote(voter_id, target, value).await?;

    tracing::debug!(
        voter_id = %voter_id,
        target_id = %target.id,
        kind = %target.kind,
        vote = %value,
        vote_score = outcome.vote_score,
        "Vote applied"
    );

    Ok(outcome)
}

pub async fn get_user_vote(
    store: &dyn Store,
    voter_id: Uuid,
    target: VoteTarget,
) -> Result<VoteValue> {
    store.get_user_vote(voter_id, target).await
}

pub async fn get_vote_counts(store: &dyn Store, target: VoteTarget) -> Result<VoteCounts> {
    store.get_vote_counts(target).await
}
