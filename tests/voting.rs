mod common;

use std::sync::Arc;

use common::{create_post, register, reply, test_state};
use forum_core::{
    error::AppError,
    models::{VoteCounts, VoteRequest, VoteTarget, VoteValue},
    services::vote_service,
    store::Store,
};
use futures::future::join_all;
use uuid::Uuid;

fn vote(target_id: Uuid, target_type: &str, vote_type: i16) -> VoteRequest {
    VoteRequest {
        target_id,
        target_type: target_type.to_string(),
        vote_type,
    }
}

async fn score_of(store: &dyn Store, post_id: Uuid) -> i32 {
    store.get_post_raw(post_id).await.unwrap().unwrap().vote_score
}

#[tokio::test]
async fn two_voters_flip_and_retract() {
    let state = test_state();
    let store = state.store.as_ref();
    let alice = register(&state, "alice").await.user.id;
    let bob = register(&state, "bob").await.user.id;
    let post = create_post(store, alice, "Scores should never drift").await;

    let outcome = vote_service::apply_vote(store, alice, &vote(post.id, "post", 1))
        .await
        .unwrap();
    assert_eq!(outcome.vote_score, 1);
    assert_eq!(outcome.user_vote, VoteValue::Up);

    let outcome = vote_service::apply_vote(store, bob, &vote(post.id, "post", 1))
        .await
        .unwrap();
    assert_eq!(outcome.vote_score, 2);

    let outcome = vote_service::apply_vote(store, alice, &vote(post.id, "post", -1))
        .await
        .unwrap();
    assert_eq!(outcome.vote_score, 0);
    assert_eq!(outcome.user_vote, VoteValue::Down);

    // Clicking the down arrow again: the client sends 0.
    let outcome = vote_service::apply_vote(store, alice, &vote(post.id, "post", 0))
        .await
        .unwrap();
    assert_eq!(outcome.vote_score, 1);
    assert_eq!(outcome.user_vote, VoteValue::Neutral);

    let counts = vote_service::get_vote_counts(store, VoteTarget::post(post.id))
        .await
        .unwrap();
    assert_eq!(
        counts,
        VoteCounts {
            upvotes: 1,
            downvotes: 0,
            score: 1
        }
    );
    assert_eq!(score_of(store, post.id).await, 1);
}

#[tokio::test]
async fn cast_retract_cast_returns_to_plus_one() {
    let state = test_state();
    let store = state.store.as_ref();
    let alice = register(&state, "alice").await.user.id;
    let post = create_post(store, alice, "Round trips stay balanced").await;

    for value in [1, 0, 1] {
        vote_service::apply_vote(store, alice, &vote(post.id, "post", value))
            .await
            .unwrap();
    }

    assert_eq!(score_of(store, post.id).await, 1);
    assert_eq!(
        vote_service::get_user_vote(store, alice, VoteTarget::post(post.id))
            .await
            .unwrap(),
        VoteValue::Up
    );
}

#[tokio::test]
async fn repeating_a_vote_changes_nothing() {
    let state = test_state();
    let store = state.store.as_ref();
    let alice = register(&state, "alice").await.user.id;
    let post = create_post(store, alice, "Idempotent repeated votes").await;

    for value in [-1, -1, -1] {
        let outcome = vote_service::apply_vote(store, alice, &vote(post.id, "post", value))
            .await
            .unwrap();
        assert_eq!(outcome.vote_score, -1);
    }

    let outcome = vote_service::apply_vote(store, alice, &vote(post.id, "post", 0))
        .await
        .unwrap();
    assert_eq!(outcome.vote_score, 0);
    let outcome = vote_service::apply_vote(store, alice, &vote(post.id, "post", 0))
        .await
        .unwrap();
    assert_eq!(outcome.vote_score, 0);

    let counts = vote_service::get_vote_counts(store, VoteTarget::post(post.id))
        .await
        .unwrap();
    assert_eq!(counts, VoteCounts::default());
}

#[tokio::test]
async fn score_matches_a_replay_of_the_last_vote() {
    let state = test_state();
    let store = state.store.as_ref();
    let alice = register(&state, "alice").await.user.id;
    let post = create_post(store, alice, "Replaying a vote sequence").await;

    let sequence = [1, -1, -1, 0, 1, 1, 0, 0, -1, 1, -1];
    for value in sequence {
        let outcome = vote_service::apply_vote(store, alice, &vote(post.id, "post", value))
            .await
            .unwrap();
        assert_eq!(outcome.vote_score, i32::from(value));
    }

    assert_eq!(score_of(store, post.id).await, -1);
}

#[tokio::test]
async fn invalid_requests_leave_the_score_alone() {
    let state = test_state();
    let store = state.store.as_ref();
    let alice = register(&state, "alice").await.user.id;
    let post = create_post(store, alice, "Validation happens first").await;

    let err = vote_service::apply_vote(store, alice, &vote(post.id, "post", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = vote_service::apply_vote(store, alice, &vote(post.id, "user", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = vote_service::apply_vote(store, alice, &vote(Uuid::new_v4(), "post", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // A post id is not a comment id.
    let err = vote_service::apply_vote(store, alice, &vote(post.id, "comment", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(score_of(store, post.id).await, 0);
}

#[tokio::test]
async fn comment_votes_touch_only_the_comment() {
    let state = test_state();
    let store = state.store.as_ref();
    let alice = register(&state, "alice").await.user.id;
    let bob = register(&state, "bob").await.user.id;
    let post = create_post(store, alice, "Comments carry their own score").await;
    let comment = reply(store, bob, post.id, None).await;

    let outcome = vote_service::apply_vote(store, alice, &vote(comment.id, "comment", -1))
        .await
        .unwrap();
    assert_eq!(outcome.vote_score, -1);

    let stored = store.get_comment_raw(comment.id).await.unwrap().unwrap();
    assert_eq!(stored.vote_score, -1);
    assert_eq!(score_of(store, post.id).await, 0);
    assert_eq!(
        vote_service::get_user_vote(store, alice, VoteTarget::post(post.id))
            .await
            .unwrap(),
        VoteValue::Neutral
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_voters_do_not_lose_updates() {
    let state = test_state();
    let author = register(&state, "author").await.user.id;
    let post_id = create_post(state.store.as_ref(), author, "Everybody votes at once")
        .await
        .id;

    let voters: Vec<Uuid> = (0..64).map(|_| Uuid::new_v4()).collect();
    let tasks = voters.iter().enumerate().map(|(i, &voter)| {
        let store = Arc::clone(&state.store);
        let value = if i % 4 == 0 { -1 } else { 1 };
        tokio::spawn(async move {
            vote_service::apply_vote(store.as_ref(), voter, &vote(post_id, "post", value)).await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    // 48 up, 16 down
    assert_eq!(score_of(state.store.as_ref(), post_id).await, 32);
    let counts = vote_service::get_vote_counts(state.store.as_ref(), VoteTarget::post(post_id))
        .await
        .unwrap();
    assert_eq!(counts.upvotes, 48);
    assert_eq!(counts.downvotes, 16);
    assert_eq!(counts.score, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_voter_racing_with_itself_stays_consistent() {
    let state = test_state();
    let voter = register(&state, "flipper").await.user.id;
    let post_id = create_post(state.store.as_ref(), voter, "Flipping from many tabs")
        .await
        .id;

    let tasks = (0..40).map(|i| {
        let store = Arc::clone(&state.store);
        let value = [1, -1, 0][i % 3];
        tokio::spawn(async move {
            vote_service::apply_vote(store.as_ref(), voter, &vote(post_id, "post", value)).await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let store = state.store.as_ref();
    let final_vote = vote_service::get_user_vote(store, voter, VoteTarget::post(post_id))
        .await
        .unwrap();
    assert_eq!(score_of(store, post_id).await, final_vote.as_i32());

    let counts = vote_service::get_vote_counts(store, VoteTarget::post(post_id))
        .await
        .unwrap();
    assert_eq!(counts.score, i64::from(final_vote.as_i32()));
}
