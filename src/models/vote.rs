use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// A single voter's stance on a target. `Neutral` is never stored: the
/// ledger represents it by the absence of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum VoteValue {
    Down,
    #[default]
    Neutral,
    Up,
}

impl VoteValue {
    pub fn as_i16(self) -> i16 {
        match self {
            VoteValue::Down => -1,
            VoteValue::Neutral => 0,
            VoteValue::Up => 1,
        }
    }

    pub fn as_i32(self) -> i32 {
        i32::from(self.as_i16())
    }
}

impl From<VoteValue> for i16 {
    fn from(value: VoteValue) -> Self {
        value.as_i16()
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = AppError;

    fn try_from(raw: i16) -> Result<Self, Self::Error> {
        match raw {
            -1 => Ok(VoteValue::Down),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Up),
            _ => Err(AppError::Validation(
                "Invalid vote type. Must be -1, 0, or 1".to_string(),
            )),
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    /// Table holding the target rows and their `vote_score` column.
    pub fn table(self) -> &'static str {
        match self {
            TargetKind::Post => "posts",
            TargetKind::Comment => "comments",
        }
    }

    /// Column of the `votes` table pointing at this kind of target.
    pub fn ledger_column(self) -> &'static str {
        match self {
            TargetKind::Post => "post_id",
            TargetKind::Comment => "comment_id",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Post => write!(f, "post"),
            TargetKind::Comment => write!(f, "comment"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(TargetKind::Post),
            "comment" => Ok(TargetKind::Comment),
            _ => Err(AppError::Validation(
                "Invalid target type. Must be \"post\" or \"comment\"".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteTarget {
    pub kind: TargetKind,
    pub id: Uuid,
}

impl VoteTarget {
    pub fn post(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Post,
            id,
        }
    }

    pub fn comment(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Comment,
            id,
        }
    }
}

/// What a vote request does to the ledger, given the vote already on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    Unchanged,
    Cast(VoteValue),
    Change { from: VoteValue, to: VoteValue },
    Retract(VoteValue),
}

impl VoteTransition {
    pub fn plan(current: VoteValue, requested: VoteValue) -> Self {
        match (current, requested) {
            (current, requested) if current == requested => VoteTransition::Unchanged,
            (current, VoteValue::Neutral) => VoteTransition::Retract(current),
            (VoteValue::Neutral, requested) => VoteTransition::Cast(requested),
            (from, to) => VoteTransition::Change { from, to },
        }
    }

    /// Delta to apply to the target's cached `vote_score`.
    pub fn score_change(self) -> i32 {
        match self {
            VoteTransition::Unchanged => 0,
            VoteTransition::Cast(value) => value.as_i32(),
            VoteTransition::Change { from, to } => to.as_i32() - from.as_i32(),
            VoteTransition::Retract(value) => -value.as_i32(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub vote_type: i16, // -1 for downvote, 1 for upvote
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Vote request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub target_id: Uuid,
    pub target_type: String,
    pub vote_type: i16, // -1 for downvote, 0 for remove vote, 1 for upvote
}

// Vote response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub vote_score: i32,
    pub user_vote: VoteValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVoteResponse {
    pub user_vote: VoteValue,
}

/// Ledger scan for a single target, independent of the cached score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}
