use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Community, CreateCommunityRequest},
    store::Store,
};

pub async fn create_community(
    store: &dyn Store,
    creator_id: Uuid,
    request: &CreateCommunityRequest,
) -> Result<Community> {
    let name = request.name.trim();
    if name.chars().count() < 3 {
        return Err(AppError::Validation(
            "Community name must be between 3 and 50 characters".to_string(),
        ));
    }

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    let community = store
        .create_community(Community {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description,
            created_by: creator_id,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!("Community {} created by {}", community.name, creator_id);

    Ok(community)
}

pub async fn list_communities(store: &dyn Store) -> Result<Vec<Community>> {
    store.list_communities().await
}
