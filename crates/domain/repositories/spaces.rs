use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::spaces::{SpaceEntity, UpdateSpaceEntity};

#[automock]
#[async_trait]
pub trait SpaceRepository {
    async fn list_by_listing_ids(&self, listing_ids: Vec<Uuid>) -> Result<Vec<SpaceEntity>>;

    async fn update_space(
        &self,
        space_id: Uuid,
        changes: UpdateSpaceEntity,
    ) -> Result<Option<SpaceEntity>>;
}
