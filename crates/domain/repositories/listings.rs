use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::listings::ListingEntity;

#[automock]
#[async_trait]
pub trait ListingRepository {
    async fn find_by_id(&self, listing_id: Uuid) -> Result<Option<ListingEntity>>;

    async fn list_by_ids(&self, listing_ids: Vec<Uuid>) -> Result<Vec<ListingEntity>>;
}
