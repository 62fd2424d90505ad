use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait UserRoleRepository {
    async fn is_admin(&self, user_id: Uuid) -> Result<bool>;
}
