use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::user_messages::InsertUserMessageEntity;

#[automock]
#[async_trait]
pub trait UserMessageRepository {
    async fn insert_message(&self, insert_user_message_entity: InsertUserMessageEntity)
    -> Result<Uuid>;
}
