use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_messages},
};
use domain::{
    entities::user_messages::InsertUserMessageEntity,
    repositories::user_messages::UserMessageRepository,
};

pub struct UserMessagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserMessagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserMessageRepository for UserMessagePostgres {
    async fn insert_message(
        &self,
        insert_user_message_entity: InsertUserMessageEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(user_messages::table)
            .values(&insert_user_message_entity)
            .returning(user_messages::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }
}
