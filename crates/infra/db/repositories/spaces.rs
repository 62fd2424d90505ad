use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::parking_spaces},
};
use domain::{
    entities::spaces::{SpaceEntity, UpdateSpaceEntity},
    repositories::spaces::SpaceRepository,
};

pub struct SpacePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SpacePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SpaceRepository for SpacePostgres {
    async fn list_by_listing_ids(&self, listing_ids: Vec<Uuid>) -> Result<Vec<SpaceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = parking_spaces::table
            .filter(parking_spaces::listing_id.eq_any(listing_ids))
            .order((parking_spaces::listing_id.asc(), parking_spaces::space_number.asc()))
            .select(SpaceEntity::as_select())
            .load::<SpaceEntity>(&mut conn)?;

        Ok(results)
    }

    async fn update_space(
        &self,
        space_id: Uuid,
        changes: UpdateSpaceEntity,
    ) -> Result<Option<SpaceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changes = UpdateSpaceEntity {
            updated_at: Some(Utc::now()),
            ..changes
        };

        let result = update(parking_spaces::table)
            .filter(parking_spaces::id.eq(space_id))
            .set(&changes)
            .returning(SpaceEntity::as_returning())
            .get_result::<SpaceEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
