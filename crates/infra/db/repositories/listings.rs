use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::parking_listings},
};
use domain::{entities::listings::ListingEntity, repositories::listings::ListingRepository};

pub struct ListingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ListingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ListingRepository for ListingPostgres {
    async fn find_by_id(&self, listing_id: Uuid) -> Result<Option<ListingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = parking_listings::table
            .filter(parking_listings::id.eq(listing_id))
            .select(ListingEntity::as_select())
            .first::<ListingEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_by_ids(&self, listing_ids: Vec<Uuid>) -> Result<Vec<ListingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = parking_listings::table
            .filter(parking_listings::id.eq_any(listing_ids))
            .order(parking_listings::created_at.asc())
            .select(ListingEntity::as_select())
            .load::<ListingEntity>(&mut conn)?;

        Ok(results)
    }
}
