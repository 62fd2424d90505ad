use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::listing_statuses::ListingStatus;
use crate::infra::db::postgres::schema::parking_listings;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = parking_listings)]
pub struct ListingEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub address: String,
    pub price_per_month_minor: i64,
    pub status: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingEntity {
    pub fn is_bookable(&self) -> bool {
        self.is_active && ListingStatus::from_str(&self.status) == ListingStatus::Approved
    }
}
