use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::parking_spaces;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = parking_spaces)]
pub struct SpaceEntity {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub space_number: String,
    pub space_status: String,
    pub override_status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = parking_spaces)]
pub struct UpdateSpaceEntity {
    pub space_status: Option<String>,
    pub override_status: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}
