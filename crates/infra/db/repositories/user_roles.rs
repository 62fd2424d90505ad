use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, dsl::exists, prelude::*, select};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_roles},
};
use domain::repositories::user_roles::UserRoleRepository;

const ADMIN_ROLE: &str = "admin";

pub struct UserRolePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserRolePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRoleRepository for UserRolePostgres {
    async fn is_admin(&self, user_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = select(exists(
            user_roles::table
                .filter(user_roles::user_id.eq(user_id))
                .filter(user_roles::role.eq(ADMIN_ROLE)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(result)
    }
}
