use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::user_messages;

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = user_messages)]
pub struct InsertUserMessageEntity {
    pub sender_id: Option<Uuid>,
    pub kind: String,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}
