use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payment_provider_customers;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_provider_customers)]
pub struct InsertPaymentProviderCustomerEntity {
    pub user_id: Uuid,
    pub provider: String,
    pub customer_ref: String,
    pub metadata: serde_json::Value,
}
