use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_provider_customers},
    payments::stripe_client::StripeClient,
};
use domain::{
    entities::payment_provider_customers::InsertPaymentProviderCustomerEntity,
    repositories::payment_provider_customers::PaymentProviderCustomerRepository,
};

const STRIPE_PROVIDER: &str = "stripe";

pub struct PaymentProviderCustomerPostgres {
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
}

impl PaymentProviderCustomerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Self {
        Self {
            db_pool,
            stripe_client,
        }
    }
}

#[async_trait]
impl PaymentProviderCustomerRepository for PaymentProviderCustomerPostgres {
    async fn find_or_create_stripe_customer_id(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<String> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        if let Some(existing) = payment_provider_customers::table
            .filter(payment_provider_customers::user_id.eq(user_id))
            .filter(payment_provider_customers::provider.eq(STRIPE_PROVIDER))
            .select(payment_provider_customers::customer_ref)
            .first::<String>(&mut conn)
            .optional()?
        {
            return Ok(existing);
        }

        let (customer_ref, source) =
            match self.stripe_client.find_customer_by_email(email).await? {
                Some(found) => (found, "lookup"),
                None => (
                    self.stripe_client.create_customer(email, user_id).await?,
                    "created",
                ),
            };

        info!(
            %user_id,
            customer_ref = %customer_ref,
            source,
            "payments: caching stripe customer"
        );

        let insert_entity = InsertPaymentProviderCustomerEntity {
            user_id,
            provider: STRIPE_PROVIDER.to_string(),
            customer_ref: customer_ref.clone(),
            metadata: json!({ "email": email, "source": source }),
        };

        insert_into(payment_provider_customers::table)
            .values(&insert_entity)
            .execute(&mut conn)?;

        Ok(customer_ref)
    }
}
