use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait PaymentProviderCustomerRepository {
    /// Returns the cached provider customer for the user, creating one when none exists.
    async fn find_or_create_stripe_customer_id(&self, user_id: Uuid, email: &str)
    -> Result<String>;
}
