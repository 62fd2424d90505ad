use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::notifications::OutboundEmail;

#[automock]
#[async_trait]
pub trait EmailGateway {
    /// Sends the email and returns the provider's message id.
    async fn send(&self, email: OutboundEmail) -> Result<String>;
}
