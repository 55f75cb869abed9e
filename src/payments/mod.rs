mod stripe_client;
mod webhook;

use crate::domain::Plan;
use async_trait::async_trait;
pub use stripe_client::StripeClient;
pub use webhook::*;

pub struct CheckoutRequest {
    pub producer_id: i32,
    pub plan: Plan,
    pub price_id: String,
    pub customer_email: String,
    pub customer_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Hosted payment processor. Subscriptions are activated asynchronously by
/// webhook, never by the checkout call itself.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, anyhow::Error>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), anyhow::Error>;
}
