use crate::configuration::PaymentSettings;
use crate::payments::{CheckoutRequest, CheckoutSession, PaymentProvider};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

pub struct StripeClient {
    http_client: Client,
    base_url: String,
    secret_key: Secret<String>,
}

#[derive(serde::Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeClient {
    pub fn new(
        base_url: String,
        secret_key: Secret<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            secret_key,
        })
    }

    pub fn from_settings(settings: &PaymentSettings) -> Result<Self, reqwest::Error> {
        Self::new(
            settings.api_base_url.clone(),
            settings.secret_key.clone(),
            settings.timeout(),
        )
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[tracing::instrument(
        name = "Create a Stripe checkout session",
        skip(self, request),
        fields(producer_id = %request.producer_id, plan = %request.plan.as_str())
    )]
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, anyhow::Error> {
        let producer_id = request.producer_id.to_string();
        let mut form = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("client_reference_id", producer_id.clone()),
            ("metadata[producer_id]", producer_id.clone()),
            ("metadata[plan]", request.plan.as_str().to_string()),
            ("subscription_data[metadata][producer_id]", producer_id),
        ];
        match request.customer_id {
            Some(customer_id) => form.push(("customer", customer_id)),
            None => form.push(("customer_email", request.customer_email)),
        }

        let session = self
            .http_client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await
            .context("Failed to reach Stripe.")?
            .error_for_status()
            .context("Stripe rejected the checkout session.")?
            .json::<CheckoutSessionResponse>()
            .await
            .context("Failed to decode the checkout session returned by Stripe.")?;

        let url = session
            .url
            .context("Stripe returned a checkout session without a URL.")?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    #[tracing::instrument(name = "Cancel a Stripe subscription", skip(self))]
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), anyhow::Error> {
        self.http_client
            .delete(format!("{}/v1/subscriptions/{}", self.base_url, subscription_id))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .context("Failed to reach Stripe.")?
            .error_for_status()
            .context("Stripe refused to cancel the subscription.")?;
        Ok(())
    }
}
