use crate::billing::{apply_billing_event, producer_for_provider_subscription};
use crate::configuration::PaymentSettings;
use crate::database::write_transaction;
use crate::guards::StripeSignature;
use crate::payments::{interpret_event, verify_signature, EventTarget, StripeEvent};
use crate::routes::ApiError;
use crate::startup::TerroirDbConn;
use anyhow::Context;
use chrono::Utc;
use diesel::prelude::*;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

#[derive(serde::Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[tracing::instrument(
    name = "Handle a payment provider webhook",
    skip(signature, payload, settings, conn),
    fields(
        request_id = %Uuid::new_v4(),
        event_id = tracing::field::Empty,
        event_type = tracing::field::Empty
    )
)]
#[post("/webhook", data = "<payload>")]
pub async fn stripe_webhook(
    signature: StripeSignature,
    payload: String,
    settings: &State<PaymentSettings>,
    conn: TerroirDbConn,
) -> Result<Json<WebhookAck>, ApiError> {
    verify_signature(
        &payload,
        &signature.0,
        &settings.webhook_secret,
        Utc::now().timestamp(),
    )
    .map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let event: StripeEvent = serde_json::from_str(&payload)
        .map_err(|_| ApiError::ValidationError("The event payload is malformed.".into()))?;
    let span = tracing::Span::current();
    span.record("event_id", &tracing::field::display(&event.id));
    span.record("event_type", &tracing::field::display(&event.event_type));

    let update = match interpret_event(event) {
        Ok(Some(update)) => update,
        Ok(None) => {
            tracing::debug!("Ignoring an event type this service does not handle");
            return Ok(Json(WebhookAck { received: true }));
        }
        Err(e) => {
            tracing::warn!(error.cause_chain = ?e, "Failed to interpret the event");
            return Err(ApiError::ValidationError(
                "The event payload is malformed.".into(),
            ));
        }
    };

    let target = update.target.clone();
    let applied = conn
        .run(move |c| -> Result<Option<i32>, anyhow::Error> {
            write_transaction(c, |c| {
                use crate::schema::producteurs;
                let producer_id = match &update.target {
                    EventTarget::Producer(producer_id) => producteurs::table
                        .find(*producer_id)
                        .select(producteurs::id)
                        .first::<i32>(c)
                        .optional()
                        .context("Failed to look up the producer.")?,
                    EventTarget::ProviderSubscription(subscription_id) => {
                        producer_for_provider_subscription(c, subscription_id)
                            .context("Failed to look up the subscription.")?
                    }
                };
                match producer_id {
                    Some(producer_id) => {
                        apply_billing_event(c, producer_id, update.event)?;
                        Ok(Some(producer_id))
                    }
                    None => Ok(None),
                }
            })
        })
        .await?;

    match applied {
        Some(producer_id) => tracing::info!(producer_id, "Subscription updated from webhook"),
        None => tracing::warn!(?target, "Event refers to an unknown subscription"),
    }
    Ok(Json(WebhookAck { received: true }))
}
