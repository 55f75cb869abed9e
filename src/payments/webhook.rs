use crate::domain::{BillingEvent, Plan};
use chrono::NaiveDateTime;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age, in seconds, of a signed webhook payload.
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SignatureError {
    #[error("The signature header is malformed.")]
    Malformed,
    #[error("The signature timestamp is outside the tolerance window.")]
    Expired,
    #[error("No signature matches the payload.")]
    NoMatchingSignature,
}

/// Checks a `Stripe-Signature` header of the form `t=<unix>,v1=<hex>[,v1=...]`
/// against the raw request body.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &Secret<String>,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            Some(_) => {}
            None => return Err(SignatureError::Malformed),
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECONDS {
        return Err(SignatureError::Expired);
    }

    let signed_payload = format!("{}.{}", timestamp, payload);
    let matches = signatures.into_iter().any(|signature| {
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
            return false;
        };
        mac.update(signed_payload.as_bytes());
        mac.verify_slice(&signature).is_ok()
    });
    if matches {
        Ok(())
    } else {
        Err(SignatureError::NoMatchingSignature)
    }
}

#[derive(serde::Deserialize, Debug)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(serde::Deserialize, Debug)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct CheckoutSessionObject {
    client_reference_id: Option<String>,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(serde::Deserialize)]
struct InvoiceObject {
    subscription: Option<String>,
    #[serde(default)]
    lines: Option<InvoiceLines>,
}

#[derive(serde::Deserialize)]
struct InvoiceLines {
    data: Vec<InvoiceLine>,
}

#[derive(serde::Deserialize)]
struct InvoiceLine {
    period: Option<Period>,
}

#[derive(serde::Deserialize)]
struct Period {
    end: i64,
}

#[derive(serde::Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
    current_period_end: Option<i64>,
}

/// Which local subscription row a provider event refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTarget {
    Producer(i32),
    ProviderSubscription(String),
}

#[derive(Debug)]
pub struct WebhookUpdate {
    pub target: EventTarget,
    pub event: BillingEvent,
}

/// Translates a provider event into a billing transition. `Ok(None)` means
/// the event type is not one this service reacts to.
pub fn interpret_event(event: StripeEvent) -> Result<Option<WebhookUpdate>, anyhow::Error> {
    let update = match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object)?;
            let producer_id = session
                .client_reference_id
                .as_deref()
                .or_else(|| session.metadata.get("producer_id").map(String::as_str))
                .ok_or_else(|| anyhow::anyhow!("Checkout session has no producer reference."))?
                .parse::<i32>()?;
            let plan = session
                .metadata
                .get("plan")
                .map(|plan| Plan::parse(plan))
                .transpose()
                .map_err(anyhow::Error::msg)?
                .unwrap_or(Plan::Standard);
            let subscription_id = session
                .subscription
                .ok_or_else(|| anyhow::anyhow!("Checkout session has no subscription."))?;
            WebhookUpdate {
                target: EventTarget::Producer(producer_id),
                event: BillingEvent::CheckoutCompleted {
                    plan,
                    customer_id: session.customer,
                    subscription_id,
                },
            }
        }
        "invoice.payment_succeeded" | "invoice.paid" => {
            let invoice: InvoiceObject = serde_json::from_value(event.data.object)?;
            let period_end = invoice
                .lines
                .and_then(|lines| lines.data.into_iter().next())
                .and_then(|line| line.period)
                .and_then(|period| to_datetime(period.end));
            match invoice.subscription {
                Some(subscription_id) => WebhookUpdate {
                    target: EventTarget::ProviderSubscription(subscription_id),
                    event: BillingEvent::InvoicePaid { period_end },
                },
                None => return Ok(None),
            }
        }
        "invoice.payment_failed" => {
            let invoice: InvoiceObject = serde_json::from_value(event.data.object)?;
            match invoice.subscription {
                Some(subscription_id) => WebhookUpdate {
                    target: EventTarget::ProviderSubscription(subscription_id),
                    event: BillingEvent::InvoicePaymentFailed,
                },
                None => return Ok(None),
            }
        }
        "customer.subscription.updated" => {
            let subscription: SubscriptionObject = serde_json::from_value(event.data.object)?;
            WebhookUpdate {
                target: EventTarget::ProviderSubscription(subscription.id),
                event: BillingEvent::SubscriptionUpdated {
                    provider_status: subscription.status,
                    period_end: subscription.current_period_end.and_then(to_datetime),
                },
            }
        }
        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject = serde_json::from_value(event.data.object)?;
            WebhookUpdate {
                target: EventTarget::ProviderSubscription(subscription.id),
                event: BillingEvent::SubscriptionDeleted,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(update))
}

fn to_datetime(unix_seconds: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp(unix_seconds, 0).map(|d| d.naive_utc())
}
