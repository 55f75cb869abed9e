use crate::accounts::producer_owned_by;
use crate::billing::{apply_billing_event, load_subscription};
use crate::configuration::PaymentSettings;
use crate::database::write_transaction;
use crate::domain::{BillingEvent, Plan, SubscriptionState, SubscriptionStatus};
use crate::guards::AuthenticatedUser;
use crate::payments::{CheckoutRequest, PaymentProvider};
use crate::routes::ApiError;
use crate::startup::TerroirDbConn;
use anyhow::Context;
use chrono::NaiveDateTime;
use rocket::serde::json::Json;
use rocket::State;
use std::sync::Arc;
use uuid::Uuid;

#[derive(serde::Serialize, Debug)]
pub struct SubscriptionView {
    pub producer_id: i32,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub effective_plan: Plan,
    pub current_period_end: Option<NaiveDateTime>,
}

impl SubscriptionView {
    fn new(producer_id: i32, state: &SubscriptionState) -> Self {
        SubscriptionView {
            producer_id,
            plan: state.plan,
            status: state.status,
            effective_plan: state.effective_plan(),
            current_period_end: state.current_period_end,
        }
    }
}

#[derive(serde::Deserialize)]
pub struct CheckoutBody {
    plan: String,
}

#[derive(serde::Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// The caller's producer and its current subscription state.
async fn owned_subscription(
    conn: &TerroirDbConn,
    user_id: i32,
) -> Result<(i32, SubscriptionState), ApiError> {
    conn.run(move |c| -> Result<Option<(i32, SubscriptionState)>, anyhow::Error> {
        let producer = match producer_owned_by(c, user_id)
            .context("Failed to look up the user's producer.")?
        {
            Some(producer) => producer,
            None => return Ok(None),
        };
        let state = load_subscription(c, producer.id)?.unwrap_or_else(SubscriptionState::free);
        Ok(Some((producer.id, state)))
    })
    .await?
    .ok_or(ApiError::NotFound("Producer"))
}

#[tracing::instrument(
    name = "Fetch own subscription",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[get("/me")]
pub async fn my_subscription(
    user: AuthenticatedUser,
    conn: TerroirDbConn,
) -> Result<Json<SubscriptionView>, ApiError> {
    let (producer_id, state) = owned_subscription(&conn, user.user_id).await?;
    Ok(Json(SubscriptionView::new(producer_id, &state)))
}

#[tracing::instrument(
    name = "Start a subscription checkout",
    skip(user, body, conn, payment_provider, settings),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id, plan = %body.plan)
)]
#[post("/checkout", data = "<body>")]
pub async fn start_checkout(
    user: AuthenticatedUser,
    body: Json<CheckoutBody>,
    conn: TerroirDbConn,
    payment_provider: &State<Arc<dyn PaymentProvider>>,
    settings: &State<PaymentSettings>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let plan = Plan::parse(&body.plan).map_err(ApiError::ValidationError)?;
    let price_id = settings
        .price_for(plan)
        .ok_or_else(|| {
            ApiError::ValidationError(format!("The {} plan cannot be purchased.", plan.as_str()))
        })?
        .to_string();

    let (producer_id, state) = owned_subscription(&conn, user.user_id).await?;
    if state.is_active() {
        return Err(ApiError::Conflict(
            "This producer already has an active subscription.".into(),
        ));
    }

    let session = payment_provider
        .create_checkout_session(CheckoutRequest {
            producer_id,
            plan,
            price_id,
            customer_email: user.email.clone(),
            customer_id: state.stripe_customer_id,
            success_url: settings.success_url.clone(),
            cancel_url: settings.cancel_url.clone(),
        })
        .await
        .context("Failed to create a checkout session.")?;

    tracing::info!(producer_id, session_id = %session.id, "Checkout session created");
    Ok(Json(CheckoutResponse { url: session.url }))
}

#[tracing::instrument(
    name = "Cancel own subscription",
    skip(user, conn, payment_provider),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[post("/cancel")]
pub async fn cancel_subscription(
    user: AuthenticatedUser,
    conn: TerroirDbConn,
    payment_provider: &State<Arc<dyn PaymentProvider>>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let (producer_id, state) = owned_subscription(&conn, user.user_id).await?;
    if !state.is_active() {
        return Err(ApiError::Conflict(
            "There is no active subscription to cancel.".into(),
        ));
    }

    if let Some(subscription_id) = state.stripe_subscription_id.as_deref() {
        payment_provider
            .cancel_subscription(subscription_id)
            .await
            .context("Failed to cancel the subscription with the payment provider.")?;
    }

    let state = conn
        .run(move |c| {
            write_transaction(c, |c| {
                apply_billing_event(c, producer_id, BillingEvent::CanceledByOwner)
            })
        })
        .await?;
    tracing::info!(producer_id, "Subscription canceled by its owner");
    Ok(Json(SubscriptionView::new(producer_id, &state)))
}
