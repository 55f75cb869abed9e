//! Persistence of the per-producer subscription state.

use crate::domain::{BillingEvent, SubscriptionState};
use crate::models::{Subscription, SubscriptionRecord};
use anyhow::Context;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;

pub fn load_subscription(
    conn: &mut SqliteConnection,
    producer_id: i32,
) -> Result<Option<SubscriptionState>, anyhow::Error> {
    use crate::schema::subscriptions;
    let row = subscriptions::table
        .find(producer_id)
        .select(Subscription::as_select())
        .first(conn)
        .optional()
        .context("Failed to load the subscription.")?;
    row.map(SubscriptionState::try_from)
        .transpose()
        .map_err(anyhow::Error::msg)
}

/// Finds the producer whose row carries a given provider subscription id.
pub fn producer_for_provider_subscription(
    conn: &mut SqliteConnection,
    subscription_id: &str,
) -> QueryResult<Option<i32>> {
    use crate::schema::subscriptions;
    subscriptions::table
        .filter(subscriptions::stripe_subscription_id.eq(subscription_id))
        .select(subscriptions::producer_id)
        .first(conn)
        .optional()
}

/// Writes the state, creating the row if the producer has none yet.
pub fn save_subscription(
    conn: &mut SqliteConnection,
    producer_id: i32,
    state: &SubscriptionState,
) -> QueryResult<()> {
    use crate::schema::subscriptions;
    let record = SubscriptionRecord::new(producer_id, state, Utc::now().naive_utc());
    diesel::insert_into(subscriptions::table)
        .values(&record)
        .on_conflict(subscriptions::producer_id)
        .do_update()
        .set(&record)
        .execute(conn)?;
    Ok(())
}

/// Applies a billing event to a producer's subscription and stores the
/// result. A producer without a row starts from the free state.
#[tracing::instrument(name = "Apply a billing event", skip(conn))]
pub fn apply_billing_event(
    conn: &mut SqliteConnection,
    producer_id: i32,
    event: BillingEvent,
) -> Result<SubscriptionState, anyhow::Error> {
    conn.transaction(|conn| {
        let current = load_subscription(conn, producer_id)?.unwrap_or_else(SubscriptionState::free);
        let next = current.apply(event);
        save_subscription(conn, producer_id, &next)
            .context("Failed to store the subscription.")?;
        Ok(next)
    })
}
