use crate::domain::{Plan, SubscriptionState, SubscriptionStatus};
use crate::schema::subscriptions;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Subscription {
    pub producer_id: i32,
    pub plan: String,
    pub status: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<Subscription> for SubscriptionState {
    type Error = String;

    fn try_from(row: Subscription) -> Result<Self, Self::Error> {
        Ok(SubscriptionState {
            plan: Plan::parse(&row.plan)?,
            status: SubscriptionStatus::parse(&row.status)?,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            current_period_end: row.current_period_end,
        })
    }
}

/// Full row image written on insert and on every transition. Cleared
/// provider ids are written as NULL.
#[derive(Insertable, AsChangeset)]
#[diesel(table_name = subscriptions)]
#[diesel(treat_none_as_null = true)]
pub struct SubscriptionRecord<'a> {
    pub producer_id: i32,
    pub plan: &'a str,
    pub status: &'a str,
    pub stripe_customer_id: Option<&'a str>,
    pub stripe_subscription_id: Option<&'a str>,
    pub current_period_end: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl<'a> SubscriptionRecord<'a> {
    pub fn new(
        producer_id: i32,
        state: &'a SubscriptionState,
        updated_at: NaiveDateTime,
    ) -> SubscriptionRecord<'a> {
        SubscriptionRecord {
            producer_id,
            plan: state.plan.as_str(),
            status: state.status.as_str(),
            stripe_customer_id: state.stripe_customer_id.as_deref(),
            stripe_subscription_id: state.stripe_subscription_id.as_deref(),
            current_period_end: state.current_period_end,
            updated_at,
        }
    }
}
