use crate::domain::{Plan, SubscriptionStatus};
use chrono::NaiveDateTime;

/// Billing state of a single producer. Every producer has exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<NaiveDateTime>,
}

/// Something that happened to a subscription, either reported by the payment
/// provider or requested by the producer.
#[derive(Debug, Clone)]
pub enum BillingEvent {
    CheckoutCompleted {
        plan: Plan,
        customer_id: Option<String>,
        subscription_id: String,
    },
    InvoicePaid {
        period_end: Option<NaiveDateTime>,
    },
    InvoicePaymentFailed,
    SubscriptionUpdated {
        provider_status: String,
        period_end: Option<NaiveDateTime>,
    },
    SubscriptionDeleted,
    CanceledByOwner,
}

impl SubscriptionState {
    pub fn free() -> SubscriptionState {
        SubscriptionState {
            plan: Plan::Free,
            status: SubscriptionStatus::Free,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: None,
        }
    }

    /// Entitlements only follow the plan while it is being paid for.
    pub fn effective_plan(&self) -> Plan {
        match self.status {
            SubscriptionStatus::Active => self.plan,
            SubscriptionStatus::Free | SubscriptionStatus::Canceled => Plan::Free,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn apply(self, event: BillingEvent) -> SubscriptionState {
        match event {
            BillingEvent::CheckoutCompleted {
                plan,
                customer_id,
                subscription_id,
            } => SubscriptionState {
                plan,
                status: SubscriptionStatus::Active,
                stripe_customer_id: customer_id.or(self.stripe_customer_id),
                stripe_subscription_id: Some(subscription_id),
                current_period_end: self.current_period_end,
            },
            BillingEvent::InvoicePaid { period_end } => SubscriptionState {
                status: SubscriptionStatus::Active,
                current_period_end: period_end.or(self.current_period_end),
                ..self
            },
            BillingEvent::InvoicePaymentFailed
            | BillingEvent::SubscriptionDeleted
            | BillingEvent::CanceledByOwner => SubscriptionState {
                status: SubscriptionStatus::Canceled,
                ..self
            },
            BillingEvent::SubscriptionUpdated {
                provider_status,
                period_end,
            } => {
                let status = match provider_status.as_str() {
                    "active" | "trialing" => SubscriptionStatus::Active,
                    "canceled" | "unpaid" | "past_due" | "incomplete_expired" => {
                        SubscriptionStatus::Canceled
                    }
                    _ => self.status,
                };
                SubscriptionState {
                    status,
                    current_period_end: period_end.or(self.current_period_end),
                    ..self
                }
            }
        }
    }
}
