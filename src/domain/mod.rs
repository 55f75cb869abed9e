mod coordinates;
mod password;
mod phone;
mod plan;
mod producer_name;
mod subscription_state;
mod user_email;

pub use coordinates::Coordinates;
pub use password::Password;
pub use phone::Phone;
pub use plan::{Plan, SubscriptionStatus};
pub use producer_name::ProducerName;
pub use subscription_state::{BillingEvent, SubscriptionState};
pub use user_email::UserEmail;
