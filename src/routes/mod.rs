mod applications;
mod auth;
mod error;
pub(crate) mod health_check;
mod producers;
mod stats;
pub(crate) mod stripe_webhook;
mod subscriptions;
mod users;

pub use applications::*;
pub use auth::*;
pub use error::*;
pub use health_check::*;
pub use producers::*;
pub use stats::*;
pub use stripe_webhook::*;
pub use subscriptions::*;
pub use users::*;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
