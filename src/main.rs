use anyhow::Context;
use std::sync::Arc;
use terroir::configuration::get_configuration;
use terroir::email::SesEmailClient;
use terroir::payments::StripeClient;
use terroir::startup::Application;
use terroir::telemetry::{get_subscriber, init_subscriber};

#[rocket::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("terroir".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber)?;

    let configuration = get_configuration().context("Failed to read configuration.")?;
    let email_client = SesEmailClient::from_settings(&configuration.email_client).await?;
    let payment_provider = StripeClient::from_settings(&configuration.payments)
        .context("Failed to build the payment provider client.")?;

    let application = Application::build(
        &configuration,
        Arc::new(email_client),
        Arc::new(payment_provider),
    )
    .await?;
    application.run_until_stopped().await
}
