use crate::bound_port::{port_channel, BoundPort};
use crate::catchers::*;
use crate::configuration::Settings;
use crate::database::{configure_connection, enable_wal, run_migrations};
use crate::email::Email;
use crate::payments::PaymentProvider;
use crate::routes::*;
use anyhow::anyhow;
use diesel::SqliteConnection;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::{self, AdHoc};
use rocket::{Build, Ignite, Rocket};
use rocket_sync_db_pools::database;
use secrecy::ExposeSecret;
use std::sync::Arc;

#[database("terroir")]
pub struct TerroirDbConn(SqliteConnection);

/// Public root used to build links sent by email.
pub struct ApplicationBaseUrl(pub String);

pub struct Application {
    pub server: Rocket<Ignite>,
    pub port: BoundPort,
}

impl Application {
    pub async fn build(
        configuration: &Settings,
        email_client: Arc<dyn Email>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Result<Application, anyhow::Error> {
        let (port_reporter, port) = port_channel();
        let figment = rocket::Config::figment()
            .merge(("address", configuration.application.host))
            .merge(("port", configuration.application.port.unwrap_or(0)))
            .merge((
                "secret_key",
                configuration.application.session_key.expose_secret().as_str(),
            ))
            .merge(("log_level", "off"))
            .merge((
                "limits",
                Limits::default()
                    .limit("string", configuration.application.max_body_kib.kibibytes()),
            ))
            .merge((
                "databases.terroir.url",
                configuration.database.connection_string(),
            ))
            .merge(("databases.terroir.pool_size", configuration.database.pool_size));

        let server = rocket::custom(figment)
            .attach(TerroirDbConn::fairing())
            .attach(AdHoc::try_on_ignite("Database migrations", migrate))
            .attach(port_reporter)
            .manage(email_client)
            .manage(payment_provider)
            .manage(configuration.payments.clone())
            .manage(ApplicationBaseUrl(
                configuration.application.base_url.clone(),
            ))
            .mount("/", routes![crate::routes::health_check::health_check])
            .mount(
                "/api/auth",
                routes![register, login, logout, me, forgot_password, reset_password],
            )
            .mount(
                "/api/users",
                routes![
                    get_profile,
                    update_profile,
                    change_password,
                    delete_account,
                    list_favorites,
                    add_favorite,
                    remove_favorite
                ],
            )
            .mount(
                "/api/producers",
                routes![
                    list_producers,
                    get_producer,
                    update_producer,
                    add_photo,
                    delete_photo,
                    submit_application,
                    list_pending_applications,
                    approve_application,
                    reject_application
                ],
            )
            .mount("/api/stats", routes![record_event, get_statistics])
            .mount(
                "/api/subscriptions",
                routes![my_subscription, start_checkout, cancel_subscription],
            )
            .mount("/api/stripe", routes![crate::routes::stripe_webhook::stripe_webhook])
            .register(
                "/",
                catchers![
                    bad_request,
                    unauthorized,
                    forbidden,
                    not_found,
                    unprocessable_entity_to_bad_request,
                    internal_error
                ],
            )
            .ignite()
            .await
            .map_err(|e| anyhow!("Failed to ignite the server: {}", e))?;

        Ok(Application { server, port })
    }

    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        self.server
            .launch()
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("The server stopped with an error: {}", e))
    }
}

async fn migrate(rocket: Rocket<Build>) -> fairing::Result {
    let conn = match TerroirDbConn::get_one(&rocket).await {
        Some(conn) => conn,
        None => {
            tracing::error!("No database connection available to run migrations.");
            return Err(rocket);
        }
    };
    let prepared = conn
        .run(|c| {
            enable_wal(c)?;
            configure_connection(c)?;
            run_migrations(c)
        })
        .await;
    match prepared {
        Ok(()) => Ok(rocket),
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, "Failed to migrate the database");
            Err(rocket)
        }
    }
}
