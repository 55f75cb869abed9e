use crate::accounts::{create_producer, producer_owned_by};
use crate::database::write_transaction;
use crate::domain::{Phone, ProducerName, UserEmail};
use crate::guards::{AdminUser, AuthenticatedUser};
use crate::models::{
    NewProducer, NewProducerApplication, Producer, ProducerApplication, APPLICATION_APPROVED,
    APPLICATION_PENDING, APPLICATION_REJECTED,
};
use crate::routes::ApiError;
use crate::startup::TerroirDbConn;
use anyhow::Context;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use rocket::response::status;
use rocket::serde::json::Json;
use uuid::Uuid;

#[derive(serde::Deserialize)]
pub struct ApplicationBody {
    farm_name: String,
    email: String,
    city: String,
    phone: Option<String>,
    description: Option<String>,
}

struct ValidApplication {
    farm_name: ProducerName,
    email: UserEmail,
    city: String,
    phone: Option<Phone>,
    description: Option<String>,
}

impl TryFrom<ApplicationBody> for ValidApplication {
    type Error = String;

    fn try_from(body: ApplicationBody) -> Result<Self, Self::Error> {
        let farm_name = ProducerName::parse(body.farm_name)?;
        let email = UserEmail::parse(body.email)?;
        let city = body.city.trim().to_string();
        if city.is_empty() {
            return Err("The city cannot be blank.".into());
        }
        let phone = body
            .phone
            .filter(|phone| !phone.trim().is_empty())
            .map(Phone::parse)
            .transpose()?;
        Ok(ValidApplication {
            farm_name,
            email,
            city,
            phone,
            description: body.description,
        })
    }
}

fn pending_application(
    conn: &mut SqliteConnection,
    application_id: i32,
) -> Result<ProducerApplication, ApiError> {
    use crate::schema::demandes_producteur;
    let application = demandes_producteur::table
        .find(application_id)
        .select(ProducerApplication::as_select())
        .first(conn)
        .optional()
        .context("Failed to load the application.")?
        .ok_or(ApiError::NotFound("Application"))?;
    if application.is_pending() {
        Ok(application)
    } else {
        Err(ApiError::Conflict(format!(
            "This application was already {}.",
            application.status
        )))
    }
}

fn mark_reviewed(
    conn: &mut SqliteConnection,
    application_id: i32,
    status: &str,
) -> Result<ProducerApplication, ApiError> {
    use crate::schema::demandes_producteur;
    diesel::update(demandes_producteur::table.find(application_id))
        .set((
            demandes_producteur::status.eq(status),
            demandes_producteur::reviewed_at.eq(Some(Utc::now().naive_utc())),
        ))
        .returning(ProducerApplication::as_returning())
        .get_result(conn)
        .context("Failed to update the application.")
        .map_err(ApiError::from)
}

#[tracing::instrument(
    name = "Submit a producer application",
    skip(user, body, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[post("/applications", data = "<body>")]
pub async fn submit_application(
    user: AuthenticatedUser,
    body: Json<ApplicationBody>,
    conn: TerroirDbConn,
) -> Result<status::Created<Json<ProducerApplication>>, ApiError> {
    let application: ValidApplication = body
        .into_inner()
        .try_into()
        .map_err(ApiError::ValidationError)?;
    let user_id = user.user_id;

    let stored = conn
        .run(move |c| -> Result<ProducerApplication, ApiError> {
            use crate::schema::demandes_producteur;
            write_transaction(c, |c| {
                if producer_owned_by(c, user_id)
                    .context("Failed to look up the user's producer.")?
                    .is_some()
                {
                    return Err(ApiError::Conflict(
                        "You already manage a producer profile.".into(),
                    ));
                }
                let pending: i64 = demandes_producteur::table
                    .filter(demandes_producteur::user_id.eq(user_id))
                    .filter(demandes_producteur::status.eq(APPLICATION_PENDING))
                    .count()
                    .get_result(c)
                    .context("Failed to count pending applications.")?;
                if pending > 0 {
                    return Err(ApiError::Conflict(
                        "An application is already awaiting review.".into(),
                    ));
                }
                let phone = application.phone.as_ref().map(|phone| phone.as_ref());
                diesel::insert_into(demandes_producteur::table)
                    .values(NewProducerApplication {
                        user_id,
                        farm_name: application.farm_name.as_ref(),
                        email: application.email.as_ref(),
                        city: &application.city,
                        phone,
                        description: application.description.as_deref(),
                        status: APPLICATION_PENDING,
                        created_at: &Utc::now().naive_utc(),
                    })
                    .returning(ProducerApplication::as_returning())
                    .get_result(c)
                    .context("Failed to store the application.")
                    .map_err(ApiError::from)
            })
        })
        .await?;

    tracing::info!(application_id = stored.id, "Producer application submitted");
    Ok(status::Created::new(format!("/api/producers/applications/{}", stored.id))
        .body(Json(stored)))
}

#[tracing::instrument(
    name = "List pending applications",
    skip(_admin, conn),
    fields(request_id = %Uuid::new_v4())
)]
#[get("/applications")]
pub async fn list_pending_applications(
    _admin: AdminUser,
    conn: TerroirDbConn,
) -> Result<Json<Vec<ProducerApplication>>, ApiError> {
    let applications = conn
        .run(|c| {
            use crate::schema::demandes_producteur;
            demandes_producteur::table
                .filter(demandes_producteur::status.eq(APPLICATION_PENDING))
                .order(demandes_producteur::created_at.asc())
                .select(ProducerApplication::as_select())
                .load(c)
        })
        .await
        .context("Failed to list pending applications.")?;
    Ok(Json(applications))
}

#[tracing::instrument(
    name = "Approve a producer application",
    skip(admin, conn),
    fields(request_id = %Uuid::new_v4(), admin_id = %admin.0.user_id)
)]
#[post("/applications/<application_id>/approve")]
pub async fn approve_application(
    admin: AdminUser,
    application_id: i32,
    conn: TerroirDbConn,
) -> Result<status::Created<Json<Producer>>, ApiError> {
    let producer = conn
        .run(move |c| -> Result<Producer, ApiError> {
            write_transaction(c, |c| {
                let application = pending_application(c, application_id)?;
                if producer_owned_by(c, application.user_id)
                    .context("Failed to look up the applicant's producer.")?
                    .is_some()
                {
                    return Err(ApiError::Conflict(
                        "The applicant already manages a producer profile.".into(),
                    ));
                }
                let producer = create_producer(
                    c,
                    &NewProducer {
                        name: &application.farm_name,
                        email: &application.email,
                        city: &application.city,
                        description: application.description.as_deref(),
                        phone: application.phone.as_deref(),
                        user_id: Some(application.user_id),
                        created_at: &Utc::now().naive_utc(),
                    },
                )
                .context("Failed to create the producer.")?;
                mark_reviewed(c, application_id, APPLICATION_APPROVED)?;
                Ok(producer)
            })
        })
        .await?;

    tracing::info!(producer_id = producer.id, "Producer application approved");
    Ok(status::Created::new(format!("/api/producers/{}", producer.id)).body(Json(producer)))
}

#[tracing::instrument(
    name = "Reject a producer application",
    skip(admin, conn),
    fields(request_id = %Uuid::new_v4(), admin_id = %admin.0.user_id)
)]
#[post("/applications/<application_id>/reject")]
pub async fn reject_application(
    admin: AdminUser,
    application_id: i32,
    conn: TerroirDbConn,
) -> Result<Json<ProducerApplication>, ApiError> {
    conn.run(move |c| -> Result<ProducerApplication, ApiError> {
        write_transaction(c, |c| {
            pending_application(c, application_id)?;
            mark_reviewed(c, application_id, APPLICATION_REJECTED)
        })
    })
    .await
    .map(Json)
}
