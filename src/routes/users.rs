use crate::accounts::{delete_user_cascade, find_user, find_user_by_email, producer_owned_by};
use crate::authentication::{compute_password_hash, verify_password, AuthError};
use crate::billing::load_subscription;
use crate::database::write_transaction;
use crate::domain::{Password, Phone, UserEmail};
use crate::guards::{close_session, AuthenticatedUser};
use crate::models::{NewFavorite, Producer, UserChangeset};
use crate::payments::PaymentProvider;
use crate::routes::{load_user_view, ApiError, ProducerRow, ProducerSummary, UserView};
use crate::startup::TerroirDbConn;
use anyhow::Context;
use chrono::Utc;
use diesel::prelude::*;
use rocket::http::{CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;
use secrecy::Secret;
use std::sync::Arc;
use uuid::Uuid;

#[derive(serde::Deserialize)]
pub struct ProfileUpdate {
    email: Option<String>,
    phone: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct PasswordChange {
    current_password: Secret<String>,
    new_password: Secret<String>,
}

impl TryFrom<ProfileUpdate> for UserChangeset {
    type Error = String;

    fn try_from(update: ProfileUpdate) -> Result<Self, Self::Error> {
        let email = update
            .email
            .map(UserEmail::parse)
            .transpose()?
            .map(|email| email.as_ref().to_string());
        let phone = update
            .phone
            .map(Phone::parse)
            .transpose()?
            .map(|phone| phone.as_ref().to_string());
        Ok(UserChangeset { email, phone })
    }
}

#[tracing::instrument(
    name = "Fetch own profile",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[get("/me")]
pub async fn get_profile(
    user: AuthenticatedUser,
    conn: TerroirDbConn,
) -> Result<Json<UserView>, ApiError> {
    load_user_view(&conn, user.user_id).await.map(Json)
}

#[tracing::instrument(
    name = "Update own profile",
    skip(user, body, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[put("/me", data = "<body>")]
pub async fn update_profile(
    user: AuthenticatedUser,
    body: Json<ProfileUpdate>,
    conn: TerroirDbConn,
) -> Result<Json<UserView>, ApiError> {
    let changeset: UserChangeset = body
        .into_inner()
        .try_into()
        .map_err(ApiError::ValidationError)?;
    let user_id = user.user_id;

    let updated = conn
        .run(move |c| -> QueryResult<bool> {
            use crate::schema::utilisateurs;
            write_transaction(c, |c| {
                if let Some(email) = &changeset.email {
                    let taken = find_user_by_email(c, email)?
                        .map(|other| other.id != user_id)
                        .unwrap_or(false);
                    if taken {
                        return Ok(false);
                    }
                }
                if changeset.email.is_some() || changeset.phone.is_some() {
                    diesel::update(utilisateurs::table.find(user_id))
                        .set(&changeset)
                        .execute(c)?;
                }
                Ok(true)
            })
        })
        .await
        .context("Failed to update the profile.")?;

    if !updated {
        return Err(ApiError::Conflict(
            "This email is already registered.".into(),
        ));
    }
    load_user_view(&conn, user_id).await.map(Json)
}

#[tracing::instrument(
    name = "Change own password",
    skip(user, body, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[put("/me/password", data = "<body>")]
pub async fn change_password(
    user: AuthenticatedUser,
    body: Json<PasswordChange>,
    conn: TerroirDbConn,
) -> Result<Status, ApiError> {
    let PasswordChange {
        current_password,
        new_password,
    } = body.into_inner();
    let new_password = Password::parse(new_password).map_err(ApiError::ValidationError)?;
    let user_id = user.user_id;

    let stored = conn
        .run(move |c| find_user(c, user_id))
        .await
        .context("Failed to load the user.")?
        .ok_or(ApiError::NotFound("User"))?;
    verify_password(Some(stored.password_hash), current_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials(e) => ApiError::AuthError(e),
            AuthError::UnexpectedError(e) => ApiError::UnexpectedError(e),
        })?;

    let password_hash = compute_password_hash(new_password).await?;
    conn.run(move |c| {
        use crate::schema::utilisateurs;
        write_transaction(c, |c| {
            diesel::update(utilisateurs::table.find(user_id))
                .set(utilisateurs::password_hash.eq(password_hash))
                .execute(c)
        })
    })
    .await
    .context("Failed to store the new password.")?;
    Ok(Status::NoContent)
}

#[tracing::instrument(
    name = "Delete own account",
    skip(user, conn, cookies, payment_provider),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[delete("/me")]
pub async fn delete_account(
    user: AuthenticatedUser,
    conn: TerroirDbConn,
    cookies: &CookieJar<'_>,
    payment_provider: &State<Arc<dyn PaymentProvider>>,
) -> Result<Status, ApiError> {
    let user_id = user.user_id;
    let subscription = conn
        .run(move |c| -> Result<_, anyhow::Error> {
            match producer_owned_by(c, user_id)? {
                Some(producer) => load_subscription(c, producer.id),
                None => Ok(None),
            }
        })
        .await?;

    // Stop billing before the rows that track it disappear.
    if let Some(state) = subscription.filter(|state| state.is_active()) {
        if let Some(subscription_id) = state.stripe_subscription_id.as_deref() {
            payment_provider
                .cancel_subscription(subscription_id)
                .await
                .context("Failed to cancel the subscription before deleting the account.")?;
        }
    }

    conn.run(move |c| write_transaction(c, |c| delete_user_cascade(c, user_id)))
        .await
        .context("Failed to delete the account.")?;
    close_session(cookies);
    tracing::info!(user_id, "Account deleted");
    Ok(Status::NoContent)
}

#[tracing::instrument(
    name = "List favorites",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[get("/me/favorites")]
pub async fn list_favorites(
    user: AuthenticatedUser,
    conn: TerroirDbConn,
) -> Result<Json<Vec<ProducerSummary>>, ApiError> {
    let user_id = user.user_id;
    let favorites = conn
        .run(move |c| -> Result<Vec<ProducerSummary>, anyhow::Error> {
            use crate::schema::{favoris, producteurs, subscriptions};
            let rows: Vec<ProducerRow> = favoris::table
                .inner_join(producteurs::table)
                .left_join(subscriptions::table.on(subscriptions::producer_id.eq(producteurs::id)))
                .filter(favoris::user_id.eq(user_id))
                .order(favoris::created_at.desc())
                .select((
                    Producer::as_select(),
                    subscriptions::plan.nullable(),
                    subscriptions::status.nullable(),
                ))
                .load(c)
                .context("Failed to load favorites.")?;
            Ok(rows.into_iter().map(ProducerSummary::from_row).collect())
        })
        .await?;
    Ok(Json(favorites))
}

#[tracing::instrument(
    name = "Add a favorite",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[put("/me/favorites/<producer_id>")]
pub async fn add_favorite(
    user: AuthenticatedUser,
    producer_id: i32,
    conn: TerroirDbConn,
) -> Result<Status, ApiError> {
    let user_id = user.user_id;
    let found = conn
        .run(move |c| -> QueryResult<bool> {
            use crate::schema::{favoris, producteurs};
            write_transaction(c, |c| {
                let exists = producteurs::table
                    .find(producer_id)
                    .count()
                    .get_result::<i64>(c)?
                    > 0;
                if !exists {
                    return Ok(false);
                }
                diesel::insert_or_ignore_into(favoris::table)
                    .values(NewFavorite {
                        user_id,
                        producer_id,
                        created_at: &Utc::now().naive_utc(),
                    })
                    .execute(c)?;
                Ok(true)
            })
        })
        .await
        .context("Failed to store the favorite.")?;
    if found {
        Ok(Status::NoContent)
    } else {
        Err(ApiError::NotFound("Producer"))
    }
}

#[tracing::instrument(
    name = "Remove a favorite",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[delete("/me/favorites/<producer_id>")]
pub async fn remove_favorite(
    user: AuthenticatedUser,
    producer_id: i32,
    conn: TerroirDbConn,
) -> Result<Status, ApiError> {
    let user_id = user.user_id;
    conn.run(move |c| {
        use crate::schema::favoris;
        write_transaction(c, |c| {
            diesel::delete(favoris::table.find((user_id, producer_id))).execute(c)
        })
    })
    .await
    .context("Failed to remove the favorite.")?;
    Ok(Status::NoContent)
}
