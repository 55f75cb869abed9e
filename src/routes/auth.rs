use crate::accounts::{find_user, find_user_by_email, producer_owned_by};
use crate::authentication::{compute_password_hash, generate_reset_token, verify_password, AuthError};
use crate::database::write_transaction;
use crate::domain::{Password, Phone, UserEmail};
use crate::email::Email;
use crate::guards::{close_session, open_session, AuthenticatedUser};
use crate::models::{NewResetToken, NewUser, ResetToken, User};
use crate::routes::ApiError;
use crate::startup::{ApplicationBaseUrl, TerroirDbConn};
use anyhow::Context;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use rocket::http::{CookieJar, Status};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use secrecy::Secret;
use std::sync::Arc;
use uuid::Uuid;

const RESET_TOKEN_VALIDITY_MINUTES: i64 = 60;

#[derive(serde::Deserialize)]
pub struct RegisterBody {
    email: String,
    password: Secret<String>,
    phone: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct LoginBody {
    email: String,
    password: Secret<String>,
}

#[derive(serde::Deserialize)]
pub struct ForgotPasswordBody {
    email: String,
}

#[derive(serde::Deserialize)]
pub struct ResetPasswordBody {
    token: String,
    password: Secret<String>,
}

#[derive(serde::Serialize)]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub producer_id: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
}

impl UserView {
    pub fn new(user: User, producer_id: Option<i32>) -> Self {
        UserView {
            id: user.id,
            email: user.email,
            phone: user.phone,
            is_admin: user.is_admin,
            producer_id,
            created_at: user.created_at,
        }
    }
}

struct NewAccount {
    email: UserEmail,
    password: Password,
    phone: Option<Phone>,
}

impl TryFrom<RegisterBody> for NewAccount {
    type Error = String;

    fn try_from(body: RegisterBody) -> Result<Self, Self::Error> {
        let email = UserEmail::parse(body.email)?;
        let password = Password::parse(body.password)?;
        let phone = body
            .phone
            .filter(|phone| !phone.trim().is_empty())
            .map(Phone::parse)
            .transpose()?;
        Ok(NewAccount {
            email,
            password,
            phone,
        })
    }
}

/// Loads a user and the id of the producer they own, if any.
pub(crate) async fn load_user_view(
    conn: &TerroirDbConn,
    user_id: i32,
) -> Result<UserView, ApiError> {
    conn.run(move |c| -> QueryResult<Option<UserView>> {
        let user = match find_user(c, user_id)? {
            Some(user) => user,
            None => return Ok(None),
        };
        let producer_id = producer_owned_by(c, user_id)?.map(|producer| producer.id);
        Ok(Some(UserView::new(user, producer_id)))
    })
    .await
    .context("Failed to load the user.")?
    .ok_or(ApiError::NotFound("User"))
}

#[tracing::instrument(
    name = "Register a new user",
    skip(body, conn, cookies),
    fields(request_id = %Uuid::new_v4(), user_email = %body.email)
)]
#[post("/register", data = "<body>")]
pub async fn register(
    body: Json<RegisterBody>,
    conn: TerroirDbConn,
    cookies: &CookieJar<'_>,
) -> Result<status::Created<Json<UserView>>, ApiError> {
    let account: NewAccount = body
        .into_inner()
        .try_into()
        .map_err(ApiError::ValidationError)?;
    let password_hash = compute_password_hash(account.password).await?;

    let email = account.email.as_ref().to_string();
    let phone = account.phone.map(|phone| phone.as_ref().to_string());
    let user = conn
        .run(move |c| -> QueryResult<Option<User>> {
            use crate::schema::utilisateurs;
            write_transaction(c, |c| {
                if find_user_by_email(c, &email)?.is_some() {
                    return Ok(None);
                }
                let now = Utc::now().naive_utc();
                diesel::insert_into(utilisateurs::table)
                    .values(NewUser {
                        email: &email,
                        password_hash: &password_hash,
                        phone: phone.as_deref(),
                        is_admin: false,
                        created_at: &now,
                    })
                    .returning(User::as_returning())
                    .get_result(c)
                    .map(Some)
            })
        })
        .await
        .context("Failed to store the new user.")?
        .ok_or_else(|| ApiError::Conflict("This email is already registered.".into()))?;

    open_session(cookies, user.id);
    tracing::info!(user_id = user.id, "User registered");
    Ok(status::Created::new(format!("/api/users/{}", user.id))
        .body(Json(UserView::new(user, None))))
}

#[tracing::instrument(
    name = "Log a user in",
    skip(body, conn, cookies),
    fields(request_id = %Uuid::new_v4(), user_email = %body.email)
)]
#[post("/login", data = "<body>")]
pub async fn login(
    body: Json<LoginBody>,
    conn: TerroirDbConn,
    cookies: &CookieJar<'_>,
) -> Result<Json<UserView>, ApiError> {
    let LoginBody { email, password } = body.into_inner();
    let email = email.trim().to_lowercase();
    let user = conn
        .run(move |c| find_user_by_email(c, &email))
        .await
        .context("Failed to look the user up.")?;

    let expected_hash = user.as_ref().map(|user| user.password_hash.clone());
    verify_password(expected_hash, password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials(e) => ApiError::AuthError(e),
            AuthError::UnexpectedError(e) => ApiError::UnexpectedError(e),
        })?;

    // verify_password only succeeds for a known account
    let user = user.ok_or_else(|| ApiError::AuthError(anyhow::anyhow!("Unknown email.")))?;
    open_session(cookies, user.id);
    tracing::info!(user_id = user.id, "User logged in");
    load_user_view(&conn, user.id).await.map(Json)
}

#[post("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    close_session(cookies);
    Status::NoContent
}

#[tracing::instrument(
    name = "Describe the session user",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[get("/me")]
pub async fn me(user: AuthenticatedUser, conn: TerroirDbConn) -> Result<Json<UserView>, ApiError> {
    load_user_view(&conn, user.user_id).await.map(Json)
}

#[tracing::instrument(
    name = "Request a password reset",
    skip(body, conn, email_client, base_url),
    fields(request_id = %Uuid::new_v4())
)]
#[post("/forgot-password", data = "<body>")]
pub async fn forgot_password(
    body: Json<ForgotPasswordBody>,
    conn: TerroirDbConn,
    email_client: &State<Arc<dyn Email>>,
    base_url: &State<ApplicationBaseUrl>,
) -> Result<Status, ApiError> {
    // Unknown or invalid addresses get the same answer as known ones.
    let email = match UserEmail::parse(body.into_inner().email) {
        Ok(email) => email,
        Err(_) => return Ok(Status::Accepted),
    };

    let lookup = email.as_ref().to_string();
    let token = generate_reset_token();
    let stored_token = token.clone();
    let stored = conn
        .run(move |c| -> QueryResult<bool> {
            use crate::schema::reset_tokens;
            write_transaction(c, |c| {
                let user = match find_user_by_email(c, &lookup)? {
                    Some(user) => user,
                    None => return Ok(false),
                };
                let expires_at =
                    Utc::now().naive_utc() + Duration::minutes(RESET_TOKEN_VALIDITY_MINUTES);
                diesel::insert_into(reset_tokens::table)
                    .values(NewResetToken {
                        token: &stored_token,
                        user_id: user.id,
                        expires_at: &expires_at,
                        used: false,
                    })
                    .execute(c)?;
                Ok(true)
            })
        })
        .await
        .context("Failed to store the reset token.")?;

    // A delivery failure must not tell known addresses apart from unknown ones.
    if stored {
        if let Err(e) = send_reset_email(email_client, &email, &base_url.0, &token).await {
            tracing::error!(error.cause_chain = ?e, "Failed to send the password reset email");
        }
    }
    Ok(Status::Accepted)
}

#[tracing::instrument(name = "Send a password reset email", skip(email_client, base_url, token))]
async fn send_reset_email(
    email_client: &State<Arc<dyn Email>>,
    recipient: &UserEmail,
    base_url: &str,
    token: &str,
) -> Result<(), anyhow::Error> {
    let reset_link = format!("{}/reset-password?token={}", base_url, token);
    let html_body = format!(
        "Bonjour,<br />\
        Click <a href=\"{}\">here</a> to choose a new password. \
        The link expires in one hour.",
        reset_link
    );
    let plain_body = format!(
        "Bonjour,\nVisit {} to choose a new password. The link expires in one hour.",
        reset_link
    );
    email_client
        .send_email(recipient, "Reset your password", &html_body, &plain_body)
        .await
}

#[tracing::instrument(
    name = "Reset a password",
    skip(body, conn),
    fields(request_id = %Uuid::new_v4())
)]
#[post("/reset-password", data = "<body>")]
pub async fn reset_password(
    body: Json<ResetPasswordBody>,
    conn: TerroirDbConn,
) -> Result<Status, ApiError> {
    let ResetPasswordBody { token, password } = body.into_inner();
    let password = Password::parse(password).map_err(ApiError::ValidationError)?;
    let password_hash = compute_password_hash(password).await?;

    let reset = conn
        .run(move |c| -> QueryResult<bool> {
            use crate::schema::{reset_tokens, utilisateurs};
            write_transaction(c, |c| {
                let stored = reset_tokens::table
                    .find(&token)
                    .select(ResetToken::as_select())
                    .first(c)
                    .optional()?;
                let stored = match stored {
                    Some(stored) if stored.is_usable_at(Utc::now().naive_utc()) => stored,
                    _ => return Ok(false),
                };
                diesel::update(reset_tokens::table.find(&token))
                    .set(reset_tokens::used.eq(true))
                    .execute(c)?;
                diesel::update(utilisateurs::table.find(stored.user_id))
                    .set(utilisateurs::password_hash.eq(&password_hash))
                    .execute(c)?;
                Ok(true)
            })
        })
        .await
        .context("Failed to reset the password.")?;

    if reset {
        Ok(Status::Ok)
    } else {
        Err(ApiError::ValidationError(
            "This reset link is invalid or has expired.".into(),
        ))
    }
}
