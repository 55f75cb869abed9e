use crate::guards::{OrStatus, SessionUserId};
use crate::models::User;
use crate::startup::TerroirDbConn;
use anyhow::anyhow;
use diesel::prelude::*;
use diesel::SqliteConnection;
use rocket::http::Status;
use rocket::outcome::try_outcome;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

pub struct AuthenticatedUser {
    pub user_id: i32,
    pub email: String,
    pub is_admin: bool,
    // prevents construction outside of this module
    _private: (),
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let session = try_outcome!(request.guard::<SessionUserId>().await);
        let conn = try_outcome!(request.guard::<TerroirDbConn>().await.map_error(|_| (
            Status::InternalServerError,
            anyhow!("Failed to retrieve a connection from the DB pool.")
        )));

        match from_request_result(session, conn).await {
            Ok(user) => Outcome::Success(user),
            Err(failure) => Outcome::Error(failure),
        }
    }
}

async fn from_request_result(
    session: SessionUserId,
    conn: TerroirDbConn,
) -> Result<AuthenticatedUser, (Status, anyhow::Error)> {
    conn.run(move |conn: &mut SqliteConnection| {
        use crate::schema::utilisateurs;

        let user = utilisateurs::table
            .find(session.0)
            .select(User::as_select())
            .first(conn)
            .optional()
            .or_status(
                Status::InternalServerError,
                "Failed to perform a query to load the session user.",
            )?
            .or_status(Status::Unauthorized, "The session user no longer exists.")?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            email: user.email,
            is_admin: user.is_admin,
            _private: (),
        })
    })
    .await
}
